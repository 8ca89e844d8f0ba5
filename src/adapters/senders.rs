//! Transaction submission strategies.
//!
//! Wallets and RPC nodes disagree on fee fields, so the engine tries an ordered
//! list of senders (see `strategy::submission::SubmissionChain`).

use alloy::network::TransactionBuilder;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use super::traits::{SubmitError, TxReceipt, TxRequest, TxSender};

fn base_request(from: Address, tx: &TxRequest) -> TransactionRequest {
    let mut request = TransactionRequest::default()
        .with_from(from)
        .with_to(tx.to)
        .with_input(tx.data.clone());
    if let Some(gas_limit) = tx.gas_limit {
        request = request.with_gas_limit(gas_limit);
    }
    request
}

async fn broadcast_and_wait(
    provider: &DynProvider,
    request: TransactionRequest,
    label: &str,
    timeout: Duration,
) -> Result<TxReceipt, SubmitError> {
    let pending = provider
        .send_transaction(request)
        .await
        .map_err(SubmitError::from_send_error)?;
    let tx_hash = *pending.tx_hash();
    info!(%tx_hash, label, "transaction broadcast, awaiting confirmation");

    let receipt = pending
        .with_timeout(Some(timeout))
        .get_receipt()
        .await
        .map_err(|e| SubmitError::Unconfirmed {
            tx_hash,
            reason: e.to_string(),
        })?;

    if !receipt.status() {
        return Err(SubmitError::Reverted {
            tx_hash,
            reason: "execution reverted".to_string(),
        });
    }

    Ok(TxReceipt {
        tx_hash,
        block_number: receipt.block_number,
        gas_used: receipt.gas_used,
    })
}

/// Lets the wallet filler pick nonce and EIP-1559 fees.
pub struct ProviderSender {
    provider: DynProvider,
    from: Address,
    confirmation_timeout: Duration,
}

impl ProviderSender {
    pub fn new(provider: DynProvider, from: Address, confirmation_timeout: Duration) -> Self {
        Self {
            provider,
            from,
            confirmation_timeout,
        }
    }
}

#[async_trait]
impl TxSender for ProviderSender {
    fn name(&self) -> &str {
        "provider"
    }

    async fn send_and_confirm(&self, tx: &TxRequest) -> Result<TxReceipt, SubmitError> {
        let request = base_request(self.from, tx);
        broadcast_and_wait(&self.provider, request, &tx.label, self.confirmation_timeout).await
    }
}

/// Pins a legacy gas price for nodes that reject EIP-1559 fee estimation.
pub struct LegacyGasSender {
    provider: DynProvider,
    from: Address,
    confirmation_timeout: Duration,
}

impl LegacyGasSender {
    pub fn new(provider: DynProvider, from: Address, confirmation_timeout: Duration) -> Self {
        Self {
            provider,
            from,
            confirmation_timeout,
        }
    }
}

#[async_trait]
impl TxSender for LegacyGasSender {
    fn name(&self) -> &str {
        "legacy_gas"
    }

    async fn send_and_confirm(&self, tx: &TxRequest) -> Result<TxReceipt, SubmitError> {
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| SubmitError::PreBroadcast(format!("gas price unavailable: {}", e)))?;
        debug!(gas_price, label = %tx.label, "using legacy gas price");
        let request = base_request(self.from, tx).with_gas_price(gas_price);
        broadcast_and_wait(&self.provider, request, &tx.label, self.confirmation_timeout).await
    }
}
