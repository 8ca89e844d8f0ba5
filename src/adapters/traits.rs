//! Capability traits consumed by the sweep engine.
//!
//! The engine never talks to RPC nodes or HTTP services directly; everything
//! external comes in through these seams so the core can run against fakes.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::{ClaimDescriptor, ClaimReading, Quote, RewardClaim, SwapLeg};
use crate::error::Result;

/// Off-chain reward ledger.
#[async_trait]
pub trait RewardLedger: Send + Sync {
    async fn pending_claims(&self, wallet: Address) -> Result<Vec<RewardClaim>>;
}

/// USD price lookup keyed by (chain id, token list).
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    /// Prices for the tokens the source knows about. Unknown tokens are simply absent.
    async fn prices(&self, chain_id: u64, tokens: &[Address]) -> Result<HashMap<Address, Decimal>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub chain_id: u64,
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_amount: U256,
    pub taker: Address,
    /// Maximum slippage the caller will accept, as a fraction.
    pub slippage: Decimal,
}

/// Swap aggregator quote API.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub decimals: u8,
    pub symbol: String,
}

/// Transaction the engine wants sent from the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    pub gas_limit: Option<u64>,
    /// Short description used in logs and progress events.
    pub label: String,
}

impl TxRequest {
    pub fn new(to: Address, data: impl Into<Bytes>, label: impl Into<String>) -> Self {
        Self {
            to,
            data: data.into(),
            gas_limit: None,
            label: label.into(),
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("rejected by user: {0}")]
    UserRejected(String),

    /// Nothing reached the network; another strategy may be tried.
    #[error("not broadcast: {0}")]
    PreBroadcast(String),

    #[error("transaction {tx_hash} reverted: {reason}")]
    Reverted { tx_hash: TxHash, reason: String },

    #[error("transaction {tx_hash} not confirmed: {reason}")]
    Unconfirmed { tx_hash: TxHash, reason: String },
}

impl SubmitError {
    /// Only errors raised before broadcast may fall through to the next strategy.
    pub fn falls_through(&self) -> bool {
        matches!(self, SubmitError::PreBroadcast(_))
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, SubmitError::UserRejected(_))
    }

    /// Sort a raw wallet/provider send error into rejection vs. pre-broadcast failure.
    pub fn from_send_error(message: impl std::fmt::Display) -> Self {
        let message = message.to_string();
        let lower = message.to_ascii_lowercase();
        if lower.contains("user rejected")
            || lower.contains("user denied")
            || lower.contains("rejected by user")
        {
            SubmitError::UserRejected(message)
        } else {
            SubmitError::PreBroadcast(message)
        }
    }
}

/// Signs, broadcasts and waits for confirmation of one transaction.
#[async_trait]
pub trait TxSender: Send + Sync {
    fn name(&self) -> &str;

    async fn send_and_confirm(
        &self,
        tx: &TxRequest,
    ) -> std::result::Result<TxReceipt, SubmitError>;
}

/// Read-side chain access plus simulation.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    async fn native_balance(&self, owner: Address) -> Result<U256>;

    async fn gas_price(&self) -> Result<u128>;

    /// `previewClaim` and distributor token balance for every descriptor in one batch.
    /// `None` marks a descriptor whose reads failed.
    async fn read_claim_state(
        &self,
        wallet: Address,
        distributor: Address,
        descriptors: &[ClaimDescriptor],
    ) -> Result<Vec<Option<ClaimReading>>>;

    async fn balances(&self, owner: Address, tokens: &[Address]) -> Result<Vec<U256>>;

    async fn allowances(
        &self,
        owner: Address,
        spender: Address,
        tokens: &[Address],
    ) -> Result<Vec<U256>>;

    async fn token_info(&self, tokens: &[Address]) -> Result<Vec<Option<TokenInfo>>>;

    async fn total_staked(&self, distributor: Address) -> Result<U256>;

    /// Whether the deployed bytecode dispatches on `selector`.
    async fn has_selector(&self, contract: Address, selector: [u8; 4]) -> Result<bool>;

    async fn estimate_gas(&self, from: Address, tx: &TxRequest) -> Result<u64>;

    /// `eth_call` from `from`. A revert maps to `SweepError::Simulation`.
    async fn call(&self, from: Address, tx: &TxRequest) -> Result<Bytes>;
}

/// Dry-runs a set of swap legs as one atomic executor call.
#[async_trait]
pub trait LegSimulator: Send + Sync {
    /// `Err` carries the revert reason.
    async fn simulate(&self, from: Address, legs: &[SwapLeg]) -> std::result::Result<(), String>;
}
