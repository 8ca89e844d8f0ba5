//! Claim batcher for validated distributor rewards
//!
//! Groups validated (token, epoch) pairs into bounded batches and submits them
//! one transaction at a time through the distributor's `claimMany`. Distributors
//! without a batched entry point are claimed one `claim(token, epoch)` at a time.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::contracts::{claim_many_selector, encode_claim, encode_claim_many};
use crate::adapters::{ChainClient, SubmitError, TxReceipt, TxRequest, TxSender};
use crate::domain::{ClaimDescriptor, FailedTokenRecord, FailureKind, FailureStage, ValidatedClaim};
use crate::error::{Result, SweepError};

use super::events::CancelFlag;

/// Hard ceiling on pairs per claim transaction.
pub const MAX_CLAIM_BATCH_SIZE: usize = 50;

const DEFAULT_MIN_NATIVE_GAS_WEI: u128 = 200_000_000_000_000; // 0.0002 ETH buffer

/// Claim batcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimerConfig {
    /// Pairs per `claimMany` call (capped at 50)
    pub max_batch_size: usize,
    /// Fixed gas used when estimation fails
    pub gas_base: u64,
    /// Per-pair gas used when estimation fails
    pub gas_per_item: u64,
    /// Headroom added on top of a successful estimate, in percent
    pub gas_buffer_pct: u64,
    /// Minimum native balance before any claim is sent
    pub min_native_gas_wei: u128,
}

impl Default for ClaimerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: MAX_CLAIM_BATCH_SIZE,
            gas_base: 150_000,
            gas_per_item: 90_000,
            gas_buffer_pct: 20,
            min_native_gas_wei: DEFAULT_MIN_NATIVE_GAS_WEI,
        }
    }
}

impl ClaimerConfig {
    pub fn batch_size(&self) -> usize {
        self.max_batch_size.clamp(1, MAX_CLAIM_BATCH_SIZE)
    }

    pub fn fallback_gas(&self, count: usize) -> u64 {
        self.gas_base
            .saturating_add(self.gas_per_item.saturating_mul(count as u64))
    }

    fn buffered(&self, estimate: u64) -> u64 {
        estimate.saturating_add(estimate.saturating_mul(self.gas_buffer_pct) / 100)
    }
}

/// Group claims into batches of at most `size` pairs, preserving order.
pub fn chunk_claims(claims: &[ValidatedClaim], size: usize) -> Vec<Vec<ClaimDescriptor>> {
    claims
        .chunks(size.clamp(1, MAX_CLAIM_BATCH_SIZE))
        .map(|chunk| chunk.iter().map(|c| c.claim.clone()).collect())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimMode {
    Batched,
    PerToken,
}

/// Why scheduling stopped before every batch was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimHalt {
    Cancelled,
    UserRejected,
}

/// One submitted claim transaction.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimAttempt {
    pub items: Vec<ClaimDescriptor>,
    pub gas_limit: u64,
    pub receipt: Option<TxReceipt>,
    pub error: Option<String>,
}

impl ClaimAttempt {
    pub fn succeeded(&self) -> bool {
        self.receipt.is_some()
    }
}

/// Result of a claim run
#[derive(Debug, Clone, Serialize)]
pub struct ClaimOutcome {
    pub mode: ClaimMode,
    pub attempts: Vec<ClaimAttempt>,
    pub excluded: Vec<FailedTokenRecord>,
    pub halted: Option<ClaimHalt>,
}

impl ClaimOutcome {
    pub fn empty(mode: ClaimMode) -> Self {
        Self {
            mode,
            attempts: Vec::new(),
            excluded: Vec::new(),
            halted: None,
        }
    }

    pub fn attempted(&self) -> usize {
        self.attempts.len()
    }

    pub fn succeeded(&self) -> usize {
        self.attempts.iter().filter(|a| a.succeeded()).count()
    }

    /// Every attempt failed. Distinct from having nothing to attempt.
    pub fn all_failed(&self) -> bool {
        !self.attempts.is_empty() && self.succeeded() == 0
    }

    pub fn receipts(&self) -> impl Iterator<Item = &TxReceipt> {
        self.attempts.iter().filter_map(|a| a.receipt.as_ref())
    }

    pub fn first_error(&self) -> Option<&str> {
        self.attempts.iter().find_map(|a| a.error.as_deref())
    }
}

/// An empty-balance revert from the distributor is an ordinary, reportable failure.
fn classify_claim_failure(err: &SubmitError) -> FailureKind {
    let lower = err.to_string().to_ascii_lowercase();
    if lower.contains("insufficient balance")
        || lower.contains("exceeds balance")
        || lower.contains("insufficient funds in distributor")
    {
        FailureKind::DistributorInsolvent
    } else {
        FailureKind::ExecutionFailure
    }
}

/// Refuse to start a write phase the wallet cannot pay for.
pub async fn preflight_native_gas(
    chain: &dyn ChainClient,
    wallet: Address,
    gas_units: u64,
    min_native_gas_wei: u128,
) -> Result<()> {
    let balance = chain.native_balance(wallet).await?;
    let estimated_cost = match chain.gas_price().await {
        Ok(price) => U256::from(price).saturating_mul(U256::from(gas_units)),
        Err(e) => {
            debug!(error = %e, "Gas price unavailable, using minimum balance only");
            U256::ZERO
        }
    };
    let required = estimated_cost.max(U256::from(min_native_gas_wei));
    if balance < required {
        warn!(
            %wallet,
            %balance,
            %required,
            "Wallet cannot cover gas, aborting before send"
        );
        return Err(SweepError::InsufficientGas {
            balance: balance.to_string(),
            required: required.to_string(),
        });
    }
    debug!(%wallet, %balance, "Gas preflight passed");
    Ok(())
}

/// Claim batcher
pub struct ClaimBatcher {
    chain: Arc<dyn ChainClient>,
    sender: Arc<dyn TxSender>,
    distributor: Address,
    config: ClaimerConfig,
}

impl ClaimBatcher {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        sender: Arc<dyn TxSender>,
        distributor: Address,
        config: ClaimerConfig,
    ) -> Self {
        Self {
            chain,
            sender,
            distributor,
            config,
        }
    }

    pub fn config(&self) -> &ClaimerConfig {
        &self.config
    }

    /// Probe the distributor for `claimMany` rather than assuming it exists.
    pub async fn supports_batch_claim(&self) -> bool {
        match self
            .chain
            .has_selector(self.distributor, claim_many_selector())
            .await
        {
            Ok(supported) => supported,
            Err(e) => {
                warn!(error = %e, "Batched-claim probe failed, assuming per-token claims");
                false
            }
        }
    }

    /// Gas a full run would need if every estimate failed.
    pub fn planned_gas(&self, claims: &[ValidatedClaim]) -> u64 {
        chunk_claims(claims, self.config.batch_size())
            .iter()
            .map(|batch| self.config.fallback_gas(batch.len()))
            .sum()
    }

    async fn gas_limit_for(&self, wallet: Address, tx: &TxRequest, count: usize) -> u64 {
        match self.chain.estimate_gas(wallet, tx).await {
            Ok(estimate) => self.config.buffered(estimate),
            Err(e) => {
                let fallback = self.config.fallback_gas(count);
                warn!(error = %e, fallback, "Gas estimation failed, using fallback");
                fallback
            }
        }
    }

    /// Submit every claim, sequentially, awaiting confirmation between transactions.
    pub async fn submit(
        &self,
        wallet: Address,
        claims: &[ValidatedClaim],
        cancel: &CancelFlag,
    ) -> ClaimOutcome {
        if claims.is_empty() {
            return ClaimOutcome::empty(ClaimMode::Batched);
        }
        if self.supports_batch_claim().await {
            self.submit_batched(wallet, claims, cancel).await
        } else {
            info!("Distributor has no claimMany, claiming per token");
            self.submit_per_token(wallet, claims, cancel).await
        }
    }

    async fn submit_batched(
        &self,
        wallet: Address,
        claims: &[ValidatedClaim],
        cancel: &CancelFlag,
    ) -> ClaimOutcome {
        let batches = chunk_claims(claims, self.config.batch_size());
        let total = batches.len();
        let mut outcome = ClaimOutcome::empty(ClaimMode::Batched);

        for (index, items) in batches.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(remaining = total - index, "Claim run cancelled before next batch");
                outcome.halted = Some(ClaimHalt::Cancelled);
                break;
            }

            let label = format!("claimMany {}/{} ({} pairs)", index + 1, total, items.len());
            let tx = TxRequest::new(self.distributor, encode_claim_many(&items), label);
            let gas_limit = self.gas_limit_for(wallet, &tx, items.len()).await;
            let tx = tx.with_gas_limit(gas_limit);

            if !self.send(&tx, items, gas_limit, &mut outcome).await {
                break;
            }
        }

        outcome
    }

    async fn submit_per_token(
        &self,
        wallet: Address,
        claims: &[ValidatedClaim],
        cancel: &CancelFlag,
    ) -> ClaimOutcome {
        let mut outcome = ClaimOutcome::empty(ClaimMode::PerToken);

        for (index, claim) in claims.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(remaining = claims.len() - index, "Claim run cancelled before next token");
                outcome.halted = Some(ClaimHalt::Cancelled);
                break;
            }

            let descriptor = claim.claim.clone();
            let label = format!("claim {} epoch {}", descriptor.symbol, descriptor.epoch);
            let tx = TxRequest::new(self.distributor, encode_claim(&descriptor), label);
            let gas_limit = self.gas_limit_for(wallet, &tx, 1).await;
            let tx = tx.with_gas_limit(gas_limit);

            if !self.send(&tx, vec![descriptor], gas_limit, &mut outcome).await {
                break;
            }
        }

        outcome
    }

    /// Send one claim transaction and record it. Returns false when scheduling must stop.
    async fn send(
        &self,
        tx: &TxRequest,
        items: Vec<ClaimDescriptor>,
        gas_limit: u64,
        outcome: &mut ClaimOutcome,
    ) -> bool {
        match self.sender.send_and_confirm(tx).await {
            Ok(receipt) => {
                info!(tx_hash = %receipt.tx_hash, label = %tx.label, "Claim confirmed");
                outcome.attempts.push(ClaimAttempt {
                    items,
                    gas_limit,
                    receipt: Some(receipt),
                    error: None,
                });
                true
            }
            Err(err) if err.is_user_rejection() => {
                info!(label = %tx.label, "Claim rejected by user, stopping");
                outcome.halted = Some(ClaimHalt::UserRejected);
                false
            }
            Err(err) => {
                warn!(label = %tx.label, error = %err, "Claim transaction failed");
                let kind = classify_claim_failure(&err);
                outcome.excluded.extend(items.iter().map(|item| {
                    FailedTokenRecord::new(
                        item.token,
                        item.symbol.clone(),
                        FailureStage::Claim,
                        kind,
                        format!("epoch {}: {}", item.epoch, err),
                    )
                }));
                outcome.attempts.push(ClaimAttempt {
                    items,
                    gas_limit,
                    receipt: None,
                    error: Some(err.to_string()),
                });
                true
            }
        }
    }
}
