//! Swap plan builder
//!
//! Fetches aggregator quotes for every screened candidate in small concurrent
//! chunks, bounds each quote with the slippage model and turns the survivors
//! into executor legs. Quote or slippage failures exclude one token only.

use alloy::primitives::Address;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::adapters::{QuoteRequest, QuoteSource};
use crate::domain::units::apply_slippage;
use crate::domain::{
    FailedTokenRecord, FailureKind, FailureStage, LegKind, RouterCall, SwapCandidate, SwapLeg,
    SwapPlan,
};

use super::slippage::{SlippageCheck, SlippageModel};

/// Quote fan-out configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Concurrent quote requests per chunk
    pub quote_batch_size: usize,
    /// Pause between chunks, to stay under aggregator rate limits
    pub quote_batch_delay_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            quote_batch_size: 5,
            quote_batch_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanOutcome {
    pub plan: SwapPlan,
    pub failures: Vec<FailedTokenRecord>,
}

pub struct SwapPlanBuilder {
    quotes: Arc<dyn QuoteSource>,
    slippage: SlippageModel,
    config: PlannerConfig,
}

impl SwapPlanBuilder {
    pub fn new(quotes: Arc<dyn QuoteSource>, slippage: SlippageModel, config: PlannerConfig) -> Self {
        Self {
            quotes,
            slippage,
            config,
        }
    }

    /// Build a fresh plan selling every candidate into `target`.
    ///
    /// `taker` is the address the aggregator calldata will be executed from.
    /// Leg order follows candidate order.
    pub async fn build(
        &self,
        chain_id: u64,
        candidates: &[SwapCandidate],
        target: Address,
        taker: Address,
    ) -> PlanOutcome {
        let chunk_size = self.config.quote_batch_size.max(1);
        let delay = Duration::from_millis(self.config.quote_batch_delay_ms);
        let chunks: Vec<&[SwapCandidate]> = candidates.chunks(chunk_size).collect();
        let mut outcome = PlanOutcome::default();
        let mut legs = Vec::with_capacity(candidates.len());

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                sleep(delay).await;
            }
            debug!(chunk = index + 1, of = chunks.len(), size = chunk.len(), "Fetching quotes");

            let results = join_all(
                chunk
                    .iter()
                    .map(|candidate| self.plan_leg(chain_id, candidate, target, taker)),
            )
            .await;

            for result in results {
                match result {
                    Ok(leg) => legs.push(leg),
                    Err(record) => outcome.failures.push(record),
                }
            }
        }

        info!(
            legs = legs.len(),
            excluded = outcome.failures.len(),
            "Swap plan built"
        );
        outcome.plan = SwapPlan::new(legs);
        outcome
    }

    async fn plan_leg(
        &self,
        chain_id: u64,
        candidate: &SwapCandidate,
        target: Address,
        taker: Address,
    ) -> Result<SwapLeg, FailedTokenRecord> {
        let usd_value = candidate.usd_value();
        let request = QuoteRequest {
            chain_id,
            sell_token: candidate.token,
            buy_token: target,
            sell_amount: candidate.amount_in,
            taker,
            slippage: self.slippage.ceiling_for(usd_value),
        };

        let quote = self.quotes.quote(&request).await.map_err(|e| {
            warn!(token = %candidate.token, symbol = %candidate.symbol, error = %e, "Quote failed");
            FailedTokenRecord::new(
                candidate.token,
                candidate.symbol.clone(),
                FailureStage::Quote,
                FailureKind::QuoteFailure,
                e.to_string(),
            )
        })?;

        match self.slippage.evaluate(quote.price_impact, usd_value) {
            SlippageCheck::Approved { slippage, .. } => {
                let min_amount_out = apply_slippage(quote.buy_amount, slippage);
                debug!(
                    symbol = %candidate.symbol,
                    %slippage,
                    buy_amount = %quote.buy_amount,
                    %min_amount_out,
                    "Leg planned"
                );
                Ok(SwapLeg {
                    kind: LegKind::Aggregator,
                    token_in: candidate.token,
                    token_out: target,
                    amount_in: candidate.amount_in,
                    min_amount_out,
                    encoded_call: RouterCall {
                        target: quote.router_target,
                        data: quote.router_data,
                    },
                    symbol: candidate.symbol.clone(),
                })
            }
            SlippageCheck::Rejected { reason, .. } => {
                info!(symbol = %candidate.symbol, %reason, "Swap rejected by slippage model");
                Err(FailedTokenRecord::new(
                    candidate.token,
                    candidate.symbol.clone(),
                    FailureStage::Slippage,
                    FailureKind::SlippageTooHigh,
                    reason,
                ))
            }
        }
    }
}
