//! Pre-swap token screening.
//!
//! A token held in the wallet is only worth quoting if some price source can
//! value it. Tokens nobody can price are excluded up front and reported, so
//! operators can consider removing them from the reward list.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::PriceSource;
use crate::domain::{FailedTokenRecord, FailureKind, FailureStage, SwapCandidate, WalletHolding};

/// Primary price source with an optional public fallback for misses.
#[derive(Clone)]
pub struct PriceResolver {
    primary: Arc<dyn PriceSource>,
    fallback: Option<Arc<dyn PriceSource>>,
}

impl PriceResolver {
    pub fn new(primary: Arc<dyn PriceSource>, fallback: Option<Arc<dyn PriceSource>>) -> Self {
        Self { primary, fallback }
    }

    /// Positive prices for as many of `tokens` as either source knows.
    ///
    /// Source errors are logged and treated as misses.
    pub async fn resolve(&self, chain_id: u64, tokens: &[Address]) -> HashMap<Address, Decimal> {
        if tokens.is_empty() {
            return HashMap::new();
        }

        let mut prices = match self.primary.prices(chain_id, tokens).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!(source = self.primary.name(), error = %e, "Primary price source failed");
                HashMap::new()
            }
        };
        prices.retain(|_, price| *price > Decimal::ZERO);

        let missing: Vec<Address> = tokens
            .iter()
            .filter(|token| !prices.contains_key(*token))
            .copied()
            .collect();

        if let (Some(fallback), false) = (&self.fallback, missing.is_empty()) {
            debug!(
                source = fallback.name(),
                missing = missing.len(),
                "Resolving missing prices from fallback"
            );
            match fallback.prices(chain_id, &missing).await {
                Ok(found) => {
                    for (token, price) in found {
                        if price > Decimal::ZERO && missing.contains(&token) {
                            prices.insert(token, price);
                        }
                    }
                }
                Err(e) => {
                    warn!(source = fallback.name(), error = %e, "Fallback price source failed")
                }
            }
        }

        prices
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScreenOutcome {
    pub candidates: Vec<SwapCandidate>,
    pub failures: Vec<FailedTokenRecord>,
}

pub struct TokenScreener {
    prices: PriceResolver,
}

impl TokenScreener {
    pub fn new(prices: PriceResolver) -> Self {
        Self { prices }
    }

    /// Turn wallet holdings into priced swap candidates.
    ///
    /// Zero balances and the target token itself are skipped silently; anything
    /// without a positive price is excluded with stage `pre_screening`.
    pub async fn screen(
        &self,
        chain_id: u64,
        holdings: &[WalletHolding],
        target: Address,
    ) -> ScreenOutcome {
        let held: Vec<&WalletHolding> = holdings
            .iter()
            .filter(|h| !h.wallet_balance.is_zero() && h.token != target)
            .collect();
        if held.is_empty() {
            return ScreenOutcome::default();
        }

        let tokens: Vec<Address> = held.iter().map(|h| h.token).collect();
        let prices = self.prices.resolve(chain_id, &tokens).await;

        let mut outcome = ScreenOutcome::default();
        for holding in held {
            match prices.get(&holding.token) {
                Some(price) => outcome.candidates.push(SwapCandidate {
                    token: holding.token,
                    decimals: holding.decimals,
                    symbol: holding.symbol.clone(),
                    amount_in: holding.wallet_balance,
                    price_usd: *price,
                }),
                None => {
                    debug!(token = %holding.token, symbol = %holding.symbol, "No valid price");
                    outcome.failures.push(FailedTokenRecord::new(
                        holding.token,
                        holding.symbol.clone(),
                        FailureStage::PreScreening,
                        FailureKind::NoValidPrice,
                        "no valid USD price from any source",
                    ));
                }
            }
        }

        info!(
            candidates = outcome.candidates.len(),
            excluded = outcome.failures.len(),
            "Token screening complete"
        );
        outcome
    }
}
