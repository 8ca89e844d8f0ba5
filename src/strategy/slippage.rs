//! Slippage Bound Model
//!
//! Derives the maximum acceptable shortfall for a swap from the aggregator's
//! price impact and the USD value being swapped. Quoted impact can be stale by
//! execution time, so every impact tier carries a buffer; small swaps get a low
//! ceiling so dust never justifies a wide bound.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How an impact tier turns price impact into a base bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum TierBound {
    /// Flat bound regardless of impact.
    Fixed(Decimal),
    /// Impact plus a buffer.
    Buffer(Decimal),
}

impl TierBound {
    fn apply(&self, impact: Decimal) -> Decimal {
        match self {
            TierBound::Fixed(bound) => *bound,
            TierBound::Buffer(buffer) => impact + buffer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactTier {
    /// Tier applies while impact is strictly below this fraction.
    pub below: Decimal,
    pub bound: TierBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueCeiling {
    /// Ceiling applies when the swap is worth at least this many USD.
    pub min_usd: Decimal,
    pub ceiling: Decimal,
}

/// Slippage model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageConfig {
    /// Ascending by `below`.
    pub impact_tiers: Vec<ImpactTier>,
    /// Buffer added above the last impact tier.
    pub overflow_buffer: Decimal,
    /// Descending by `min_usd`.
    pub value_ceilings: Vec<ValueCeiling>,
    /// Ceiling for swaps below every value tier.
    pub floor_ceiling: Decimal,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            impact_tiers: vec![
                ImpactTier {
                    below: dec!(0.005),
                    bound: TierBound::Fixed(dec!(0.02)),
                },
                ImpactTier {
                    below: dec!(0.01),
                    bound: TierBound::Fixed(dec!(0.025)),
                },
                ImpactTier {
                    below: dec!(0.03),
                    bound: TierBound::Buffer(dec!(0.02)),
                },
                ImpactTier {
                    below: dec!(0.05),
                    bound: TierBound::Buffer(dec!(0.03)),
                },
            ],
            overflow_buffer: dec!(0.04),
            value_ceilings: vec![
                ValueCeiling {
                    min_usd: dec!(100),
                    ceiling: dec!(0.15),
                },
                ValueCeiling {
                    min_usd: dec!(20),
                    ceiling: dec!(0.10),
                },
                ValueCeiling {
                    min_usd: dec!(5),
                    ceiling: dec!(0.05),
                },
            ],
            floor_ceiling: dec!(0.03),
        }
    }
}

/// Slippage evaluation result
#[derive(Debug, Clone, PartialEq)]
pub enum SlippageCheck {
    /// Swap can proceed with this bound
    Approved {
        slippage: Decimal,
        base: Decimal,
        ceiling: Decimal,
    },
    /// Value too small to justify the slippage the impact requires
    Rejected {
        reason: String,
        base: Decimal,
        ceiling: Decimal,
    },
}

impl SlippageCheck {
    pub fn is_approved(&self) -> bool {
        matches!(self, SlippageCheck::Approved { .. })
    }
}

/// Slippage bound engine
#[derive(Debug, Clone, Default)]
pub struct SlippageModel {
    config: SlippageConfig,
}

impl SlippageModel {
    pub fn new(config: SlippageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SlippageConfig {
        &self.config
    }

    /// Base bound from price impact. Negative impact (price improvement) counts as zero.
    pub fn base_bound(&self, price_impact: Decimal) -> Decimal {
        let impact = price_impact.max(Decimal::ZERO);
        self.config
            .impact_tiers
            .iter()
            .find(|tier| impact < tier.below)
            .map(|tier| tier.bound.apply(impact))
            .unwrap_or(impact + self.config.overflow_buffer)
    }

    /// Ceiling from the USD value of the swapped amount.
    pub fn ceiling_for(&self, usd_value: Decimal) -> Decimal {
        self.config
            .value_ceilings
            .iter()
            .find(|tier| usd_value >= tier.min_usd)
            .map(|tier| tier.ceiling)
            .unwrap_or(self.config.floor_ceiling)
    }

    /// Final bound is `min(base, ceiling)`; a base above the ceiling rejects the swap.
    pub fn evaluate(&self, price_impact: Decimal, usd_value: Decimal) -> SlippageCheck {
        let base = self.base_bound(price_impact);
        let ceiling = self.ceiling_for(usd_value);

        if base > ceiling {
            return SlippageCheck::Rejected {
                reason: format!(
                    "Slippage too high: needs {:.2}% for {:.2}% impact, but ${:.2} only justifies {:.2}%",
                    base * dec!(100),
                    price_impact * dec!(100),
                    usd_value,
                    ceiling * dec!(100)
                ),
                base,
                ceiling,
            };
        }

        SlippageCheck::Approved {
            slippage: base.min(ceiling),
            base,
            ceiling,
        }
    }
}
