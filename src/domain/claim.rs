use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::report::FailureKind;

/// Length of one reward accounting period.
pub const EPOCH_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Week-aligned epoch id (unix timestamp of the epoch start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(pub u64);

impl Epoch {
    /// Epoch that contains the given unix timestamp.
    pub fn containing(timestamp: u64) -> Self {
        Self(timestamp - timestamp % EPOCH_DURATION_SECS)
    }

    pub fn is_week_aligned(&self) -> bool {
        self.0 % EPOCH_DURATION_SECS == 0
    }

    pub fn as_u256(&self) -> U256 {
        U256::from(self.0)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pending reward reported by the off-chain ledger. Untrusted until validated on-chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardClaim {
    pub token: Address,
    pub epoch: Epoch,
    pub raw_amount: U256,
    pub decimals: u8,
    pub symbol: String,
    pub source_price_usd: Option<Decimal>,
}

impl RewardClaim {
    pub fn descriptor(&self) -> ClaimDescriptor {
        ClaimDescriptor {
            token: self.token,
            epoch: self.epoch,
            symbol: self.symbol.clone(),
        }
    }
}

/// The (token, epoch) pair read and claimed on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimDescriptor {
    pub token: Address,
    pub epoch: Epoch,
    pub symbol: String,
}

/// Raw multicall reading for one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimReading {
    pub preview: U256,
    pub distributor_balance: U256,
}

/// A claim cross-checked against the distributor at validation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedClaim {
    pub claim: ClaimDescriptor,
    pub claimable_preview: U256,
    pub distributor_balance: U256,
    /// Set when the on-chain read failed and the claim was kept without a preview.
    pub unverified: bool,
}

impl ValidatedClaim {
    pub fn from_reading(claim: ClaimDescriptor, reading: ClaimReading) -> Self {
        Self {
            claim,
            claimable_preview: reading.preview,
            distributor_balance: reading.distributor_balance,
            unverified: false,
        }
    }

    /// Kept without reading the chain; a claim with preview 0 may no-op.
    pub fn unverified(claim: ClaimDescriptor) -> Self {
        Self {
            claim,
            claimable_preview: U256::ZERO,
            distributor_balance: U256::ZERO,
            unverified: true,
        }
    }

    pub fn is_claimable(&self) -> bool {
        !self.claimable_preview.is_zero() && self.claimable_preview <= self.distributor_balance
    }

    /// Classify a verified reading. `None` means the claim is solvent.
    pub fn exclusion(&self) -> Option<ClaimExclusion> {
        self.exclusion_after(U256::ZERO)
    }

    /// Classify a reading when `committed` of the same token's balance is already
    /// promised to earlier kept claims.
    pub fn exclusion_after(&self, committed: U256) -> Option<ClaimExclusion> {
        if self.unverified {
            return None;
        }
        if self.claimable_preview.is_zero() {
            return Some(ClaimExclusion::NothingOwed);
        }
        let remaining = self.distributor_balance.saturating_sub(committed);
        if self.claimable_preview > remaining {
            return Some(ClaimExclusion::DistributorUnderfunded {
                preview: self.claimable_preview,
                balance: remaining,
            });
        }
        None
    }
}

/// Why a ledger claim was not submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClaimExclusion {
    NothingOwed,
    /// `balance` is what the distributor had left for this claim.
    DistributorUnderfunded { preview: U256, balance: U256 },
}

impl ClaimExclusion {
    pub fn reason(&self) -> String {
        match self {
            Self::NothingOwed => "nothing owed".to_string(),
            Self::DistributorUnderfunded { preview, balance } => format!(
                "distributor underfunded (preview {}, remaining distributor balance {})",
                preview, balance
            ),
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::NothingOwed => FailureKind::NothingOwed,
            Self::DistributorUnderfunded { .. } => FailureKind::DistributorInsolvent,
        }
    }
}
