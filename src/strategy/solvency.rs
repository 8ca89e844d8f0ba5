//! Cross-checks ledger claims against the distributor before anything is submitted.

use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::adapters::ChainClient;
use crate::domain::{
    ClaimDescriptor, ClaimExclusion, FailedTokenRecord, FailureStage, ValidatedClaim,
};

/// Partition of descriptors after reading `previewClaim` and distributor balances.
#[derive(Debug, Clone, Default)]
pub struct SolvencyReport {
    pub keep: Vec<ValidatedClaim>,
    pub drop: Vec<(ValidatedClaim, ClaimExclusion)>,
    /// True when the batched read failed and every descriptor was kept unverified.
    pub failed_open: bool,
}

impl SolvencyReport {
    pub fn failure_records(&self) -> Vec<FailedTokenRecord> {
        self.drop
            .iter()
            .map(|(claim, exclusion)| {
                FailedTokenRecord::new(
                    claim.claim.token,
                    claim.claim.symbol.clone(),
                    FailureStage::ClaimValidation,
                    exclusion.failure_kind(),
                    format!("epoch {}: {}", claim.claim.epoch, exclusion.reason()),
                )
            })
            .collect()
    }

    pub fn underfunded(&self) -> impl Iterator<Item = &ValidatedClaim> {
        self.drop.iter().filter_map(|(claim, exclusion)| {
            matches!(exclusion, ClaimExclusion::DistributorUnderfunded { .. }).then_some(claim)
        })
    }
}

pub struct SolvencyValidator<'a> {
    chain: &'a dyn ChainClient,
    distributor: Address,
}

impl<'a> SolvencyValidator<'a> {
    pub fn new(chain: &'a dyn ChainClient, distributor: Address) -> Self {
        Self { chain, distributor }
    }

    /// Read every descriptor in one batched call and partition into keep/drop.
    ///
    /// Fails open: if the batched read fails, every descriptor is kept with a zero
    /// preview rather than suppressing a reward that may be real.
    pub async fn validate(&self, wallet: Address, descriptors: &[ClaimDescriptor]) -> SolvencyReport {
        if descriptors.is_empty() {
            return SolvencyReport::default();
        }

        let readings = match self
            .chain
            .read_claim_state(wallet, self.distributor, descriptors)
            .await
        {
            Ok(readings) if readings.len() == descriptors.len() => readings,
            Ok(readings) => {
                warn!(
                    expected = descriptors.len(),
                    got = readings.len(),
                    "Claim state read returned wrong length, failing open"
                );
                return Self::fail_open(descriptors);
            }
            Err(e) => {
                warn!(error = %e, "Claim state read failed, failing open");
                return Self::fail_open(descriptors);
            }
        };

        let mut report = SolvencyReport::default();
        // Previews already kept per token; epochs of one token draw on the same balance.
        let mut committed: HashMap<Address, U256> = HashMap::new();
        for (descriptor, reading) in descriptors.iter().cloned().zip(readings) {
            let validated = match reading {
                Some(reading) => ValidatedClaim::from_reading(descriptor, reading),
                None => ValidatedClaim::unverified(descriptor),
            };
            let already = committed
                .get(&validated.claim.token)
                .copied()
                .unwrap_or(U256::ZERO);
            match validated.exclusion_after(already) {
                Some(exclusion) => {
                    match exclusion {
                        ClaimExclusion::NothingOwed => debug!(
                            token = %validated.claim.token,
                            epoch = %validated.claim.epoch,
                            "Nothing owed"
                        ),
                        ClaimExclusion::DistributorUnderfunded { preview, balance } => warn!(
                            token = %validated.claim.token,
                            symbol = %validated.claim.symbol,
                            epoch = %validated.claim.epoch,
                            %preview,
                            %balance,
                            "Distributor underfunded, excluding claim"
                        ),
                    }
                    report.drop.push((validated, exclusion));
                }
                None => {
                    if !validated.unverified {
                        *committed.entry(validated.claim.token).or_insert(U256::ZERO) +=
                            validated.claimable_preview;
                    }
                    report.keep.push(validated);
                }
            }
        }

        info!(
            keep = report.keep.len(),
            dropped = report.drop.len(),
            "Claim solvency validated"
        );
        report
    }

    fn fail_open(descriptors: &[ClaimDescriptor]) -> SolvencyReport {
        SolvencyReport {
            keep: descriptors
                .iter()
                .cloned()
                .map(ValidatedClaim::unverified)
                .collect(),
            drop: Vec::new(),
            failed_open: true,
        }
    }
}
