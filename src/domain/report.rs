use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// Pipeline stage at which a token was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    ClaimValidation,
    Claim,
    PreScreening,
    Quote,
    Slippage,
    Approval,
    SimulationFailed,
    ExecutionFailed,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClaimValidation => "claim_validation",
            Self::Claim => "claim",
            Self::PreScreening => "pre_screening",
            Self::Quote => "quote",
            Self::Slippage => "slippage",
            Self::Approval => "approval",
            Self::SimulationFailed => "simulation_failed",
            Self::ExecutionFailed => "execution_failed",
        }
    }

    /// Exclusions at these stages point at a token that should leave the reward list.
    pub fn suggests_deregistration(&self) -> bool {
        matches!(self, Self::PreScreening | Self::SimulationFailed)
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure taxonomy for absorbed, per-token conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UserRejected,
    InsufficientGas,
    NothingOwed,
    DistributorInsolvent,
    NoValidPrice,
    QuoteFailure,
    SlippageTooHigh,
    ApprovalFailure,
    SimulationFailure,
    ExecutionFailure,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTokenRecord {
    pub address: Address,
    pub symbol: String,
    pub reason: String,
    pub stage: FailureStage,
    pub kind: FailureKind,
}

impl FailedTokenRecord {
    pub fn new(
        address: Address,
        symbol: impl Into<String>,
        stage: FailureStage,
        kind: FailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            reason: reason.into(),
            stage,
            kind,
        }
    }
}

/// Append-only list of excluded tokens, one entry per address.
///
/// The first record for an address wins; later records for the same token are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<FailedTokenRecord>", into = "Vec<FailedTokenRecord>")]
pub struct FailureLedger {
    records: Vec<FailedTokenRecord>,
    seen: HashSet<Address>,
    /// Every token excluded at a de-registration stage, including suppressed duplicates.
    deregister: Vec<Address>,
}

impl From<Vec<FailedTokenRecord>> for FailureLedger {
    fn from(records: Vec<FailedTokenRecord>) -> Self {
        let mut ledger = Self::new();
        ledger.extend(records);
        ledger
    }
}

impl From<FailureLedger> for Vec<FailedTokenRecord> {
    fn from(ledger: FailureLedger) -> Self {
        ledger.records
    }
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the address was already recorded.
    pub fn record(&mut self, record: FailedTokenRecord) -> bool {
        if record.stage.suggests_deregistration() && !self.deregister.contains(&record.address) {
            self.deregister.push(record.address);
        }
        if !self.seen.insert(record.address) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn extend<I: IntoIterator<Item = FailedTokenRecord>>(&mut self, records: I) {
        for record in records {
            self.record(record);
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.seen.contains(address)
    }

    pub fn records(&self) -> &[FailedTokenRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn by_stage(&self) -> BTreeMap<FailureStage, Vec<&FailedTokenRecord>> {
        let mut grouped: BTreeMap<FailureStage, Vec<&FailedTokenRecord>> = BTreeMap::new();
        for record in &self.records {
            grouped.entry(record.stage).or_default().push(record);
        }
        grouped
    }

    /// Tokens an operator should consider removing from the reward list.
    pub fn deregistration_list(&self) -> Vec<Address> {
        self.deregister.clone()
    }
}

/// One reward token row in a refresh snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRow {
    pub token: Address,
    pub symbol: String,
    pub decimals: u8,
    /// Sum of solvent previews across epochs.
    pub claimable: U256,
    pub wallet_balance: U256,
    pub price_usd: Option<Decimal>,
    pub claimable_usd: Decimal,
    pub wallet_usd: Decimal,
    pub dust: bool,
}

impl RewardRow {
    pub fn total_usd(&self) -> Decimal {
        self.claimable_usd + self.wallet_usd
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSnapshot {
    pub wallet: Address,
    pub rows: Vec<RewardRow>,
    pub total_usd: Decimal,
    pub total_staked: Option<U256>,
    pub excluded_claims: Vec<FailedTokenRecord>,
}

/// Consolidated end-of-run result for a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub id: Uuid,
    pub wallet: Address,
    pub target: Address,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub claims_attempted: usize,
    pub claims_succeeded: usize,
    pub claim_receipts: Vec<TxHash>,
    pub swap_phase_skipped: bool,
    pub swaps_attempted: usize,
    pub success_count: usize,
    pub execution_batches: usize,
    pub swap_receipts: Vec<TxHash>,
    pub failed_tokens: FailureLedger,
    pub final_snapshot: Option<RefreshSnapshot>,
    /// Why the run stopped early, when it did but still achieved something.
    pub halted: Option<String>,
}

impl SweepReport {
    pub fn new(wallet: Address, target: Address) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet,
            target,
            started_at: Utc::now(),
            finished_at: None,
            claims_attempted: 0,
            claims_succeeded: 0,
            claim_receipts: Vec::new(),
            swap_phase_skipped: false,
            swaps_attempted: 0,
            success_count: 0,
            execution_batches: 0,
            swap_receipts: Vec::new(),
            failed_tokens: FailureLedger::new(),
            final_snapshot: None,
            halted: None,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Whether any transaction of the run landed.
    pub fn made_progress(&self) -> bool {
        self.claims_succeeded > 0 || self.success_count > 0
    }

    /// Short user-facing summary line.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.claims_attempted > 0 {
            parts.push(format!(
                "claimed {}/{} batch(es)",
                self.claims_succeeded, self.claims_attempted
            ));
        }
        if self.swap_phase_skipped {
            parts.push("swap skipped".to_string());
        } else {
            parts.push(format!(
                "swapped {}/{} token(s)",
                self.success_count, self.swaps_attempted
            ));
        }
        if !self.failed_tokens.is_empty() {
            parts.push(format!("{} token(s) excluded", self.failed_tokens.len()));
        }
        if let Some(reason) = &self.halted {
            parts.push(format!("stopped early: {}", reason));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(byte: u8, stage: FailureStage) -> FailedTokenRecord {
        FailedTokenRecord::new(
            Address::repeat_byte(byte),
            format!("T{}", byte),
            stage,
            FailureKind::NoValidPrice,
            "test",
        )
    }

    #[test]
    fn ledger_deduplicates_by_address() {
        let mut ledger = FailureLedger::new();
        assert!(ledger.record(record(1, FailureStage::PreScreening)));
        assert!(!ledger.record(record(1, FailureStage::SimulationFailed)));
        assert!(ledger.record(record(2, FailureStage::Quote)));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.records()[0].stage, FailureStage::PreScreening);
    }

    #[test]
    fn grouping_and_deregistration() {
        let mut ledger = FailureLedger::new();
        ledger.extend([
            record(1, FailureStage::PreScreening),
            record(2, FailureStage::Slippage),
            record(3, FailureStage::SimulationFailed),
        ]);

        let grouped = ledger.by_stage();
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[&FailureStage::Slippage].len(), 1);
        assert_eq!(
            ledger.deregistration_list(),
            vec![Address::repeat_byte(1), Address::repeat_byte(3)]
        );
    }

    #[test]
    fn deregistration_survives_an_earlier_record() {
        let mut ledger = FailureLedger::new();
        ledger.record(record(1, FailureStage::Claim));
        ledger.record(record(1, FailureStage::PreScreening));
        ledger.record(record(2, FailureStage::SimulationFailed));
        ledger.record(record(2, FailureStage::PreScreening));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.records()[0].stage, FailureStage::Claim);
        assert_eq!(
            ledger.deregistration_list(),
            vec![Address::repeat_byte(1), Address::repeat_byte(2)]
        );
    }

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(FailureStage::PreScreening.to_string(), "pre_screening");
        assert_eq!(FailureStage::SimulationFailed.to_string(), "simulation_failed");
        let json = serde_json::to_string(&FailureStage::ExecutionFailed).unwrap();
        assert_eq!(json, "\"execution_failed\"");
    }

    #[test]
    fn report_json_keeps_failures_as_a_plain_list() {
        let mut report = SweepReport::new(Address::ZERO, Address::repeat_byte(0xee));
        report.failed_tokens.record(record(7, FailureStage::Quote));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failed_tokens"][0]["stage"], "quote");

        let back: SweepReport = serde_json::from_value(json).unwrap();
        assert!(back.failed_tokens.contains(&Address::repeat_byte(7)));
    }

    #[test]
    fn summary_mentions_skipped_swap() {
        let mut report = SweepReport::new(Address::ZERO, Address::ZERO);
        report.claims_attempted = 2;
        report.swap_phase_skipped = true;
        assert_eq!(report.summary(), "claimed 0/2 batch(es), swap skipped");
    }
}
