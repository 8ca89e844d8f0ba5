//! Output formatting for CLI commands.
//!
//! Supports two modes: human-readable tables (default) and JSON (--json).

use alloy::primitives::{Address, U256};
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::domain::units::to_decimal_units;
use crate::domain::{FailedTokenRecord, FailureLedger, RefreshSnapshot, SweepReport};
use crate::strategy::ClaimOutcome;

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Print a vec of Tabled items, or a placeholder when empty.
pub fn print_table<T: Tabled>(items: &[T]) {
    if items.is_empty() {
        println!("(no results)");
    } else {
        println!("{}", Table::new(items));
    }
}

pub fn print_json<T: Serialize>(item: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(item)?);
    Ok(())
}

fn short(address: &Address) -> String {
    let full = format!("{:#x}", address);
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

fn amount(raw: U256, decimals: u8) -> String {
    to_decimal_units(raw, decimals).round_dp(6).normalize().to_string()
}

#[derive(Debug, Tabled)]
pub struct RewardTableRow {
    pub symbol: String,
    pub token: String,
    pub claimable: String,
    pub wallet: String,
    pub price: String,
    pub usd: String,
    pub dust: String,
}

#[derive(Debug, Tabled)]
pub struct FailureTableRow {
    pub stage: String,
    pub symbol: String,
    pub token: String,
    pub reason: String,
}

#[derive(Debug, Tabled)]
pub struct ClaimTableRow {
    pub tx: String,
    pub pairs: usize,
    pub gas_limit: u64,
    pub status: String,
}

fn failure_rows<'a>(records: impl IntoIterator<Item = &'a FailedTokenRecord>) -> Vec<FailureTableRow> {
    records
        .into_iter()
        .map(|r| FailureTableRow {
            stage: r.stage.to_string(),
            symbol: r.symbol.clone(),
            token: short(&r.address),
            reason: r.reason.clone(),
        })
        .collect()
}

pub fn print_snapshot(snapshot: &RefreshSnapshot, mode: OutputMode) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        return print_json(snapshot);
    }

    let rows: Vec<RewardTableRow> = snapshot
        .rows
        .iter()
        .map(|row| RewardTableRow {
            symbol: row.symbol.clone(),
            token: short(&row.token),
            claimable: amount(row.claimable, row.decimals),
            wallet: amount(row.wallet_balance, row.decimals),
            price: row
                .price_usd
                .map(|p| format!("${}", p.round_dp(6).normalize()))
                .unwrap_or_else(|| "-".to_string()),
            usd: format!("${:.2}", row.total_usd()),
            dust: if row.dust { "yes".to_string() } else { String::new() },
        })
        .collect();
    print_table(&rows);
    println!("Total: ${:.2}", snapshot.total_usd);
    if let Some(staked) = snapshot.total_staked {
        println!("Total staked: {}", amount(staked, 18));
    }
    if !snapshot.excluded_claims.is_empty() {
        println!("\nExcluded claims:");
        print_table(&failure_rows(&snapshot.excluded_claims));
    }
    Ok(())
}

pub fn print_claim_outcome(outcome: &ClaimOutcome, mode: OutputMode) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        return print_json(outcome);
    }

    let rows: Vec<ClaimTableRow> = outcome
        .attempts
        .iter()
        .map(|attempt| ClaimTableRow {
            tx: attempt
                .receipt
                .as_ref()
                .map(|r| format!("{:#x}", r.tx_hash))
                .unwrap_or_else(|| "-".to_string()),
            pairs: attempt.items.len(),
            gas_limit: attempt.gas_limit,
            status: match &attempt.error {
                None => "confirmed".to_string(),
                Some(e) => e.clone(),
            },
        })
        .collect();
    print_table(&rows);
    println!(
        "Claimed {}/{} transaction(s)",
        outcome.succeeded(),
        outcome.attempted()
    );
    if !outcome.excluded.is_empty() {
        println!("\nExcluded:");
        print_table(&failure_rows(&outcome.excluded));
    }
    Ok(())
}

fn print_failures(ledger: &FailureLedger) {
    for (stage, records) in ledger.by_stage() {
        println!("\n{} ({}):", stage, records.len());
        print_table(&failure_rows(records));
    }
    let deregister = ledger.deregistration_list();
    if !deregister.is_empty() {
        println!("\nConsider removing from the reward list:");
        for address in deregister {
            println!("  {:#x}", address);
        }
    }
}

pub fn print_report(report: &SweepReport, mode: OutputMode) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        return print_json(report);
    }

    println!("Sweep {} into {:#x}", report.id, report.target);
    println!("{}", report.summary());
    for hash in report.claim_receipts.iter().chain(&report.swap_receipts) {
        println!("  tx {:#x}", hash);
    }
    print_failures(&report.failed_tokens);
    if let Some(snapshot) = &report.final_snapshot {
        println!("\nAfter sweep:");
        print_snapshot(snapshot, OutputMode::Table)?;
    }
    Ok(())
}
