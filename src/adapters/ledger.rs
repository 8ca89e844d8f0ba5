//! HTTP client for the off-chain reward ledger.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::traits::RewardLedger;
use crate::domain::{Epoch, RewardClaim};
use crate::error::{Result, SweepError};

const DEFAULT_DECIMALS: u8 = 18;

/// One ledger row as served. Every field is treated as untrusted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub token: String,
    pub epoch: serde_json::Value,
    pub amount: serde_json::Value,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, alias = "price_usd", alias = "price")]
    pub price_usd: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LedgerResponse {
    Bare(Vec<LedgerEntry>),
    Wrapped { rewards: Vec<LedgerEntry> },
}

impl LedgerResponse {
    fn into_entries(self) -> Vec<LedgerEntry> {
        match self {
            LedgerResponse::Bare(entries) => entries,
            LedgerResponse::Wrapped { rewards } => rewards,
        }
    }
}

fn json_value_to_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_value_to_u256(value: &serde_json::Value) -> Option<U256> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map(U256::from),
        serde_json::Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x") {
                U256::from_str_radix(hex, 16).ok()
            } else {
                U256::from_str_radix(s, 10).ok()
            }
        }
        _ => None,
    }
}

fn json_value_to_price(value: &serde_json::Value) -> Option<Decimal> {
    let price = match value {
        serde_json::Value::Number(n) => n.as_f64().and_then(Decimal::from_f64_retain),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }?;
    (price > Decimal::ZERO).then_some(price)
}

/// Turn raw ledger rows into claims.
///
/// Rows with an unparseable token/amount, a zero amount or an epoch that is not
/// week-aligned are dropped. Duplicate (token, epoch) rows keep the larger amount.
pub fn parse_ledger_entries(entries: Vec<LedgerEntry>) -> Vec<RewardClaim> {
    let mut merged: BTreeMap<(Address, Epoch), RewardClaim> = BTreeMap::new();

    for entry in entries {
        let token = match Address::from_str(entry.token.trim()) {
            Ok(t) => t,
            Err(_) => {
                warn!(token = %entry.token, "Skipping ledger row with invalid token address");
                continue;
            }
        };
        let Some(epoch) = json_value_to_u64(&entry.epoch).map(Epoch) else {
            warn!(%token, "Skipping ledger row with invalid epoch");
            continue;
        };
        if !epoch.is_week_aligned() {
            warn!(%token, %epoch, "Skipping ledger row with epoch not aligned to a week");
            continue;
        }
        let raw_amount = match json_value_to_u256(&entry.amount) {
            Some(a) if !a.is_zero() => a,
            _ => {
                debug!(%token, %epoch, "Skipping ledger row with zero or invalid amount");
                continue;
            }
        };

        let claim = RewardClaim {
            token,
            epoch,
            raw_amount,
            decimals: entry.decimals.unwrap_or(DEFAULT_DECIMALS),
            symbol: entry.symbol.unwrap_or_default(),
            source_price_usd: entry.price_usd.as_ref().and_then(json_value_to_price),
        };

        match merged.get_mut(&(token, epoch)) {
            Some(existing) => {
                warn!(%token, %epoch, "Duplicate ledger row, keeping larger amount");
                if claim.raw_amount > existing.raw_amount {
                    *existing = claim;
                }
            }
            None => {
                merged.insert((token, epoch), claim);
            }
        }
    }

    merged.into_values().collect()
}

/// Reward ledger served over HTTP: `GET {base}/rewards/{wallet}?chainId=..`.
pub struct HttpRewardLedger {
    client: Client,
    base_url: String,
    chain_id: u64,
}

impl HttpRewardLedger {
    pub fn new(base_url: &str, chain_id: u64, timeout: Duration) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(SweepError::InvalidConfig("ledger.url is empty".into()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain_id,
        })
    }
}

#[async_trait]
impl RewardLedger for HttpRewardLedger {
    #[instrument(skip(self))]
    async fn pending_claims(&self, wallet: Address) -> Result<Vec<RewardClaim>> {
        let url = format!("{}/rewards/{:#x}", self.base_url, wallet);
        debug!("Fetching reward ledger from: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("chainId", self.chain_id.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SweepError::Ledger(format!(
                "ledger returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: LedgerResponse = response.json().await?;
        let claims = parse_ledger_entries(parsed.into_entries());
        debug!(count = claims.len(), "Ledger claims parsed");
        Ok(claims)
    }
}
