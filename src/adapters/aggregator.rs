//! 0x-style swap aggregator client.

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

use super::traits::{QuoteRequest, QuoteSource};
use crate::domain::units::fraction_to_bps;
use crate::domain::Quote;
use crate::error::{Result, SweepError};

const DEFAULT_AGGREGATOR_URL: &str = "https://api.0x.org";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    #[serde(default)]
    pub liquidity_available: Option<bool>,
    #[serde(default)]
    pub buy_amount: Option<String>,
    /// Percent, e.g. "0.35" for 0.35%.
    #[serde(default)]
    pub estimated_price_impact: Option<serde_json::Value>,
    #[serde(default)]
    pub transaction: Option<QuoteTransaction>,
    #[serde(default)]
    pub issues: Option<QuoteIssues>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteIssues {
    #[serde(default)]
    pub allowance: Option<AllowanceIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowanceIssue {
    pub spender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteTransaction {
    pub to: String,
    pub data: String,
}

fn parse_impact_percent(value: &serde_json::Value) -> Option<Decimal> {
    let percent = match value {
        serde_json::Value::Number(n) => n.as_f64().and_then(Decimal::from_f64_retain),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }?;
    Some(percent / Decimal::from(100))
}

/// Validate a raw aggregator response into a [`Quote`].
///
/// Missing price impact is read as zero; the value-tiered ceiling still bounds slippage.
pub fn parse_quote(response: QuoteResponse) -> Result<Quote> {
    if response.liquidity_available == Some(false) {
        return Err(SweepError::Quote("no liquidity available".into()));
    }
    let buy_amount = response
        .buy_amount
        .as_deref()
        .and_then(|s| U256::from_str_radix(s.trim(), 10).ok())
        .filter(|a| !a.is_zero())
        .ok_or_else(|| SweepError::Quote("malformed quote: missing buyAmount".into()))?;
    let tx = response
        .transaction
        .ok_or_else(|| SweepError::Quote("malformed quote: missing transaction".into()))?;
    let router_target = Address::from_str(tx.to.trim())
        .map_err(|e| SweepError::Quote(format!("malformed quote: bad router address: {}", e)))?;
    let router_data = Bytes::from_str(tx.data.trim())
        .map_err(|e| SweepError::Quote(format!("malformed quote: bad calldata: {}", e)))?;
    if router_data.is_empty() {
        return Err(SweepError::Quote("malformed quote: empty calldata".into()));
    }
    let price_impact = response
        .estimated_price_impact
        .as_ref()
        .and_then(parse_impact_percent)
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO);
    let allowance_target = response
        .issues
        .and_then(|issues| issues.allowance)
        .and_then(|allowance| Address::from_str(allowance.spender.trim()).ok());

    Ok(Quote {
        buy_amount,
        price_impact,
        router_target,
        router_data,
        allowance_target,
    })
}

pub struct ZeroExQuoteSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ZeroExQuoteSource {
    pub fn new(base_url: Option<&str>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_AGGREGATOR_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }
}

#[async_trait]
impl QuoteSource for ZeroExQuoteSource {
    #[instrument(skip(self, request), fields(sell_token = %request.sell_token))]
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
        let url = format!("{}/swap/allowance-holder/quote", self.base_url);
        let mut builder = self
            .client
            .get(&url)
            .header("0x-version", "v2")
            .query(&[
                ("chainId", request.chain_id.to_string()),
                ("sellToken", format!("{:#x}", request.sell_token)),
                ("buyToken", format!("{:#x}", request.buy_token)),
                ("sellAmount", request.sell_amount.to_string()),
                ("taker", format!("{:#x}", request.taker)),
                ("slippageBps", fraction_to_bps(request.slippage).to_string()),
            ]);
        if let Some(key) = &self.api_key {
            builder = builder.header("0x-api-key", key);
        }

        let response = builder.send().await.map_err(|e| {
            SweepError::Quote(format!("request failed: {}", e))
        })?;
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SweepError::Quote("rate limited by aggregator".into()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SweepError::Quote(format!(
                "aggregator returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: QuoteResponse = response
            .json()
            .await
            .map_err(|e| SweepError::Quote(format!("malformed quote: {}", e)))?;
        let quote = parse_quote(parsed)?;
        debug!(buy_amount = %quote.buy_amount, impact = %quote.price_impact, "quote received");
        Ok(quote)
    }
}
