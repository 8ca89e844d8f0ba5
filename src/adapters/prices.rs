//! USD price sources: the internal price endpoint and a public aggregated index.

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use super::traits::PriceSource;
use crate::error::{Result, SweepError};

/// Tokens per request, keeps query strings bounded.
const TOKENS_PER_REQUEST: usize = 50;

fn parse_price(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .filter(|p| p.is_finite())
            .and_then(Decimal::from_f64_retain),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        serde_json::Value::Object(map) => map
            .get("usd")
            .or_else(|| map.get("price"))
            .and_then(parse_price),
        _ => None,
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

async fn get_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
    source: &str,
) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SweepError::PriceSource(format!(
            "{} returned {}",
            source, status
        )));
    }
    Ok(response.json().await?)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InternalPriceResponse {
    Wrapped { prices: HashMap<String, serde_json::Value> },
    Bare(HashMap<String, serde_json::Value>),
}

/// Parse a `{address: price}` map, skipping keys that are not addresses.
pub fn parse_price_map(raw: HashMap<String, serde_json::Value>) -> HashMap<Address, Decimal> {
    raw.into_iter()
        .filter_map(|(key, value)| {
            let token = Address::from_str(key.trim()).ok()?;
            Some((token, parse_price(&value)?))
        })
        .collect()
}

/// Primary price endpoint: `GET {base}/prices?chainId=..&tokens=a,b`.
pub struct HttpPriceSource {
    client: Client,
    base_url: String,
}

impl HttpPriceSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    fn name(&self) -> &str {
        "internal"
    }

    async fn prices(&self, chain_id: u64, tokens: &[Address]) -> Result<HashMap<Address, Decimal>> {
        let mut out = HashMap::new();
        for chunk in tokens.chunks(TOKENS_PER_REQUEST) {
            let list = chunk
                .iter()
                .map(|t| format!("{:#x}", t))
                .collect::<Vec<_>>()
                .join(",");
            let request = self
                .client
                .get(format!("{}/prices", self.base_url))
                .query(&[("chainId", chain_id.to_string()), ("tokens", list)]);
            let parsed: InternalPriceResponse = get_json(request, self.name()).await?;
            let raw = match parsed {
                InternalPriceResponse::Wrapped { prices } => prices,
                InternalPriceResponse::Bare(map) => map,
            };
            out.extend(parse_price_map(raw));
        }
        debug!(source = self.name(), resolved = out.len(), requested = tokens.len(), "prices fetched");
        Ok(out)
    }
}

/// Chain slug used by the public coins index.
pub fn index_chain_slug(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("ethereum"),
        10 => Some("optimism"),
        56 => Some("bsc"),
        137 => Some("polygon"),
        8453 => Some("base"),
        42161 => Some("arbitrum"),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(default)]
    coins: HashMap<String, IndexCoin>,
}

#[derive(Debug, Deserialize)]
struct IndexCoin {
    price: Option<f64>,
}

/// Public aggregated index (DefiLlama coins API shape):
/// `GET {base}/prices/current/{chain}:{token},...`.
pub struct PublicIndexPriceSource {
    client: Client,
    base_url: String,
}

impl PublicIndexPriceSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn parse_index_coins(coins: HashMap<String, IndexCoin>) -> HashMap<Address, Decimal> {
    coins
        .into_iter()
        .filter_map(|(key, coin)| {
            let (_, raw_token) = key.split_once(':')?;
            let token = Address::from_str(raw_token).ok()?;
            let price = coin
                .price
                .filter(|p| p.is_finite())
                .and_then(Decimal::from_f64_retain)?;
            Some((token, price))
        })
        .collect()
}

#[async_trait]
impl PriceSource for PublicIndexPriceSource {
    fn name(&self) -> &str {
        "public_index"
    }

    async fn prices(&self, chain_id: u64, tokens: &[Address]) -> Result<HashMap<Address, Decimal>> {
        let slug = index_chain_slug(chain_id).ok_or(SweepError::UnsupportedNetwork(chain_id))?;
        let mut out = HashMap::new();
        for chunk in tokens.chunks(TOKENS_PER_REQUEST) {
            let coins = chunk
                .iter()
                .map(|t| format!("{}:{:#x}", slug, t))
                .collect::<Vec<_>>()
                .join(",");
            let request = self
                .client
                .get(format!("{}/prices/current/{}", self.base_url, coins));
            let parsed: IndexResponse = get_json(request, self.name()).await?;
            out.extend(parse_index_coins(parsed.coins));
        }
        debug!(source = self.name(), resolved = out.len(), requested = tokens.len(), "prices fetched");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn price_map_accepts_numbers_strings_and_objects() {
        let raw: HashMap<String, serde_json::Value> = serde_json::from_value(json!({
            "0x0000000000000000000000000000000000000001": 1.5,
            "0x0000000000000000000000000000000000000002": "0.25",
            "0x0000000000000000000000000000000000000003": { "usd": 2 },
            "garbage": 4
        }))
        .unwrap();
        let prices = parse_price_map(raw);
        assert_eq!(prices.len(), 3);
        assert_eq!(prices[&Address::with_last_byte(2)], dec!(0.25));
    }

    #[test]
    fn index_coins_strip_chain_prefix() {
        let parsed: IndexResponse = serde_json::from_value(json!({
            "coins": {
                "base:0x0000000000000000000000000000000000000007": { "price": 3.0, "symbol": "X" },
                "base:0x0000000000000000000000000000000000000008": { "symbol": "NOPRICE" }
            }
        }))
        .unwrap();
        let prices = parse_index_coins(parsed.coins);
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[&Address::with_last_byte(7)], dec!(3));
    }

    #[test]
    fn unknown_chain_has_no_slug() {
        assert_eq!(index_chain_slug(8453), Some("base"));
        assert_eq!(index_chain_slug(999_999), None);
    }
}
