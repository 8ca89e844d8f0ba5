use alloy::primitives::Address;
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, SweepError};
use crate::strategy::{
    ClaimerConfig, OrchestratorConfig, PlannerConfig, RewardToken, SlippageConfig, SwapSettings,
    MAX_CLAIM_BATCH_SIZE, MAX_EXECUTION_BATCH_SIZE,
};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub chain: ChainConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub prices: PricesConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub claim: ClaimerConfig,
    #[serde(default)]
    pub swap: SwapConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Reward tokens swept from the wallet even with nothing pending in the ledger
    #[serde(default)]
    pub reward_tokens: Vec<RewardTokenConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Expected chain id; connecting to anything else is refused
    pub chain_id: u64,
    /// Reward distributor contract
    pub distributor: String,
    /// Swap executor contract
    pub executor: String,
    /// Maximum wait for one transaction receipt
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    /// Retry with an explicit legacy gas price when the default send fails before broadcast
    #[serde(default = "default_true")]
    pub legacy_gas_fallback: bool,
}

fn default_confirmation_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the reward ledger service
    pub base_url: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricesConfig {
    /// Primary (internal) price endpoint
    pub primary_url: String,
    /// Public coins index used for primary misses; empty disables it
    #[serde(default)]
    pub fallback_url: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            primary_url: "http://localhost:8080".to_string(),
            fallback_url: Some("https://coins.llama.fi".to_string()),
            timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    pub base_url: String,
    /// Usually supplied as SWEEP__AGGREGATOR__API_KEY
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.0x.org".to_string(),
            api_key: None,
            timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewardTokenConfig {
    pub address: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

fn default_decimals() -> u8 {
    18
}

/// Swap path settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Legs per executor transaction (at most 8)
    pub execution_batch_size: usize,
    /// Concurrent quote requests per chunk
    pub quote_batch_size: usize,
    /// Pause between quote chunks
    pub quote_batch_delay_ms: u64,
    pub approve_gas_limit: u64,
    pub gas_per_leg: u64,
    pub gas_buffer_pct: u64,
    /// Rows worth less than this are shown as dust
    pub dust_threshold_usd: Decimal,
    #[serde(default)]
    pub slippage: SlippageConfig,
}

impl Default for SwapConfig {
    fn default() -> Self {
        let settings = SwapSettings::default();
        let planner = PlannerConfig::default();
        Self {
            execution_batch_size: settings.execution_batch_size,
            quote_batch_size: planner.quote_batch_size,
            quote_batch_delay_ms: planner.quote_batch_delay_ms,
            approve_gas_limit: settings.approve_gas_limit,
            gas_per_leg: settings.gas_per_leg,
            gas_buffer_pct: settings.gas_buffer_pct,
            dust_threshold_usd: settings.dust_threshold_usd,
            slippage: SlippageConfig::default(),
        }
    }
}

impl SwapConfig {
    pub fn settings(&self) -> SwapSettings {
        SwapSettings {
            execution_batch_size: self.execution_batch_size,
            approve_gas_limit: self.approve_gas_limit,
            gas_per_leg: self.gas_per_leg,
            gas_buffer_pct: self.gas_buffer_pct,
            dust_threshold_usd: self.dust_threshold_usd,
        }
    }

    pub fn planner(&self) -> PlannerConfig {
        PlannerConfig {
            quote_batch_size: self.quote_batch_size,
            quote_batch_delay_ms: self.quote_batch_delay_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|e| SweepError::AddressParsing(format!("{}: {}", field, e)))
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/mainnet.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SWEEP_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // SWEEP__CHAIN__RPC_URL, SWEEP__SWAP__EXECUTION_BATCH_SIZE, ...
            .add_source(
                Environment::with_prefix("SWEEP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn distributor(&self) -> Result<Address> {
        parse_address("chain.distributor", &self.chain.distributor)
    }

    pub fn executor(&self) -> Result<Address> {
        parse_address("chain.executor", &self.chain.executor)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.chain.confirmation_timeout_secs)
    }

    pub fn reward_tokens(&self) -> Result<Vec<RewardToken>> {
        self.reward_tokens
            .iter()
            .map(|token| {
                Ok(RewardToken {
                    address: parse_address("reward_tokens.address", &token.address)?,
                    symbol: token.symbol.clone(),
                    decimals: token.decimals,
                })
            })
            .collect()
    }

    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig> {
        Ok(OrchestratorConfig {
            distributor: self.distributor()?,
            executor: self.executor()?,
            claim: self.claim.clone(),
            planner: self.swap.planner(),
            slippage: self.swap.slippage.clone(),
            swap: self.swap.settings(),
            reward_tokens: self.reward_tokens()?,
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.chain.rpc_url.trim().is_empty() {
            errors.push("chain.rpc_url must be set".to_string());
        }
        if let Err(e) = self.distributor() {
            errors.push(e.to_string());
        }
        if let Err(e) = self.executor() {
            errors.push(e.to_string());
        }
        if let Err(e) = self.reward_tokens() {
            errors.push(e.to_string());
        }
        if self.chain.confirmation_timeout_secs == 0 {
            errors.push("chain.confirmation_timeout_secs must be positive".to_string());
        }

        if self.claim.max_batch_size == 0 || self.claim.max_batch_size > MAX_CLAIM_BATCH_SIZE {
            errors.push(format!(
                "claim.max_batch_size must be between 1 and {}",
                MAX_CLAIM_BATCH_SIZE
            ));
        }
        if self.swap.execution_batch_size == 0
            || self.swap.execution_batch_size > MAX_EXECUTION_BATCH_SIZE
        {
            errors.push(format!(
                "swap.execution_batch_size must be between 1 and {}",
                MAX_EXECUTION_BATCH_SIZE
            ));
        }
        if self.swap.quote_batch_size == 0 {
            errors.push("swap.quote_batch_size must be positive".to_string());
        }

        let slippage = &self.swap.slippage;
        if slippage
            .impact_tiers
            .windows(2)
            .any(|pair| pair[0].below >= pair[1].below)
        {
            errors.push("swap.slippage.impact_tiers must be ascending".to_string());
        }
        if slippage
            .value_ceilings
            .windows(2)
            .any(|pair| pair[0].min_usd <= pair[1].min_usd)
        {
            errors.push("swap.slippage.value_ceilings must be descending".to_string());
        }
        let ceilings = slippage
            .value_ceilings
            .iter()
            .map(|c| c.ceiling)
            .chain(std::iter::once(slippage.floor_ceiling));
        for ceiling in ceilings {
            if ceiling <= Decimal::ZERO || ceiling >= Decimal::ONE {
                errors.push(format!("slippage ceiling {} must be between 0 and 1", ceiling));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
