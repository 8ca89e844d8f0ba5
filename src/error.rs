use alloy::primitives::Address;
use thiserror::Error;

/// Main error type for the reward sweep engine.
///
/// Only conditions that make a whole action meaningless surface here. Per-token
/// problems are absorbed into [`crate::domain::FailedTokenRecord`] entries instead.
#[derive(Error, Debug)]
pub enum SweepError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Unsupported network: chain id {0}")]
    UnsupportedNetwork(u64),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Off-chain collaborators
    #[error("Reward ledger error: {0}")]
    Ledger(String),

    #[error("Price source error: {0}")]
    PriceSource(String),

    #[error("Quote failure: {0}")]
    Quote(String),

    // On-chain
    #[error("Simulation reverted: {0}")]
    Simulation(String),

    #[error("Address parsing error: {0}")]
    AddressParsing(String),

    // Signer errors
    #[error("No signer configured")]
    NoSigner,

    #[error("Signer {signer} cannot act for wallet {wallet}")]
    SignerMismatch { signer: Address, wallet: Address },

    #[error("Wallet error: {0}")]
    Wallet(String),

    // Action-level outcomes
    #[error("Insufficient native gas: balance {balance} wei, need {required} wei")]
    InsufficientGas { balance: String, required: String },

    #[error("Nothing to claim")]
    NothingToClaim,

    #[error("All {attempted} claim attempt(s) failed: {reason}")]
    ClaimsFailed { attempted: usize, reason: String },

    #[error("No swap candidates left after filtering")]
    NoSwapCandidates,

    #[error("Transaction rejected by user")]
    UserRejected,

    #[error("A sweep is already in progress for this wallet")]
    SweepInProgress,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SweepError {
    /// User rejections are expected outcomes and should not be logged as system errors.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, SweepError::UserRejected)
    }
}

/// Result type alias for SweepError
pub type Result<T> = std::result::Result<T, SweepError>;
