//! reward-sweep CLI
//!
//! Commands:
//! - `reward-sweep refresh` - Show claimable rewards and wallet balances
//! - `reward-sweep claim-all` - Claim every solvent reward
//! - `reward-sweep claim-one` - Claim a single reward token
//! - `reward-sweep sweep` - Claim, then swap every reward token into a target
//! - `reward-sweep report` - Print a previously exported sweep report

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

/// Reward settlement and sweep engine
#[derive(Parser, Debug)]
#[command(name = "reward-sweep")]
#[command(author, version, about = "Claim protocol rewards and sweep them into one asset", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml plus $SWEEP_ENV.toml)
    #[arg(short, long, default_value = "config", global = true)]
    pub config: String,

    /// Wallet to act for (defaults to the signer address)
    #[arg(short, long, global = true)]
    pub wallet: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show claimable rewards, wallet balances and USD values
    Refresh,

    /// Claim every solvent reward for the wallet
    ClaimAll,

    /// Claim all solvent epochs of one reward token
    ClaimOne {
        /// Reward token address
        token: String,
    },

    /// Claim everything, then swap every priced reward token into the target
    Sweep {
        /// Token to receive
        #[arg(short, long)]
        target: String,
        /// Write the final report as JSON to this path
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Print failures and de-registration suggestions from an exported report
    Report {
        /// Path to a report written by `sweep --out`
        file: String,
    },
}
