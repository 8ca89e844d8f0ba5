pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod strategy;

pub use config::AppConfig;
pub use error::{Result, SweepError};
pub use strategy::{Collaborators, OrchestratorConfig, SweepOrchestrator};
