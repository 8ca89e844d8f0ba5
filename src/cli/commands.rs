//! Command runners: wire configuration into live collaborators and print results.

use alloy::primitives::Address;
use anyhow::Context;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

use super::output::{self, OutputMode};
use super::{Cli, Commands};
use crate::adapters::contracts::MULTICALL3_ADDRESS;
use crate::adapters::{
    connect_provider, parse_signer, EvmChainClient, HttpPriceSource, HttpRewardLedger,
    LegacyGasSender, PriceSource, ProviderSender, PublicIndexPriceSource, TxSender,
    ZeroExQuoteSource,
};
use crate::config::AppConfig;
use crate::domain::SweepReport;
use crate::error::SweepError;
use crate::strategy::{
    Collaborators, ExecutorSimulator, PriceResolver, SubmissionChain, SweepOrchestrator,
};

const PRIVATE_KEY_VARS: [&str; 2] = ["SWEEP_PRIVATE_KEY", "PRIVATE_KEY"];

fn parse_address(label: &str, value: &str) -> anyhow::Result<Address> {
    Address::from_str(value.trim()).with_context(|| format!("invalid {} address: {}", label, value))
}

fn private_key_from_env() -> Option<String> {
    PRIVATE_KEY_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .filter(|key| !key.trim().is_empty())
}

/// Build the orchestrator from configuration and return it with the wallet it acts for.
pub async fn build_orchestrator(
    config: &AppConfig,
    wallet: Option<&str>,
) -> anyhow::Result<(Arc<SweepOrchestrator>, Address)> {
    let signer = private_key_from_env()
        .map(|key| parse_signer(&key))
        .transpose()?;
    let signer_address = signer.as_ref().map(|s| s.address());
    let wallet = match (wallet, signer_address) {
        (Some(w), _) => parse_address("wallet", w)?,
        (None, Some(address)) => address,
        (None, None) => return Err(SweepError::NoSigner.into()),
    };

    let chain_id = config.chain.chain_id;
    let provider = connect_provider(&config.chain.rpc_url, signer)?;
    let chain = Arc::new(EvmChainClient::connect(provider.clone(), chain_id, MULTICALL3_ADDRESS).await?);
    info!(chain_id, %wallet, "Connected");

    let timeout = config.confirmation_timeout();
    let mut senders: Vec<Arc<dyn TxSender>> =
        vec![Arc::new(ProviderSender::new(provider.clone(), wallet, timeout))];
    if config.chain.legacy_gas_fallback {
        senders.push(Arc::new(LegacyGasSender::new(provider, wallet, timeout)));
    }

    let ledger = HttpRewardLedger::new(
        &config.ledger.base_url,
        chain_id,
        Duration::from_secs(config.ledger.timeout_secs),
    )?;

    let price_timeout = Duration::from_secs(config.prices.timeout_secs);
    let primary: Arc<dyn PriceSource> =
        Arc::new(HttpPriceSource::new(&config.prices.primary_url, price_timeout)?);
    let fallback = match config.prices.fallback_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            Some(Arc::new(PublicIndexPriceSource::new(url, price_timeout)?) as Arc<dyn PriceSource>)
        }
        _ => None,
    };

    let quotes = ZeroExQuoteSource::new(
        Some(&config.aggregator.base_url),
        config.aggregator.api_key.clone(),
        Duration::from_secs(config.aggregator.timeout_secs),
    )?;

    let orchestrator_config = config.orchestrator_config()?;
    let simulator = ExecutorSimulator::new(chain.clone(), orchestrator_config.executor);

    let collaborators = Collaborators {
        chain,
        sender: Arc::new(SubmissionChain::new(senders)),
        ledger: Arc::new(ledger),
        prices: PriceResolver::new(primary, fallback),
        quotes: Arc::new(quotes),
        simulator: Arc::new(simulator),
        signer: signer_address,
    };

    Ok((
        Arc::new(SweepOrchestrator::new(collaborators, orchestrator_config)),
        wallet,
    ))
}

/// Cancel scheduling of further batches on Ctrl+C.
fn cancel_on_ctrl_c(orchestrator: &Arc<SweepOrchestrator>) {
    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, finishing the current transaction then stopping");
            cancel.cancel();
        }
    });
}

/// Print progress events to stderr while a write operation runs.
fn follow_progress(orchestrator: &Arc<SweepOrchestrator>, mode: OutputMode) {
    if mode == OutputMode::Json {
        return;
    }
    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            eprintln!("» {}", event);
        }
    });
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let mode = OutputMode::from_json_flag(cli.json);

    if let Commands::Report { file } = &cli.command {
        let raw = std::fs::read_to_string(file).with_context(|| format!("reading {}", file))?;
        let report: SweepReport = serde_json::from_str(&raw)?;
        return output::print_report(&report, mode);
    }

    let (orchestrator, wallet) = build_orchestrator(&config, cli.wallet.as_deref()).await?;

    match cli.command {
        Commands::Refresh => {
            let snapshot = orchestrator.refresh(wallet).await?;
            output::print_snapshot(&snapshot, mode)?;
        }
        Commands::ClaimAll => {
            cancel_on_ctrl_c(&orchestrator);
            follow_progress(&orchestrator, mode);
            let outcome = orchestrator.claim_all(wallet).await?;
            output::print_claim_outcome(&outcome, mode)?;
        }
        Commands::ClaimOne { token } => {
            let token = parse_address("token", &token)?;
            cancel_on_ctrl_c(&orchestrator);
            follow_progress(&orchestrator, mode);
            let outcome = orchestrator.claim_one(wallet, token).await?;
            output::print_claim_outcome(&outcome, mode)?;
        }
        Commands::Sweep { target, out } => {
            let target = parse_address("target", &target)?;
            cancel_on_ctrl_c(&orchestrator);
            follow_progress(&orchestrator, mode);
            let report = orchestrator.sweep_to(target, wallet).await?;
            if let Some(path) = out {
                std::fs::write(&path, serde_json::to_string_pretty(&report)?)
                    .with_context(|| format!("writing {}", path))?;
                info!(%path, "Report written");
            }
            output::print_report(&report, mode)?;
        }
        Commands::Report { .. } => {}
    }
    Ok(())
}
