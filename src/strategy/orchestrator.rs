//! Sweep orchestrator
//!
//! Drives the claim path (ledger, solvency, claim batches) and the swap path
//! (balances, screening, approvals, quotes, simulation, execution) for one
//! wallet, and merges every absorbed failure into a single report.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::adapters::contracts::{encode_approve, encode_execute_swaps};
use crate::adapters::{ChainClient, LegSimulator, QuoteSource, RewardLedger, TxRequest, TxSender};
use crate::domain::units::to_decimal_units;
use crate::domain::{
    ClaimDescriptor, Epoch, FailedTokenRecord, FailureKind, FailureStage, RefreshSnapshot,
    RewardClaim, RewardRow, SwapCandidate, SwapLeg, SweepReport, WalletHolding,
};
use crate::error::{Result, SweepError};

use super::claimer::{preflight_native_gas, ClaimBatcher, ClaimHalt, ClaimOutcome, ClaimerConfig};
use super::events::{BusyFlag, CancelFlag, ProgressBus, ProgressEvent, SweepStage};
use super::planner::{PlannerConfig, SwapPlanBuilder};
use super::screener::{PriceResolver, TokenScreener};
use super::simulator::BatchSimulator;
use super::slippage::{SlippageConfig, SlippageModel};
use super::solvency::{SolvencyReport, SolvencyValidator};

/// Hard ceiling on legs per executor transaction.
pub const MAX_EXECUTION_BATCH_SIZE: usize = 8;

/// Swap-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapSettings {
    /// Legs per `executeSwaps` transaction (capped at 8)
    pub execution_batch_size: usize,
    /// Gas limit for one `approve`
    pub approve_gas_limit: u64,
    /// Per-leg gas used when estimating an execution batch fails
    pub gas_per_leg: u64,
    /// Headroom added to a successful estimate, in percent
    pub gas_buffer_pct: u64,
    /// Rows worth less than this are flagged as dust
    pub dust_threshold_usd: Decimal,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            execution_batch_size: MAX_EXECUTION_BATCH_SIZE,
            approve_gas_limit: 80_000,
            gas_per_leg: 350_000,
            gas_buffer_pct: 20,
            dust_threshold_usd: dec!(1),
        }
    }
}

impl SwapSettings {
    pub fn batch_size(&self) -> usize {
        self.execution_batch_size.clamp(1, MAX_EXECUTION_BATCH_SIZE)
    }

    fn batch_gas(&self, legs: usize) -> u64 {
        self.gas_per_leg.saturating_mul(legs as u64)
    }
}

/// A reward token swept from the wallet whether or not the ledger lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardToken {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub distributor: Address,
    pub executor: Address,
    pub claim: ClaimerConfig,
    pub planner: PlannerConfig,
    pub slippage: SlippageConfig,
    pub swap: SwapSettings,
    /// Known reward tokens, merged with whatever the ledger reports
    pub reward_tokens: Vec<RewardToken>,
}

/// External capabilities the orchestrator runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub chain: Arc<dyn ChainClient>,
    pub sender: Arc<dyn TxSender>,
    pub ledger: Arc<dyn RewardLedger>,
    pub prices: PriceResolver,
    pub quotes: Arc<dyn QuoteSource>,
    pub simulator: Arc<dyn LegSimulator>,
    /// Address of the configured signer, if any.
    pub signer: Option<Address>,
}

/// Ledger claims plus their on-chain validation.
struct ClaimLoad {
    claims: Vec<RewardClaim>,
    solvency: SolvencyReport,
}

impl ClaimLoad {
    /// Ledger tokens plus configured reward tokens, ordered by address.
    /// Ledger metadata wins when a token appears in both.
    fn tokens(&self, configured: &[RewardToken]) -> BTreeMap<Address, (String, u8)> {
        let mut tokens = BTreeMap::new();
        for claim in &self.claims {
            tokens
                .entry(claim.token)
                .or_insert_with(|| (claim.symbol.clone(), claim.decimals));
        }
        for token in configured {
            tokens
                .entry(token.address)
                .or_insert_with(|| (token.symbol.clone(), token.decimals));
        }
        tokens
    }

    fn in_ledger(&self, token: Address) -> bool {
        self.claims.iter().any(|c| c.token == token)
    }
}

pub struct SweepOrchestrator {
    chain: Arc<dyn ChainClient>,
    sender: Arc<dyn TxSender>,
    ledger: Arc<dyn RewardLedger>,
    screener: TokenScreener,
    prices: PriceResolver,
    planner: SwapPlanBuilder,
    simulator: BatchSimulator,
    signer: Option<Address>,
    config: OrchestratorConfig,
    busy: BusyFlag,
    cancel: CancelFlag,
    events: ProgressBus,
}

impl SweepOrchestrator {
    pub fn new(collaborators: Collaborators, config: OrchestratorConfig) -> Self {
        let planner = SwapPlanBuilder::new(
            collaborators.quotes,
            SlippageModel::new(config.slippage.clone()),
            config.planner.clone(),
        );
        let simulator = BatchSimulator::new(collaborators.simulator, config.swap.batch_size());
        Self {
            chain: collaborators.chain,
            sender: collaborators.sender,
            ledger: collaborators.ledger,
            screener: TokenScreener::new(collaborators.prices.clone()),
            prices: collaborators.prices,
            planner,
            simulator,
            signer: collaborators.signer,
            config,
            busy: BusyFlag::new(),
            cancel: CancelFlag::new(),
            events: ProgressBus::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Stop scheduling further transactions. Anything already submitted runs to completion.
    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    fn ensure_signer(&self, wallet: Address) -> Result<()> {
        match self.signer {
            None => Err(SweepError::NoSigner),
            Some(signer) if signer != wallet => Err(SweepError::SignerMismatch { signer, wallet }),
            Some(_) => Ok(()),
        }
    }

    fn batcher(&self) -> ClaimBatcher {
        ClaimBatcher::new(
            self.chain.clone(),
            self.sender.clone(),
            self.config.distributor,
            self.config.claim.clone(),
        )
    }

    async fn load_claims(&self, wallet: Address) -> Result<ClaimLoad> {
        let claims = self.ledger.pending_claims(wallet).await?;
        let descriptors: Vec<ClaimDescriptor> = claims.iter().map(RewardClaim::descriptor).collect();
        let solvency = SolvencyValidator::new(self.chain.as_ref(), self.config.distributor)
            .validate(wallet, &descriptors)
            .await;
        Ok(ClaimLoad { claims, solvency })
    }

    /// Recompute claimable rewards, wallet balances and USD values from scratch.
    #[instrument(skip_all, fields(%wallet))]
    pub async fn refresh(&self, wallet: Address) -> Result<RefreshSnapshot> {
        self.events.emit(SweepStage::Refreshing, "Refreshing rewards and balances");
        let load = self.load_claims(wallet).await?;
        self.snapshot(wallet, &load).await
    }

    async fn snapshot(&self, wallet: Address, load: &ClaimLoad) -> Result<RefreshSnapshot> {
        let tokens = load.tokens(&self.config.reward_tokens);
        let holdings: Vec<WalletHolding> = self
            .read_holdings(wallet, &tokens)
            .await?
            .into_iter()
            // Configured tokens only show up once the wallet holds some.
            .filter(|h| !h.wallet_balance.is_zero() || load.in_ledger(h.token))
            .collect();
        let addresses: Vec<Address> = holdings.iter().map(|h| h.token).collect();

        let ledger_amounts: HashMap<(Address, Epoch), U256> = load
            .claims
            .iter()
            .map(|c| ((c.token, c.epoch), c.raw_amount))
            .collect();
        let mut claimable: HashMap<Address, U256> = HashMap::new();
        for claim in &load.solvency.keep {
            // Unverified claims fall back to the ledger's figure for display.
            let amount = if claim.unverified {
                ledger_amounts
                    .get(&(claim.claim.token, claim.claim.epoch))
                    .copied()
                    .unwrap_or_default()
            } else {
                claim.claimable_preview
            };
            let entry = claimable.entry(claim.claim.token).or_default();
            *entry = entry.saturating_add(amount);
        }

        let mut prices = self.prices.resolve(self.chain.chain_id(), &addresses).await;
        for claim in &load.claims {
            if let Some(price) = claim.source_price_usd.filter(|p| *p > Decimal::ZERO) {
                prices.entry(claim.token).or_insert(price);
            }
        }

        let dust_threshold = self.config.swap.dust_threshold_usd;
        let mut rows: Vec<RewardRow> = holdings
            .into_iter()
            .map(|holding| {
                let claimable = claimable.get(&holding.token).copied().unwrap_or_default();
                let price_usd = prices.get(&holding.token).copied();
                let decimals = holding.decimals;
                let value = |raw: U256| {
                    price_usd
                        .map(|p| to_decimal_units(raw, decimals) * p)
                        .unwrap_or_default()
                };
                let claimable_usd = value(claimable);
                let wallet_usd = value(holding.wallet_balance);
                RewardRow {
                    token: holding.token,
                    symbol: holding.symbol,
                    decimals,
                    claimable,
                    wallet_balance: holding.wallet_balance,
                    price_usd,
                    claimable_usd,
                    wallet_usd,
                    dust: claimable_usd + wallet_usd < dust_threshold,
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total_usd()
                .cmp(&a.total_usd())
                .then_with(|| a.token.cmp(&b.token))
        });

        let total_staked = match self.chain.total_staked(self.config.distributor).await {
            Ok(staked) => Some(staked),
            Err(e) => {
                warn!(error = %e, "Could not read total staked");
                None
            }
        };

        Ok(RefreshSnapshot {
            wallet,
            total_usd: rows.iter().map(RewardRow::total_usd).sum(),
            rows,
            total_staked,
            excluded_claims: load.solvency.failure_records(),
        })
    }

    /// Balances plus on-chain metadata, falling back to ledger metadata.
    async fn read_holdings(
        &self,
        wallet: Address,
        tokens: &BTreeMap<Address, (String, u8)>,
    ) -> Result<Vec<WalletHolding>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let addresses: Vec<Address> = tokens.keys().copied().collect();
        let balances = self.chain.balances(wallet, &addresses).await?;
        let infos = match self.chain.token_info(&addresses).await {
            Ok(infos) => infos,
            Err(e) => {
                warn!(error = %e, "Token metadata read failed, using ledger metadata");
                vec![None; addresses.len()]
            }
        };

        Ok(tokens
            .iter()
            .enumerate()
            .map(|(i, (token, (symbol, decimals)))| {
                let info = infos.get(i).cloned().flatten();
                WalletHolding {
                    token: *token,
                    symbol: info
                        .as_ref()
                        .map(|i| i.symbol.clone())
                        .unwrap_or_else(|| symbol.clone()),
                    decimals: info.as_ref().map(|i| i.decimals).unwrap_or(*decimals),
                    wallet_balance: balances.get(i).copied().unwrap_or_default(),
                }
            })
            .collect())
    }

    /// Claim every solvent reward for `wallet`.
    #[instrument(skip_all, fields(%wallet))]
    pub async fn claim_all(&self, wallet: Address) -> Result<ClaimOutcome> {
        self.ensure_signer(wallet)?;
        let _guard = self.busy.try_acquire().ok_or(SweepError::SweepInProgress)?;
        self.cancel.reset();
        let load = self.load_claims(wallet).await?;
        let outcome = self.run_claims(wallet, &load, None).await?;
        self.events.emit(SweepStage::Done, claim_summary(&outcome));
        claim_result(outcome)
    }

    /// Claim every solvent epoch of a single reward token.
    #[instrument(skip_all, fields(%wallet, %token))]
    pub async fn claim_one(&self, wallet: Address, token: Address) -> Result<ClaimOutcome> {
        self.ensure_signer(wallet)?;
        let _guard = self.busy.try_acquire().ok_or(SweepError::SweepInProgress)?;
        self.cancel.reset();
        let load = self.load_claims(wallet).await?;
        let outcome = self.run_claims(wallet, &load, Some(token)).await?;
        self.events.emit(SweepStage::Done, claim_summary(&outcome));
        claim_result(outcome)
    }

    /// Validate and submit claims. Errors only when there is nothing to do or
    /// the wallet cannot pay for gas; per-batch failures stay in the outcome.
    async fn run_claims(
        &self,
        wallet: Address,
        load: &ClaimLoad,
        only: Option<Address>,
    ) -> Result<ClaimOutcome> {
        self.events.emit(
            SweepStage::Validating,
            format!("Checking {} ledger reward(s) against the distributor", load.claims.len()),
        );
        let wanted = |token: &Address| only.map_or(true, |t| t == *token);
        let keep: Vec<_> = load
            .solvency
            .keep
            .iter()
            .filter(|c| wanted(&c.claim.token))
            .cloned()
            .collect();
        let excluded: Vec<FailedTokenRecord> = load
            .solvency
            .failure_records()
            .into_iter()
            .filter(|r| wanted(&r.address))
            .collect();

        if keep.is_empty() {
            info!(excluded = excluded.len(), "Nothing to claim");
            return Err(SweepError::NothingToClaim);
        }

        let batcher = self.batcher();
        preflight_native_gas(
            self.chain.as_ref(),
            wallet,
            batcher.planned_gas(&keep),
            self.config.claim.min_native_gas_wei,
        )
        .await?;

        self.events.emit(
            SweepStage::Claiming,
            format!("Claiming {} reward(s)", keep.len()),
        );
        let mut outcome = batcher.submit(wallet, &keep, &self.cancel).await;
        let mut records = excluded;
        records.append(&mut outcome.excluded);
        outcome.excluded = records;
        Ok(outcome)
    }

    /// Claim everything, then sell every priced reward token into `target`.
    #[instrument(skip_all, fields(%target, %wallet))]
    pub async fn sweep_to(&self, target: Address, wallet: Address) -> Result<SweepReport> {
        self.ensure_signer(wallet)?;
        let _guard = self.busy.try_acquire().ok_or(SweepError::SweepInProgress)?;
        self.cancel.reset();

        let mut report = SweepReport::new(wallet, target);
        info!(id = %report.id, "Sweep started");

        let result = self.sweep_inner(target, wallet, &mut report).await;
        match result {
            Ok(()) => {}
            Err(e @ (SweepError::UserRejected | SweepError::Cancelled | SweepError::InsufficientGas { .. }))
                if report.made_progress() =>
            {
                info!(reason = %e, "Sweep stopped early");
                report.halted = Some(e.to_string());
            }
            Err(e) => {
                if e.is_user_rejection() {
                    info!("Sweep rejected by user");
                } else {
                    warn!(error = %e, "Sweep aborted");
                }
                self.events.emit(SweepStage::Done, format!("Sweep stopped: {}", e));
                return Err(e);
            }
        }

        report.final_snapshot = match self.refresh(wallet).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "Final refresh failed");
                None
            }
        };

        let report = report.finish();
        info!(summary = %report.summary(), "Sweep finished");
        self.events.emit(SweepStage::Done, report.summary());
        Ok(report)
    }

    async fn sweep_inner(
        &self,
        target: Address,
        wallet: Address,
        report: &mut SweepReport,
    ) -> Result<()> {
        let load = self.load_claims(wallet).await?;

        // Claim path
        match self.run_claims(wallet, &load, None).await {
            Ok(outcome) => {
                report.claims_attempted = outcome.attempted();
                report.claims_succeeded = outcome.succeeded();
                report.claim_receipts = outcome.receipts().map(|r| r.tx_hash).collect();
                report
                    .failed_tokens
                    .extend(outcome.excluded.iter().filter(|r| is_sweep_failure(r)).cloned());
                match outcome.halted {
                    Some(ClaimHalt::UserRejected) => return Err(SweepError::UserRejected),
                    Some(ClaimHalt::Cancelled) => return Err(SweepError::Cancelled),
                    None => {}
                }
                if outcome.all_failed() {
                    warn!(
                        attempted = outcome.attempted(),
                        "Every claim attempt failed, skipping swap phase"
                    );
                    report.swap_phase_skipped = true;
                    return Ok(());
                }
            }
            Err(SweepError::NothingToClaim) => {
                report.failed_tokens.extend(
                    load.solvency
                        .failure_records()
                        .into_iter()
                        .filter(is_sweep_failure),
                );
                info!("Nothing to claim, sweeping wallet balances");
            }
            Err(e) => return Err(e),
        }

        // Swap path
        self.events.emit(SweepStage::Refreshing, "Reading wallet balances");
        let holdings = self
            .read_holdings(wallet, &load.tokens(&self.config.reward_tokens))
            .await?;

        self.events.emit(
            SweepStage::Screening,
            format!("Pricing {} held token(s)", holdings.len()),
        );
        let screened = self
            .screener
            .screen(self.chain.chain_id(), &holdings, target)
            .await;
        report.failed_tokens.extend(screened.failures);
        if screened.candidates.is_empty() {
            if report.claims_succeeded > 0 {
                info!("No swap candidates after claiming");
                return Ok(());
            }
            return Err(SweepError::NoSwapCandidates);
        }

        let candidates = self.ensure_allowances(wallet, screened.candidates, report).await?;
        if candidates.is_empty() {
            return Ok(());
        }

        self.events.emit(
            SweepStage::Quoting,
            format!("Fetching quotes for {} token(s)", candidates.len()),
        );
        let planned = self
            .planner
            .build(self.chain.chain_id(), &candidates, target, self.config.executor)
            .await;
        report.failed_tokens.extend(planned.failures);
        if planned.plan.is_empty() {
            info!("No leg survived quoting");
            return Ok(());
        }

        self.events.emit(
            SweepStage::Simulating,
            format!("Simulating {} swap(s)", planned.plan.len()),
        );
        let simulated = self.simulator.run(wallet, planned.plan.legs).await;
        report.failed_tokens.extend(simulated.failures);
        if simulated.groups.is_empty() {
            info!("No leg survived simulation");
            return Ok(());
        }

        self.execute(wallet, &simulated.groups, report).await
    }

    /// Approve the executor for every candidate whose allowance is short.
    async fn ensure_allowances(
        &self,
        wallet: Address,
        candidates: Vec<SwapCandidate>,
        report: &mut SweepReport,
    ) -> Result<Vec<SwapCandidate>> {
        let spender = self.config.executor;
        let tokens: Vec<Address> = candidates.iter().map(|c| c.token).collect();
        let allowances = match self.chain.allowances(wallet, spender, &tokens).await {
            Ok(allowances) if allowances.len() == tokens.len() => allowances,
            Ok(_) | Err(_) => {
                warn!("Allowance read failed, approving every candidate");
                vec![U256::ZERO; tokens.len()]
            }
        };

        let needs_approval = candidates
            .iter()
            .zip(&allowances)
            .filter(|(c, allowance)| **allowance < c.amount_in)
            .count();

        let swap = &self.config.swap;
        let gas_units = swap
            .approve_gas_limit
            .saturating_mul(needs_approval as u64)
            .saturating_add(swap.batch_gas(candidates.len()));
        preflight_native_gas(
            self.chain.as_ref(),
            wallet,
            gas_units,
            self.config.claim.min_native_gas_wei,
        )
        .await?;

        if needs_approval == 0 {
            return Ok(candidates);
        }
        self.events.emit(
            SweepStage::Approving,
            format!("Approving {} token(s)", needs_approval),
        );

        let mut approved = Vec::with_capacity(candidates.len());
        let mut pending = candidates.into_iter().zip(allowances);
        while let Some((candidate, allowance)) = pending.next() {
            if allowance >= candidate.amount_in {
                approved.push(candidate);
                continue;
            }
            if self.cancel.is_cancelled() {
                let rest = std::iter::once(candidate).chain(pending.map(|(c, _)| c));
                report.failed_tokens.extend(rest.map(|c| {
                    FailedTokenRecord::new(
                        c.token,
                        c.symbol,
                        FailureStage::Approval,
                        FailureKind::Cancelled,
                        "cancelled before approval",
                    )
                }));
                return Err(SweepError::Cancelled);
            }

            let tx = TxRequest::new(
                candidate.token,
                encode_approve(spender, U256::MAX),
                format!("approve {}", candidate.symbol),
            )
            .with_gas_limit(swap.approve_gas_limit);
            match self.sender.send_and_confirm(&tx).await {
                Ok(_) => approved.push(candidate),
                Err(err) if err.is_user_rejection() => {
                    info!(symbol = %candidate.symbol, "Approval rejected by user");
                    report.failed_tokens.record(FailedTokenRecord::new(
                        candidate.token,
                        candidate.symbol,
                        FailureStage::Approval,
                        FailureKind::UserRejected,
                        err.to_string(),
                    ));
                    return Err(SweepError::UserRejected);
                }
                Err(err) => {
                    warn!(symbol = %candidate.symbol, error = %err, "Approval failed");
                    report.failed_tokens.record(FailedTokenRecord::new(
                        candidate.token,
                        candidate.symbol,
                        FailureStage::Approval,
                        FailureKind::ApprovalFailure,
                        err.to_string(),
                    ));
                }
            }
        }
        Ok(approved)
    }

    /// Submit each simulated group as its own batch. A failed batch does not block later ones.
    async fn execute(
        &self,
        wallet: Address,
        groups: &[Vec<SwapLeg>],
        report: &mut SweepReport,
    ) -> Result<()> {
        let swap = &self.config.swap;
        let batches: Vec<&[SwapLeg]> = groups
            .iter()
            .filter(|group| !group.is_empty())
            .flat_map(|group| group.chunks(swap.batch_size()))
            .collect();
        let total = batches.len();

        for (index, batch) in batches.iter().enumerate() {
            if self.cancel.is_cancelled() {
                let rest = batches[index..].iter().copied().flatten();
                report
                    .failed_tokens
                    .extend(rest.map(|leg| leg_record(leg, FailureKind::Cancelled, "cancelled before submission")));
                return Err(SweepError::Cancelled);
            }

            self.events.emit(
                SweepStage::Executing,
                format!("Executing swap batch {}/{} ({} leg(s))", index + 1, total, batch.len()),
            );
            let tx = TxRequest::new(
                self.config.executor,
                encode_execute_swaps(batch, wallet),
                format!("executeSwaps {}/{}", index + 1, total),
            );
            let gas_limit = match self.chain.estimate_gas(wallet, &tx).await {
                Ok(estimate) => {
                    estimate.saturating_add(estimate.saturating_mul(swap.gas_buffer_pct) / 100)
                }
                Err(e) => {
                    let fallback = swap.batch_gas(batch.len());
                    warn!(error = %e, fallback, "Swap gas estimation failed, using fallback");
                    fallback
                }
            };
            let tx = tx.with_gas_limit(gas_limit);

            report.execution_batches += 1;
            report.swaps_attempted += batch.len();
            match self.sender.send_and_confirm(&tx).await {
                Ok(receipt) => {
                    report.success_count += batch.len();
                    report.swap_receipts.push(receipt.tx_hash);
                }
                Err(err) if err.is_user_rejection() => {
                    info!(batch = index + 1, "Swap batch rejected by user");
                    let rest = batches[index..].iter().copied().flatten();
                    report
                        .failed_tokens
                        .extend(rest.map(|leg| leg_record(leg, FailureKind::UserRejected, "rejected by user")));
                    return Err(SweepError::UserRejected);
                }
                Err(err) => {
                    warn!(batch = index + 1, error = %err, "Swap batch failed");
                    let reason = err.to_string();
                    report
                        .failed_tokens
                        .extend(batch.iter().map(|leg| leg_record(leg, FailureKind::ExecutionFailure, &reason)));
                }
            }
        }
        Ok(())
    }
}

/// Claims with nothing owed are routine and do not belong in a sweep's failure list.
fn is_sweep_failure(record: &FailedTokenRecord) -> bool {
    record.kind != FailureKind::NothingOwed
}

fn leg_record(leg: &SwapLeg, kind: FailureKind, reason: &str) -> FailedTokenRecord {
    FailedTokenRecord::new(
        leg.token_in,
        leg.symbol.clone(),
        FailureStage::ExecutionFailed,
        kind,
        reason,
    )
}

fn claim_summary(outcome: &ClaimOutcome) -> String {
    format!(
        "Claimed {}/{} transaction(s)",
        outcome.succeeded(),
        outcome.attempted()
    )
}

/// Map a finished claim run to the action-level result of `claim_all`/`claim_one`.
fn claim_result(outcome: ClaimOutcome) -> Result<ClaimOutcome> {
    if outcome.succeeded() == 0 {
        match outcome.halted {
            Some(ClaimHalt::UserRejected) => return Err(SweepError::UserRejected),
            Some(ClaimHalt::Cancelled) => return Err(SweepError::Cancelled),
            None => {}
        }
    }
    if outcome.all_failed() {
        return Err(SweepError::ClaimsFailed {
            attempted: outcome.attempted(),
            reason: outcome.first_error().unwrap_or("unknown").to_string(),
        });
    }
    Ok(outcome)
}
