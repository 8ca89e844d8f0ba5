//! Sweep engine
//!
//! ## Architecture
//!
//! Claim path: ledger claims are checked against the distributor
//! (`solvency`) and submitted in bounded batches (`claimer`).
//!
//! Swap path: wallet holdings are priced (`screener`), quoted and bounded
//! (`planner`, `slippage`), dry-run with bisection (`simulator`) and executed
//! in batches. `orchestrator` drives both paths and owns run control.

pub mod claimer;
pub mod events;
pub mod orchestrator;
pub mod planner;
pub mod screener;
pub mod simulator;
pub mod slippage;
pub mod solvency;
pub mod submission;

pub use claimer::{
    chunk_claims, preflight_native_gas, ClaimAttempt, ClaimBatcher, ClaimHalt, ClaimMode,
    ClaimOutcome, ClaimerConfig, MAX_CLAIM_BATCH_SIZE,
};
pub use events::{BusyFlag, CancelFlag, ProgressBus, ProgressEvent, SweepStage};
pub use orchestrator::{
    Collaborators, OrchestratorConfig, RewardToken, SwapSettings, SweepOrchestrator,
    MAX_EXECUTION_BATCH_SIZE,
};
pub use planner::{PlanOutcome, PlannerConfig, SwapPlanBuilder};
pub use screener::{PriceResolver, ScreenOutcome, TokenScreener};
pub use simulator::{BatchSimulator, ExecutorSimulator, SimulationOutcome};
pub use slippage::{ImpactTier, SlippageCheck, SlippageConfig, SlippageModel, TierBound, ValueCeiling};
pub use solvency::{SolvencyReport, SolvencyValidator};
pub use submission::SubmissionChain;
