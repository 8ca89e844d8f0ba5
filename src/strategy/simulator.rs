//! Batch simulation with bisection
//!
//! Every leg is dry-run on its own first. Survivors are then dry-run together
//! in execution-sized groups; a failing group is split in half and each half
//! retried until the offending legs are isolated. Each group that passed as a
//! whole is returned as its own execution batch; halves of a failed group are
//! never merged back together.

use alloy::primitives::Address;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::contracts::encode_execute_swaps;
use crate::adapters::{ChainClient, LegSimulator, TxRequest};
use crate::domain::{FailedTokenRecord, FailureKind, FailureStage, SwapLeg};

/// Simulates legs as an `executeSwaps` call against the executor contract.
pub struct ExecutorSimulator {
    chain: Arc<dyn ChainClient>,
    executor: Address,
}

impl ExecutorSimulator {
    pub fn new(chain: Arc<dyn ChainClient>, executor: Address) -> Self {
        Self { chain, executor }
    }
}

#[async_trait]
impl LegSimulator for ExecutorSimulator {
    async fn simulate(&self, from: Address, legs: &[SwapLeg]) -> Result<(), String> {
        let tx = TxRequest::new(
            self.executor,
            encode_execute_swaps(legs, from),
            format!("simulate {} leg(s)", legs.len()),
        );
        self.chain
            .call(from, &tx)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulationOutcome {
    /// Groups that passed simulation together, in plan order. Each is one execution batch.
    pub groups: Vec<Vec<SwapLeg>>,
    pub failures: Vec<FailedTokenRecord>,
    pub simulate_calls: usize,
}

impl SimulationOutcome {
    /// Passing legs in plan order.
    pub fn passing(&self) -> impl Iterator<Item = &SwapLeg> {
        self.groups.iter().flatten()
    }

    pub fn passing_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

type Split = (Vec<Vec<SwapLeg>>, Vec<(SwapLeg, String)>);

pub struct BatchSimulator {
    simulator: Arc<dyn LegSimulator>,
    group_size: usize,
}

impl BatchSimulator {
    pub fn new(simulator: Arc<dyn LegSimulator>, group_size: usize) -> Self {
        Self {
            simulator,
            group_size: group_size.max(1),
        }
    }

    pub async fn run(&self, from: Address, legs: Vec<SwapLeg>) -> SimulationOutcome {
        let calls = AtomicUsize::new(0);
        let mut failures = Vec::new();

        // Phase 1: standalone
        let mut survivors = Vec::with_capacity(legs.len());
        for leg in legs {
            calls.fetch_add(1, Ordering::Relaxed);
            match self.simulator.simulate(from, std::slice::from_ref(&leg)).await {
                Ok(()) => survivors.push(leg),
                Err(reason) => {
                    warn!(symbol = %leg.symbol, %reason, "Leg failed standalone simulation");
                    failures.push(Self::record(&leg, format!("standalone: {}", reason)));
                }
            }
        }

        // Phase 2: together, bisecting failing groups
        let mut groups = Vec::new();
        for group in survivors.chunks(self.group_size) {
            let (ok, failed) = self.bisect(from, group.to_vec(), &calls).await;
            groups.extend(ok);
            for (leg, reason) in failed {
                warn!(symbol = %leg.symbol, %reason, "Leg isolated by bisection");
                failures.push(Self::record(&leg, format!("in batch: {}", reason)));
            }
        }

        let outcome = SimulationOutcome {
            groups,
            failures,
            simulate_calls: calls.load(Ordering::Relaxed),
        };
        info!(
            passing = outcome.passing_count(),
            groups = outcome.groups.len(),
            failed = outcome.failures.len(),
            calls = outcome.simulate_calls,
            "Simulation complete"
        );
        outcome
    }

    /// Returns `(passing groups, failing legs)` for `legs`.
    fn bisect<'a>(
        &'a self,
        from: Address,
        legs: Vec<SwapLeg>,
        calls: &'a AtomicUsize,
    ) -> BoxFuture<'a, Split> {
        async move {
            if legs.is_empty() {
                return (Vec::new(), Vec::new());
            }
            calls.fetch_add(1, Ordering::Relaxed);
            let reason = match self.simulator.simulate(from, &legs).await {
                Ok(()) => return (vec![legs], Vec::new()),
                Err(reason) => reason,
            };
            if legs.len() == 1 {
                return (Vec::new(), legs.into_iter().map(|l| (l, reason.clone())).collect());
            }

            debug!(size = legs.len(), "Group failed, bisecting");
            let mut left = legs;
            let right = left.split_off(left.len() / 2);
            let (mut passing, mut failing) = self.bisect(from, left, calls).await;
            let (right_passing, right_failing) = self.bisect(from, right, calls).await;
            passing.extend(right_passing);
            failing.extend(right_failing);
            (passing, failing)
        }
        .boxed()
    }

    fn record(leg: &SwapLeg, reason: String) -> FailedTokenRecord {
        FailedTokenRecord::new(
            leg.token_in,
            leg.symbol.clone(),
            FailureStage::SimulationFailed,
            FailureKind::SimulationFailure,
            reason,
        )
    }
}
