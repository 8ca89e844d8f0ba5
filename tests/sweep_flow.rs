mod common;

use alloy::primitives::U256;
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use common::*;
use reward_sweep::adapters::SubmitError;
use reward_sweep::domain::{FailureKind, FailureStage};
use reward_sweep::strategy::{RewardToken, SweepStage};
use reward_sweep::SweepError;

/// `count` already-claimed tokens worth $10 each, starting at token(1).
fn priced_holdings(scenario: &mut Scenario, count: u8) {
    for n in 1..=count {
        scenario
            .holding(token(n), &format!("T{}", n), units(10))
            .price(token(n), dec!(1));
    }
}

#[tokio::test]
async fn unpriced_token_is_screened_out_of_the_plan() {
    let mut scenario = Scenario::new();
    for n in 1..=3u8 {
        scenario.reward(token(n), &format!("T{}", n), epoch(1), units(10));
    }
    scenario.price(token(1), dec!(1)).price(token(2), dec!(1));
    let harness = scenario.build();
    let mut events = harness.orchestrator.subscribe();

    let report = assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);

    assert_eq!(report.claims_succeeded, 1);
    assert_eq!(harness.sender.approvals(), vec![token(1), token(2)]);
    let batches = harness.sender.swap_batches();
    assert_eq!(batches.len(), 1);
    let sold: Vec<_> = batches[0].steps.iter().map(|s| s.tokenIn).collect();
    assert_eq!(sold, vec![token(1), token(2)]);
    assert_eq!(batches[0].recipient, wallet());

    assert_eq!(report.success_count, 2);
    assert_eq!(report.failed_tokens.len(), 1);
    let record = &report.failed_tokens.records()[0];
    assert_eq!(record.address, token(3));
    assert_eq!(record.stage, FailureStage::PreScreening);
    assert_eq!(record.kind, FailureKind::NoValidPrice);
    assert_eq!(report.failed_tokens.deregistration_list(), vec![token(3)]);

    assert_eq!(harness.wallet_balance(token(1)), U256::ZERO);
    assert_eq!(harness.wallet_balance(token(3)), units(10));
    assert!(harness.wallet_balance(target()) > U256::ZERO);
    assert!(report.final_snapshot.is_some());
    assert!(report.finished_at.is_some());

    let mut stages = Vec::new();
    while let Ok(event) = events.try_recv() {
        stages.push(event.stage);
    }
    assert!(stages.contains(&SweepStage::Claiming));
    assert!(stages.contains(&SweepStage::Simulating));
    assert_eq!(stages.last(), Some(&SweepStage::Done));
}

#[tokio::test]
async fn leg_failing_simulation_is_dropped_from_execution() {
    let mut scenario = Scenario::new();
    priced_holdings(&mut scenario, 5);
    scenario.poisoned.insert(token(3));
    let harness = scenario.build();

    let report = assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);

    let batches = harness.sender.swap_batches();
    assert_eq!(batches.len(), 1);
    let sold: Vec<_> = batches[0].steps.iter().map(|s| s.tokenIn).collect();
    assert_eq!(sold, vec![token(1), token(2), token(4), token(5)]);

    let simulation_failures: Vec<_> = report
        .failed_tokens
        .records()
        .iter()
        .filter(|r| r.stage == FailureStage::SimulationFailed)
        .collect();
    assert_eq!(simulation_failures.len(), 1);
    assert_eq!(simulation_failures[0].address, token(3));
    assert_eq!(report.failed_tokens.len(), 1);
    // Five standalone runs plus one group run.
    assert_eq!(harness.simulator.calls(), 6);
}

#[tokio::test]
async fn legs_that_conflict_together_execute_in_separate_batches() {
    let mut scenario = Scenario::new();
    priced_holdings(&mut scenario, 8);
    scenario.state.conflicting = Some((token(2), token(7)));
    let harness = scenario.build();

    let report = assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);

    let batches = harness.sender.swap_batches();
    let sold: Vec<Vec<_>> = batches
        .iter()
        .map(|b| b.steps.iter().map(|s| s.tokenIn).collect())
        .collect();
    assert_eq!(
        sold,
        vec![
            vec![token(1), token(2), token(3), token(4)],
            vec![token(5), token(6), token(7), token(8)],
        ]
    );
    assert_eq!(report.execution_batches, 2);
    assert_eq!(report.success_count, 8);
    assert!(report.failed_tokens.is_empty());
    // Eight standalone runs, the failing group and its two halves.
    assert_eq!(harness.simulator.calls(), 11);
    assert_eq!(harness.wallet_balance(token(7)), U256::ZERO);
}

#[tokio::test]
async fn held_token_without_pending_rewards_is_swept() {
    let mut scenario = Scenario::new();
    scenario
        .holding(token(1), "AERO", units(10))
        .price(token(1), dec!(1));
    let harness = scenario.build();

    let report = assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);

    assert_eq!(report.claims_attempted, 0);
    assert_eq!(report.success_count, 1);
    assert_eq!(harness.sender.swap_batches()[0].steps[0].tokenIn, token(1));
    assert_eq!(harness.wallet_balance(token(1)), U256::ZERO);
}

#[tokio::test]
async fn claimed_rewards_are_swept_on_a_later_run() {
    let mut scenario = Scenario::new();
    scenario
        .reward(token(1), "AERO", epoch(1), units(10))
        .price(token(1), dec!(1));
    scenario.reward_tokens.push(RewardToken {
        address: token(1),
        symbol: "AERO".to_string(),
        decimals: 18,
    });
    let harness = scenario.build();

    assert_ok!(harness.orchestrator.claim_all(wallet()).await);
    assert_eq!(harness.wallet_balance(token(1)), units(10));

    let report = assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);
    assert_eq!(report.claims_attempted, 0);
    assert_eq!(report.success_count, 1);
    assert_eq!(harness.wallet_balance(token(1)), U256::ZERO);
}

#[tokio::test]
async fn seventeen_legs_execute_in_three_batches() {
    let mut scenario = Scenario::new();
    priced_holdings(&mut scenario, 17);
    let harness = scenario.build();

    let report = assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);

    let sizes: Vec<usize> = harness
        .sender
        .swap_batches()
        .iter()
        .map(|b| b.steps.len())
        .collect();
    assert_eq!(sizes, vec![8, 8, 1]);
    assert_eq!(report.execution_batches, 3);
    assert_eq!(report.success_count, 17);
    assert_eq!(harness.sender.approvals().len(), 17);
    assert!(report.failed_tokens.is_empty());
}

#[tokio::test]
async fn existing_allowance_skips_approval() {
    let mut scenario = Scenario::new();
    priced_holdings(&mut scenario, 2);
    scenario.state.allowances.insert(token(1), U256::MAX);
    let harness = scenario.build();

    assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);
    assert_eq!(harness.sender.approvals(), vec![token(2)]);
}

#[tokio::test]
async fn target_token_is_never_sold() {
    let mut scenario = Scenario::new();
    priced_holdings(&mut scenario, 2);
    scenario
        .holding(target(), "USDC", units(50))
        .price(target(), dec!(1));
    let harness = scenario.build();

    let report = assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);

    assert!(!harness.sender.approvals().contains(&target()));
    for batch in harness.sender.swap_batches() {
        assert!(batch.steps.iter().all(|s| s.tokenIn != target()));
        assert!(batch.steps.iter().all(|s| s.tokenOut == target()));
    }
    assert_eq!(report.success_count, 2);
    assert!(!report.failed_tokens.contains(&target()));
}

#[tokio::test]
async fn slippage_and_quote_failures_are_recorded_per_token() {
    let mut scenario = Scenario::new();
    priced_holdings(&mut scenario, 3);
    scenario.failing_quotes.insert(token(1));
    // $10 swap is capped at 5%, a 4% impact needs 7%.
    scenario.impacts.insert(token(2), dec!(0.04));
    let harness = scenario.build();

    let report = assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);

    let quote = report
        .failed_tokens
        .records()
        .iter()
        .find(|r| r.address == token(1))
        .unwrap();
    assert_eq!(quote.stage, FailureStage::Quote);
    let slippage = report
        .failed_tokens
        .records()
        .iter()
        .find(|r| r.address == token(2))
        .unwrap();
    assert_eq!(slippage.stage, FailureStage::Slippage);
    assert_eq!(slippage.kind, FailureKind::SlippageTooHigh);

    let batches = harness.sender.swap_batches();
    assert_eq!(batches[0].steps.len(), 1);
    let step = &batches[0].steps[0];
    assert_eq!(step.tokenIn, token(3));
    // Zero impact falls in the fixed 2% tier.
    assert_eq!(step.minAmountOut, units(10) * U256::from(98) / U256::from(100));
    assert_eq!(step.router, router());

    let requests = harness.quotes.requests.lock().unwrap();
    assert!(requests.iter().all(|r| r.taker == executor()));
    assert!(requests.iter().all(|r| r.slippage == dec!(0.05)));
}

#[tokio::test]
async fn failed_claims_skip_the_swap_phase() {
    let mut scenario = Scenario::new();
    scenario.reward(token(1), "A", epoch(1), units(10)).price(token(1), dec!(1));
    scenario.holding(token(2), "B", units(10)).price(token(2), dec!(1));
    let harness = scenario.build();
    harness.sender.fail_at(
        0,
        SubmitError::Reverted {
            tx_hash: Default::default(),
            reason: "execution reverted".to_string(),
        },
    );

    let report = assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);

    assert!(report.swap_phase_skipped);
    assert_eq!(report.claims_attempted, 1);
    assert_eq!(report.claims_succeeded, 0);
    assert_eq!(harness.sender.sent_count(), 1);
    assert!(harness.sender.swap_batches().is_empty());
    assert_eq!(report.failed_tokens.records()[0].stage, FailureStage::Claim);
}

#[tokio::test]
async fn no_priced_holdings_is_an_error() {
    let mut scenario = Scenario::new();
    scenario.holding(token(1), "A", units(10));
    let harness = scenario.build();

    let err = assert_err!(harness.orchestrator.sweep_to(target(), wallet()).await);
    assert!(matches!(err, SweepError::NoSwapCandidates));
    assert_eq!(harness.sender.sent_count(), 0);
}

#[tokio::test]
async fn rejected_first_swap_is_a_user_rejection() {
    let mut scenario = Scenario::new();
    priced_holdings(&mut scenario, 2);
    scenario.state.allowances.insert(token(1), U256::MAX);
    scenario.state.allowances.insert(token(2), U256::MAX);
    let harness = scenario.build();
    harness.sender.reject_at(0);

    let err = assert_err!(harness.orchestrator.sweep_to(target(), wallet()).await);
    assert!(matches!(err, SweepError::UserRejected));
    assert_eq!(harness.wallet_balance(token(1)), units(10));
    assert!(!harness.orchestrator.is_busy());
}

#[tokio::test]
async fn cancel_stops_scheduling_after_the_current_batch() {
    let mut scenario = Scenario::new();
    priced_holdings(&mut scenario, 17);
    for n in 1..=17u8 {
        scenario.state.allowances.insert(token(n), U256::MAX);
    }
    let harness = scenario.build();
    harness
        .sender
        .cancel_after(1, harness.orchestrator.cancel_handle());

    let report = assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);

    assert_eq!(harness.sender.swap_batches().len(), 1);
    assert_eq!(report.execution_batches, 1);
    assert_eq!(report.success_count, 8);
    assert!(report.halted.is_some());
    let cancelled = report
        .failed_tokens
        .records()
        .iter()
        .filter(|r| r.kind == FailureKind::Cancelled)
        .count();
    assert_eq!(cancelled, 9);
    assert_eq!(harness.wallet_balance(token(9)), units(10));
}

#[tokio::test]
async fn second_run_while_busy_is_refused() {
    let mut scenario = Scenario::new();
    priced_holdings(&mut scenario, 2);
    let harness = scenario.build();
    harness.sender.set_delay(Duration::from_millis(100));

    let orchestrator = harness.orchestrator.clone();
    let (first, second) = tokio::join!(orchestrator.sweep_to(target(), wallet()), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        harness.orchestrator.claim_all(wallet()).await
    });

    assert_ok!(first);
    let err = assert_err!(second);
    assert!(matches!(err, SweepError::SweepInProgress));
    assert!(!harness.orchestrator.is_busy());
}

#[tokio::test]
async fn exported_report_reads_back() {
    let mut scenario = Scenario::new();
    priced_holdings(&mut scenario, 2);
    scenario.holding(token(9), "NOPRICE", units(1));
    let harness = scenario.build();

    let report = assert_ok!(harness.orchestrator.sweep_to(target(), wallet()).await);
    let json = serde_json::to_string(&report).unwrap();
    let back: reward_sweep::domain::SweepReport = serde_json::from_str(&json).unwrap();

    assert_eq!(back.id, report.id);
    assert_eq!(back.failed_tokens.len(), 1);
    assert_eq!(back.summary(), report.summary());
}
