//! Step Engine Tests
//!
//! Critical invariants tested:
//! - Each step adds `cost × effective_discount_factor` to the return
//! - The effective discount after n events is `discount^n`
//! - Category preconditions are checked for the whole batch before any
//!   trajectory is mutated
//! - `incorporate_until_nontrivial_action` auto-applies forced actions and
//!   truncates at the epoch limit, also for models without events
//! - `AwaitEvent(i)` draws from event stream `i`

mod common;

use common::{
    fixed_cost, idle_inventory, inventory, inventory_with, repeat, stuck, two_streams,
    InventoryConfig, TwoStreams,
};
use decision_simulator_core_rs::demonstrator::{self, StepKind};
use decision_simulator_core_rs::{
    typed_state, RngStreams, SimError, Simulatable, StateCategory, Trajectory,
};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Test Helpers
// ============================================================================

fn initiated(model: &dyn Simulatable, state: serde_json::Value) -> Vec<Trajectory> {
    let state = model.state_from_json(&state).unwrap();
    let mut trajs = vec![model.seeded_trajectory(1, 0)];
    model.initiate_state_from(&mut trajs, &state).unwrap();
    trajs
}

// ============================================================================
// Initiation
// ============================================================================

#[test]
fn test_initiate_resets_accumulators() {
    let model = inventory();
    let mut trajs: Vec<Trajectory> = (0..3).map(|i| model.seeded_trajectory(2, i)).collect();
    model.initiate_state(&mut trajs).unwrap();

    let policy = model.get_policy("random").unwrap();
    model.incorporate_action_with(&mut trajs, policy.as_ref()).unwrap();
    model.incorporate_event(&mut trajs).unwrap();
    assert!(trajs.iter().all(|t| t.event_count == 1));

    model.initiate_state(&mut trajs).unwrap();
    for traj in &trajs {
        assert_eq!(traj.event_count, 0);
        assert_eq!(traj.cumulative_return, 0.0);
        assert_eq!(traj.effective_discount_factor, 1.0);
        assert_eq!(traj.category, StateCategory::AwaitAction(0));
    }
}

#[test]
fn test_initiate_from_copies_state() {
    let model = inventory();
    let source = model
        .state_from_json(&json!({"on_hand": 2, "awaiting_demand": false}))
        .unwrap();

    let mut trajs: Vec<Trajectory> = (0..2).map(|i| model.seeded_trajectory(0, i)).collect();
    model.initiate_state_from(&mut trajs, &source).unwrap();

    trajs[0].next_action = 3;
    model.incorporate_action(&mut trajs[..1]).unwrap();

    // The second trajectory and the source are untouched
    assert_eq!(
        model.state_to_json(trajs[1].state().unwrap()).unwrap()["on_hand"],
        2
    );
    assert_eq!(model.state_to_json(&source).unwrap()["on_hand"], 2);
    assert_eq!(
        model.state_to_json(trajs[0].state().unwrap()).unwrap()["on_hand"],
        5
    );
}

// ============================================================================
// Return Accounting
// ============================================================================

#[test]
fn test_undiscounted_holding_costs() {
    let model = idle_inventory();
    let mut trajs = initiated(
        model.as_ref(),
        json!({"on_hand": 0, "awaiting_demand": false}),
    );
    let hold = model
        .get_policy_with(&json!({"id": "base_stock", "level": 0}))
        .unwrap();

    trajs[0].next_action = 3;
    model.incorporate_action(&mut trajs).unwrap();
    for _ in 0..4 {
        model.incorporate_event(&mut trajs).unwrap();
        model.incorporate_action_with(&mut trajs, hold.as_ref()).unwrap();
    }

    assert_eq!(trajs[0].event_count, 4);
    assert_eq!(trajs[0].cumulative_return, 12.0);
}

#[test]
fn test_discounted_holding_costs() {
    let model = inventory_with(&InventoryConfig {
        max_order: 3,
        holding: 1.0,
        penalty: 0.0,
        max_demand: 0,
        discount: 0.9,
    });
    let mut trajs = initiated(
        model.as_ref(),
        json!({"on_hand": 0, "awaiting_demand": false}),
    );
    let hold = model
        .get_policy_with(&json!({"id": "base_stock", "level": 0}))
        .unwrap();

    trajs[0].next_action = 2;
    model.incorporate_action(&mut trajs).unwrap();
    for _ in 0..3 {
        model.incorporate_event(&mut trajs).unwrap();
        model.incorporate_action_with(&mut trajs, hold.as_ref()).unwrap();
    }

    // 2 × (1 + 0.9 + 0.81)
    assert!((trajs[0].cumulative_return - 5.42).abs() < 1e-12);
    assert!((trajs[0].effective_discount_factor - 0.729).abs() < 1e-12);
}

#[test]
fn test_action_cost_is_discounted_too() {
    let model = fixed_cost(&[5.0, 10.0]);
    let mut trajs = vec![model.new_trajectory()];
    model.initiate_state(&mut trajs).unwrap();
    trajs[0].next_action = 1;
    model.incorporate_action(&mut trajs).unwrap();
    assert_eq!(trajs[0].cumulative_return, 10.0);
    assert_eq!(trajs[0].category, StateCategory::Final);
}

// ============================================================================
// Preconditions
// ============================================================================

#[test]
fn test_action_on_event_state_leaves_batch_untouched() {
    let model = inventory();
    let mut trajs: Vec<Trajectory> = (0..2).map(|i| model.seeded_trajectory(0, i)).collect();
    model
        .initiate_state_from(&mut trajs, &model.initial_state())
        .unwrap();

    trajs[1].next_action = 1;
    model.incorporate_action(&mut trajs[1..]).unwrap();
    assert!(trajs[1].category.is_await_event());

    trajs[0].next_action = 2;
    let err = model.incorporate_action(&mut trajs).unwrap_err();
    assert!(err.is_contract_violation());

    // Validation failed before anything was applied
    assert!(trajs[0].category.is_await_action());
    assert_eq!(
        model.state_to_json(trajs[0].state().unwrap()).unwrap()["on_hand"],
        0
    );
}

#[test]
fn test_action_on_final_state() {
    let model = fixed_cost(&[1.0]);
    let mut trajs = vec![model.new_trajectory()];
    model.initiate_state(&mut trajs).unwrap();
    model.incorporate_action(&mut trajs).unwrap();

    let err = model.incorporate_action(&mut trajs).unwrap_err();
    assert!(matches!(err, SimError::ContractViolation(_)));
}

#[test]
fn test_uninitiated_trajectory() {
    let model = inventory();
    let mut trajs = vec![model.new_trajectory()];
    assert!(model.incorporate_action(&mut trajs).is_err());
    // No trajectory awaits an event, nothing to do
    assert!(!model.incorporate_event(&mut trajs).unwrap());
}

#[test]
fn test_event_skips_non_event_trajectories() {
    let model = inventory();
    let mut trajs: Vec<Trajectory> = (0..2).map(|i| model.seeded_trajectory(0, i)).collect();
    model
        .initiate_state_from(&mut trajs, &model.initial_state())
        .unwrap();
    trajs[0].next_action = 3;
    model.incorporate_action(&mut trajs[..1]).unwrap();

    let still_waiting = model.incorporate_event(&mut trajs).unwrap();
    assert!(!still_waiting);
    assert_eq!(trajs[0].event_count, 1);
    assert_eq!(trajs[1].event_count, 0);
    assert!(trajs[1].category.is_await_action());
}

// ============================================================================
// Event Streams
// ============================================================================

#[test]
fn test_event_drawn_from_requested_stream() {
    let model = two_streams(false);
    let mut trajs = vec![model.seeded_trajectory(5, 3)];
    model.initiate_state(&mut trajs).unwrap();

    assert!(model.incorporate_event(&mut trajs).unwrap());
    assert_eq!(trajs[0].category, StateCategory::AwaitEvent(1));
    assert!(!model.incorporate_event(&mut trajs).unwrap());
    assert_eq!(trajs[0].category, StateCategory::Final);

    let state = typed_state::<TwoStreams>(model.as_ref(), trajs[0].state().unwrap()).unwrap();
    let mut streams = RngStreams::seeded(2, 5, 3);
    let first = streams.event(0).unwrap().next();
    let second = streams.event(1).unwrap().next();
    assert_eq!(state.draws, vec![(0, first), (1, second)]);
    assert_ne!(first, second);
}

#[test]
fn test_event_stream_out_of_range() {
    let model = two_streams(true);
    let mut trajs = vec![model.seeded_trajectory(5, 3)];
    model.initiate_state(&mut trajs).unwrap();
    model.incorporate_event(&mut trajs).unwrap();
    assert_eq!(trajs[0].category, StateCategory::AwaitEvent(2));

    let err = model.incorporate_event(&mut trajs).unwrap_err();
    assert!(err.is_contract_violation());
    assert_eq!(trajs[0].event_count, 1);
    assert_eq!(trajs[0].cumulative_return, 1.0);
}

// ============================================================================
// Policy Failures
// ============================================================================

#[test]
fn test_failed_policy_leaves_batch_untouched() {
    let model = stuck();
    let policy = model.get_policy("random").unwrap();
    let mut trajs: Vec<Trajectory> = (0..2).map(|i| model.seeded_trajectory(1, i)).collect();
    model.initiate_state(&mut trajs).unwrap();
    trajs[1].next_action = 0;
    model.incorporate_action(&mut trajs[1..]).unwrap();

    // trajs[0] gets an action, trajs[1] has none to offer
    for traj in trajs.iter_mut() {
        traj.next_action = 9;
    }
    let mut rng_before = trajs[0].rng.clone();

    let err = model
        .incorporate_action_with(&mut trajs, policy.as_ref())
        .unwrap_err();
    assert!(matches!(err, SimError::NoAllowedActions(_)));
    assert!(trajs.iter().all(|t| t.next_action == 9));
    assert_eq!(trajs[0].cumulative_return, 0.0);
    assert_eq!(rng_before.policy().next(), trajs[0].rng.policy().next());
}

// ============================================================================
// Advancing to Decisions
// ============================================================================

#[test]
fn test_nontrivial_decision_reached_immediately() {
    let model = inventory();
    let mut trajs = initiated(
        model.as_ref(),
        json!({"on_hand": 0, "awaiting_demand": false}),
    );
    assert!(model.incorporate_until_nontrivial_action(&mut trajs, 100).unwrap());
    assert_eq!(trajs[0].event_count, 0);
}

#[test]
fn test_forced_actions_until_event_limit() {
    // Full and never drained: the only allowed order is 0
    let model = idle_inventory();
    let mut trajs = initiated(
        model.as_ref(),
        json!({"on_hand": 6, "awaiting_demand": false}),
    );

    let reached = model.incorporate_until_nontrivial_action(&mut trajs, 7).unwrap();
    assert!(!reached);
    assert_eq!(trajs[0].category, StateCategory::EndOfHorizon);
    assert_eq!(trajs[0].event_count, 7);
    assert_eq!(trajs[0].cumulative_return, 42.0);
}

#[test]
fn test_forced_actions_without_events_stop_at_epoch_limit() {
    let model = repeat(&[1.0]);
    let mut trajs = vec![model.seeded_trajectory(1, 0)];
    model.initiate_state(&mut trajs).unwrap();

    assert!(!model.incorporate_until_nontrivial_action(&mut trajs, 3).unwrap());
    assert_eq!(trajs[0].category, StateCategory::EndOfHorizon);
    assert_eq!(trajs[0].event_count, 0);
    assert_eq!(trajs[0].epoch_count, 3);
    // Four actions: the first opens epoch 0, each later one closes an epoch
    assert_eq!(trajs[0].cumulative_return, 4.0);
}

#[test]
fn test_decision_without_allowed_actions() {
    let model = stuck();
    let mut trajs = vec![model.seeded_trajectory(1, 0)];
    model.initiate_state(&mut trajs).unwrap();
    trajs[0].next_action = 1;
    model.incorporate_action(&mut trajs).unwrap();

    let err = model
        .incorporate_until_nontrivial_action(&mut trajs, 10)
        .unwrap_err();
    assert!(matches!(err, SimError::NoAllowedActions(_)));
}

#[test]
fn test_advance_reports_all_or_nothing() {
    let model = inventory();
    let full = model
        .state_from_json(&json!({"on_hand": 6, "awaiting_demand": false}))
        .unwrap();
    let empty = model.initial_state();

    let mut trajs: Vec<Trajectory> = (0..2).map(|i| model.seeded_trajectory(0, i)).collect();
    model.initiate_state_from(&mut trajs[..1], &empty).unwrap();
    model.initiate_state_from(&mut trajs[1..], &full).unwrap();

    // With a zero event limit the full trajectory cannot get past its
    // forced order
    let all = model.incorporate_until_nontrivial_action(&mut trajs, 0).unwrap();
    assert!(!all);
    assert!(trajs[0].category.is_await_action());
    assert_eq!(trajs[1].category, StateCategory::EndOfHorizon);
}

#[test]
fn test_final_trajectories_are_left_alone() {
    let model = fixed_cost(&[1.0, 2.0]);
    let mut trajs = vec![model.new_trajectory()];
    model.initiate_state(&mut trajs).unwrap();
    trajs[0].next_action = 0;
    model.incorporate_action(&mut trajs).unwrap();

    assert!(!model.incorporate_until_nontrivial_action(&mut trajs, 10).unwrap());
    assert_eq!(trajs[0].category, StateCategory::Final);
    assert_eq!(trajs[0].cumulative_return, 1.0);
}

// ============================================================================
// Demonstrator
// ============================================================================

#[test]
fn test_trace_records_every_step() {
    let model = inventory();
    let policy = model.get_policy("base_stock").unwrap();
    let steps = demonstrator::trace(model.as_ref(), policy.as_ref(), 6, 7).unwrap();

    assert_eq!(steps[0].kind, StepKind::Initial);
    assert!(steps[0].state.is_some());

    let last = steps.last().unwrap();
    assert_eq!(last.kind, StepKind::Truncated);
    assert_eq!(last.event_count, 6);
    assert_eq!(last.category, StateCategory::EndOfHorizon);

    let total: f64 = steps.iter().map(|s| s.cost).sum();
    assert!((total - last.cumulative_return).abs() < 1e-9);

    let events = steps.iter().filter(|s| s.kind == StepKind::Event).count();
    assert_eq!(events, 6);
}

#[test]
fn test_trace_without_events_is_truncated() {
    let model = repeat(&[1.0, 1.0]);
    let policy = model.get_policy("random").unwrap();
    let steps = demonstrator::trace(model.as_ref(), policy.as_ref(), 4, 0).unwrap();

    let last = steps.last().unwrap();
    assert_eq!(last.kind, StepKind::Truncated);
    assert_eq!(last.epoch_count, 4);
    assert_eq!(last.event_count, 0);

    let actions = steps
        .iter()
        .filter(|s| matches!(s.kind, StepKind::Action { .. }))
        .count();
    assert_eq!(actions, 5);
}

#[test]
fn test_trace_is_reproducible() {
    let model = inventory();
    let policy = model.get_policy("random").unwrap();
    let a = demonstrator::trace(model.as_ref(), policy.as_ref(), 20, 3).unwrap();
    let b = demonstrator::trace(model.as_ref(), policy.as_ref(), 20, 3).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_trace_of_single_decision() {
    let model = fixed_cost(&[5.0, 10.0]);
    let policy = model.get_policy("first").unwrap();
    let steps = demonstrator::trace(model.as_ref(), policy.as_ref(), 10, 0).unwrap();

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1].kind, StepKind::Action { action: 0 });
    assert_eq!(steps[1].cost, 5.0);
    assert_eq!(steps[1].category, StateCategory::Final);
    // No JSON conversion for this model
    assert!(steps[1].state.is_none());

    let value = serde_json::to_value(&steps[1]).unwrap();
    assert_eq!(value["kind"], "action");
    assert_eq!(value["action"], 0);
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_effective_discount_is_power(discount in 0.01f64..=1.0, events in 1usize..30) {
        let model = inventory_with(&InventoryConfig {
            discount,
            ..common::inventory_config()
        });
        let policy = model.get_policy("random").unwrap();
        let mut trajs = vec![model.seeded_trajectory(4, 0)];
        model.initiate_state(&mut trajs).unwrap();

        for _ in 0..events {
            model.incorporate_action_with(&mut trajs, policy.as_ref()).unwrap();
            model.incorporate_event(&mut trajs).unwrap();
        }

        let expected = discount.powi(events as i32);
        prop_assert_eq!(trajs[0].event_count, events);
        prop_assert!((trajs[0].effective_discount_factor - expected).abs() <= 1e-12);
        prop_assert!(trajs[0].cumulative_return >= 0.0);
    }
}
