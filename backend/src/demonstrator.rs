//! Demonstrator
//!
//! Simulates a single trajectory under a policy and records every step, for
//! inspection of a model's behaviour or a policy's decisions.
//!
//! # Example
//!
//! ```rust,ignore
//! let policy = model.get_policy("random")?;
//! let trace = demonstrator::trace(model.as_ref(), policy.as_ref(), 20, 7)?;
//! println!("{}", serde_json::to_string_pretty(&trace)?);
//! ```

use crate::core::{SimError, SimResult, StateCategory};
use crate::erasure::Simulatable;
use crate::models::Trajectory;
use crate::policy::Policy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened in a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// Initial state drawn
    Initial,
    Event,
    Action { action: i64 },
    /// Truncated after `max_events` epochs
    Truncated,
}

/// One recorded step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    #[serde(flatten)]
    pub kind: StepKind,

    /// Discounted cost accrued by this step
    pub cost: f64,

    pub cumulative_return: f64,
    pub event_count: usize,
    pub epoch_count: usize,

    /// Category after the step
    pub category: StateCategory,

    /// State after the step, for models that convert states to JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

fn state_json(model: &dyn Simulatable, traj: &Trajectory) -> SimResult<Option<Value>> {
    match model.state_to_json(traj.state()?) {
        Ok(value) => Ok(Some(value)),
        Err(SimError::UnsupportedOperation(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn record(
    model: &dyn Simulatable,
    traj: &Trajectory,
    kind: StepKind,
    return_before: f64,
) -> SimResult<TraceStep> {
    Ok(TraceStep {
        kind,
        cost: traj.cumulative_return - return_before,
        cumulative_return: traj.cumulative_return,
        event_count: traj.event_count,
        epoch_count: traj.epoch_count,
        category: traj.category,
        state: state_json(model, traj)?,
    })
}

/// Trace one trajectory seeded `(seed, 0)` under `policy`
///
/// Stops at `Final`, or after `max_events` epochs with a final `Truncated`
/// step.
pub fn trace(
    model: &dyn Simulatable,
    policy: &dyn Policy,
    max_events: usize,
    seed: u64,
) -> SimResult<Vec<TraceStep>> {
    let mut traj = [model.seeded_trajectory(seed, 0)];
    model.initiate_state(&mut traj)?;

    let mut steps = vec![record(model, &traj[0], StepKind::Initial, 0.0)?];
    loop {
        let return_before = traj[0].cumulative_return;
        match traj[0].category {
            StateCategory::Final | StateCategory::EndOfHorizon => break,
            _ if traj[0].epoch_count >= max_events => {
                traj[0].category = StateCategory::EndOfHorizon;
                steps.push(record(model, &traj[0], StepKind::Truncated, return_before)?);
                break;
            }
            StateCategory::AwaitEvent(_) => {
                model.incorporate_event(&mut traj)?;
                steps.push(record(model, &traj[0], StepKind::Event, return_before)?);
            }
            StateCategory::AwaitAction(_) => {
                model.incorporate_action_with(&mut traj, policy)?;
                let action = traj[0].next_action;
                steps.push(record(model, &traj[0], StepKind::Action { action }, return_before)?);
            }
        }
    }
    Ok(steps)
}
