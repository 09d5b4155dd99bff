//! Rollout Evaluation
//!
//! Estimates the value of taking a candidate action in a state by simulating
//! the model forward under a continuation policy.
//!
//! # One rollout
//!
//! ```text
//! clone state → apply candidate action → loop {
//!     Final / EndOfHorizon         → stop
//!     epoch_count == H             → EndOfHorizon, stop (return kept)
//!     AwaitEvent                   → incorporate_event
//!     AwaitAction                  → continuation policy
//! }
//! score = return − return after the first L epochs
//! ```
//!
//! Epochs are counted as in [`Trajectory`](crate::models::Trajectory): one
//! per event, plus one per action that directly follows another action. A
//! model without events is therefore bounded by H as well.
//!
//! A rollout that terminates before its `L`-th epoch scores 0. With `L = 0`
//! the full return counts, including the candidate action's immediate cost.
//!
//! # Determinism
//!
//! Rollout `i` runs on a fresh trajectory seeded `(base_seed, ordinal i)`.
//! Rollouts run in parallel but are summed in ordinal order, so the result is
//! bit-identical for any thread count. Two candidates evaluated on the same
//! ordinals see the same event sequences (common random numbers) as long as
//! the model draws events in the same order.

use crate::core::{SimError, SimResult, StateCategory};
use crate::erasure::SimulatableHandle;
use crate::models::OpaqueState;
use crate::policy::Policy;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

mod evaluation;

pub use evaluation::ActionEvaluation;

fn default_horizon() -> usize {
    40
}

/// Rollout parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutConfig {
    /// Epochs simulated after the candidate action (`H`)
    #[serde(default = "default_horizon")]
    pub horizon: usize,

    /// Leading epochs excluded from the score (`L`, at most `H`)
    #[serde(default)]
    pub warmup: usize,

    #[serde(default)]
    pub base_seed: u64,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            horizon: default_horizon(),
            warmup: 0,
            base_seed: 0,
        }
    }
}

impl RolloutConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.warmup > self.horizon {
            return Err(SimError::Configuration(format!(
                "warm-up L ({}) must not exceed horizon H ({})",
                self.warmup, self.horizon
            )));
        }
        Ok(())
    }
}

/// Scores candidate actions by repeated rollouts
pub struct RolloutEvaluator {
    model: SimulatableHandle,
    config: RolloutConfig,
}

impl RolloutEvaluator {
    /// # Errors
    /// `Configuration` if `L > H`.
    pub fn new(model: SimulatableHandle, config: RolloutConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(Self { model, config })
    }

    pub fn model(&self) -> &SimulatableHandle {
        &self.model
    }

    pub fn config(&self) -> &RolloutConfig {
        &self.config
    }

    /// Score of a single rollout on ordinal `ordinal`
    pub fn rollout(
        &self,
        state: &OpaqueState,
        action: i64,
        continuation: &dyn Policy,
        ordinal: u64,
    ) -> SimResult<f64> {
        let model = self.model.as_ref();
        let horizon = self.config.horizon;
        let warmup = self.config.warmup;

        let mut traj = [model.seeded_trajectory(self.config.base_seed, ordinal)];
        model.initiate_state_from(&mut traj, state)?;
        traj[0].next_action = action;
        model.incorporate_action(&mut traj)?;

        let mut warmup_return = if warmup == 0 { Some(0.0) } else { None };
        loop {
            let current = &traj[0];
            if current.category.is_terminal() {
                break;
            }
            if current.epoch_count >= horizon {
                traj[0].category = StateCategory::EndOfHorizon;
                break;
            }
            if current.category.is_await_event() {
                model.incorporate_event(&mut traj)?;
            } else {
                model.incorporate_action_with(&mut traj, continuation)?;
            }
            if warmup_return.is_none() && traj[0].epoch_count == warmup {
                warmup_return = Some(traj[0].cumulative_return);
            }
        }

        Ok(warmup_return.map_or(0.0, |snapshot| traj[0].cumulative_return - snapshot))
    }

    /// Evaluate `action` with `num_rollouts` rollouts on ordinals
    /// `first_ordinal..first_ordinal + num_rollouts`
    pub fn evaluate(
        &self,
        state: &OpaqueState,
        action: i64,
        continuation: &dyn Policy,
        num_rollouts: usize,
        first_ordinal: u64,
    ) -> SimResult<ActionEvaluation> {
        let scores = (0..num_rollouts as u64)
            .into_par_iter()
            .map(|i| self.rollout(state, action, continuation, first_ordinal + i))
            .collect::<SimResult<Vec<f64>>>()?;

        let mut evaluation = ActionEvaluation::new(action);
        for score in scores {
            evaluation.record(score);
        }
        Ok(evaluation)
    }
}
