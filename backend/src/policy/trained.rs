//! Policies backed by a trained evaluator
//!
//! The trainer hands back a [`PolicyEvaluator`]: features in, one score per
//! valid action out. The wrapper encodes the state, scores it and takes the
//! best-scoring *allowed* action, so an evaluator never has to know about
//! action masks.

use crate::core::{SimError, SimResult};
use crate::models::{Mdp, Trajectory};
use crate::policy::{Policy, PolicyEvaluator};
use std::sync::Arc;

/// Highest-scoring action among `allowed`
///
/// Actions without a score (index beyond `scores`) rank last; ties go to the
/// lower action. Returns `None` if `allowed` is empty.
///
/// # Example
/// ```
/// use decision_simulator_core_rs::policy::best_allowed_action;
///
/// let scores = [0.1, 0.7, 0.2];
/// assert_eq!(best_allowed_action(&scores, &[0, 1, 2]), Some(1));
/// assert_eq!(best_allowed_action(&scores, &[0, 2]), Some(2));
/// assert_eq!(best_allowed_action(&scores, &[]), None);
/// ```
pub fn best_allowed_action(scores: &[f64], allowed: &[i64]) -> Option<i64> {
    let score_of = |action: i64| -> f64 {
        usize::try_from(action)
            .ok()
            .and_then(|i| scores.get(i).copied())
            .filter(|s| !s.is_nan())
            .unwrap_or(f64::NEG_INFINITY)
    };

    let mut best: Option<(i64, f64)> = None;
    for &action in allowed {
        let score = score_of(action);
        best = match best {
            None => Some((action, score)),
            Some((b, bs)) if score > bs || (score == bs && action < b) => Some((action, score)),
            keep => keep,
        };
    }
    best.map(|(action, _)| action)
}

/// A trained evaluator bound to a model and an owner tag
pub(crate) struct EvaluatorPolicy<M: Mdp> {
    id: String,
    owner: u64,
    mdp: Arc<M>,
    evaluator: Arc<dyn PolicyEvaluator>,
}

impl<M: Mdp> EvaluatorPolicy<M> {
    pub(crate) fn new(
        id: String,
        owner: u64,
        mdp: Arc<M>,
        evaluator: Arc<dyn PolicyEvaluator>,
    ) -> Self {
        Self {
            id,
            owner,
            mdp,
            evaluator,
        }
    }
}

impl<M: Mdp> Policy for EvaluatorPolicy<M> {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> u64 {
        self.owner
    }

    fn set_action(&self, trajectories: &mut [Trajectory]) -> SimResult<()> {
        let mut features = Vec::new();
        for traj in trajectories.iter_mut() {
            if !traj.category.is_await_action() {
                return Err(SimError::ContractViolation(format!(
                    "policy \"{}\" cannot select an action in category {}",
                    self.id, traj.category
                )));
            }
            let state = traj.state()?.downcast_ref::<M::State>(self.owner)?;

            features.clear();
            self.mdp.features(state, &mut features)?;
            let scores = self.evaluator.evaluate(&features);
            let allowed = self.mdp.allowed_actions(state);

            traj.next_action = best_allowed_action(&scores, &allowed).ok_or_else(|| {
                SimError::NoAllowedActions(format!("trained policy \"{}\"", self.id))
            })?;
        }
        Ok(())
    }
}
