//! Uniform random policy
//!
//! Registered under `"random"` by every adapter. Draws from the trajectory's
//! policy stream, so two runs with the same seeds pick the same actions.

use crate::core::{SimError, SimResult};
use crate::models::{Mdp, ModelPolicy};
use crate::rng::RandomStream;
use std::sync::Arc;

/// Uniform choice among the allowed actions
pub struct RandomPolicy<M: Mdp> {
    mdp: Arc<M>,
}

impl<M: Mdp> RandomPolicy<M> {
    pub fn new(mdp: Arc<M>) -> Self {
        Self { mdp }
    }
}

impl<M: Mdp> ModelPolicy<M> for RandomPolicy<M> {
    fn get_action(&self, state: &M::State, rng: &mut RandomStream) -> SimResult<i64> {
        let allowed = self.mdp.allowed_actions(state);
        if allowed.is_empty() {
            return Err(SimError::NoAllowedActions(format!(
                "random policy on model \"{}\"",
                M::TYPE_ID
            )));
        }
        let index = rng.range(0, allowed.len() as i64) as usize;
        Ok(allowed[index])
    }
}
