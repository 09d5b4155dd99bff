//! Erasure of model policies into `dyn Policy`

use crate::core::{SimError, SimResult};
use crate::models::{Mdp, ModelPolicy, Trajectory};
use crate::policy::Policy;

/// A `ModelPolicy<M>` bound to one adapter's owner tag
pub(crate) struct AdaptedPolicy<M: Mdp> {
    id: String,
    owner: u64,
    inner: Box<dyn ModelPolicy<M>>,
}

impl<M: Mdp> AdaptedPolicy<M> {
    pub(crate) fn new(id: String, owner: u64, inner: Box<dyn ModelPolicy<M>>) -> Self {
        Self { id, owner, inner }
    }
}

impl<M: Mdp> Policy for AdaptedPolicy<M> {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> u64 {
        self.owner
    }

    fn set_action(&self, trajectories: &mut [Trajectory]) -> SimResult<()> {
        for traj in trajectories.iter_mut() {
            if !traj.category.is_await_action() {
                return Err(SimError::ContractViolation(format!(
                    "policy \"{}\" cannot select an action in category {}",
                    self.id, traj.category
                )));
            }
            let action = {
                let (state, rng) = traj.state_and_rng()?;
                let state = state.downcast_ref::<M::State>(self.owner)?;
                self.inner.get_action(state, rng.policy())?
            };
            traj.next_action = action;
        }
        Ok(())
    }
}
