//! Step Engine
//!
//! Batched state transitions for [`ModelAdapter`].
//!
//! # Accounting
//!
//! ```text
//! event:  return += cost × discount_so_far
//!         discount_so_far *= model discount
//!         event_count += 1, epoch_count += 1
//! action: return += cost × discount_so_far
//!         epoch_count += 1 if the previous step was an action too
//! ```
//!
//! Every step re-classifies the state. Trajectories are independent, so
//! large batches are processed with rayon; each trajectory draws only from
//! its own streams, so the result does not depend on the thread count.
//!
//! # Validation
//!
//! Each batch is validated completely before the first trajectory is
//! touched: a `ContractViolation` leaves the whole batch unchanged. When a
//! policy fails while choosing actions, the `next_action` fields and random
//! streams it already touched are restored before the error is returned.

use crate::core::{SimError, SimResult, StateCategory};
use crate::erasure::ModelAdapter;
use crate::models::{Mdp, OpaqueState, Trajectory};
use crate::policy::Policy;
use crate::rng::RngStreams;
use rayon::prelude::*;

/// Batches of at least this many trajectories are processed in parallel
pub(crate) const PARALLEL_BATCH_THRESHOLD: usize = 64;

impl<M: Mdp> ModelAdapter<M> {
    // ========================================================================
    // Validation
    // ========================================================================

    fn check_state(&self, traj: &Trajectory) -> SimResult<()> {
        traj.state()?.check_owner(self.owner)
    }

    fn check_event_stream(&self, traj: &Trajectory) -> SimResult<()> {
        if let StateCategory::AwaitEvent(stream) = traj.category {
            self.check_state(traj)?;
            if stream >= traj.rng.num_event_streams() {
                return Err(SimError::ContractViolation(format!(
                    "event stream {} requested but the trajectory has {} (model \"{}\")",
                    stream,
                    traj.rng.num_event_streams(),
                    M::TYPE_ID
                )));
            }
        }
        Ok(())
    }

    fn check_awaits_action(&self, traj: &Trajectory) -> SimResult<()> {
        if !traj.category.is_await_action() {
            return Err(SimError::ContractViolation(format!(
                "incorporate_action requires AwaitAction, found {}",
                traj.category
            )));
        }
        self.check_state(traj)
    }

    // ========================================================================
    // Single trajectory steps
    // ========================================================================

    fn initiate_one(&self, traj: &mut Trajectory) {
        let state = self.mdp.random_initial_state(traj.rng.initiation());
        let category = self.mdp.classify(&state);
        traj.reset(OpaqueState::new(self.owner, state), category);
    }

    /// Incorporate one event if the trajectory awaits one; returns whether it
    /// still awaits an event afterwards
    fn event_one(&self, traj: &mut Trajectory) -> SimResult<bool> {
        let StateCategory::AwaitEvent(stream) = traj.category else {
            return Ok(false);
        };

        let (cost, category) = {
            let (state, rng) = traj.state_and_rng()?;
            let state = state.downcast_mut::<M::State>(self.owner)?;
            let rng = rng.event(stream).ok_or_else(|| {
                SimError::ContractViolation(format!("event stream {} out of range", stream))
            })?;
            let event = self.mdp.sample_event_on(stream, rng);
            let cost = self.mdp.apply_event(state, &event);
            (cost, self.mdp.classify(state))
        };

        traj.cumulative_return += cost * traj.effective_discount_factor;
        traj.effective_discount_factor *= self.info.discount_factor;
        traj.close_event_epoch();
        traj.category = category;
        Ok(category.is_await_event())
    }

    fn action_one(&self, traj: &mut Trajectory) -> SimResult<()> {
        let action = traj.next_action;
        let (cost, category) = {
            let state = traj.state_mut()?.downcast_mut::<M::State>(self.owner)?;
            let cost = self.mdp.apply_action(state, action);
            (cost, self.mdp.classify(state))
        };

        traj.cumulative_return += cost * traj.effective_discount_factor;
        traj.record_action();
        traj.category = category;
        Ok(())
    }

    /// Advance until a decision with more than one allowed action; returns
    /// whether the trajectory stopped at such a decision
    fn advance_one(&self, traj: &mut Trajectory, max_epoch_count: usize) -> SimResult<bool> {
        loop {
            match traj.category {
                StateCategory::Final | StateCategory::EndOfHorizon => return Ok(false),
                StateCategory::AwaitEvent(_) => {
                    if traj.epoch_count >= max_epoch_count {
                        traj.category = StateCategory::EndOfHorizon;
                        return Ok(false);
                    }
                    self.event_one(traj)?;
                }
                StateCategory::AwaitAction(_) => {
                    let allowed = self
                        .mdp
                        .allowed_actions(traj.state()?.downcast_ref::<M::State>(self.owner)?);
                    match allowed.as_slice() {
                        [] => {
                            return Err(SimError::NoAllowedActions(format!(
                                "model \"{}\" has a non-final state without allowed actions",
                                M::TYPE_ID
                            )))
                        }
                        [only] => {
                            if traj.epoch_count >= max_epoch_count {
                                traj.category = StateCategory::EndOfHorizon;
                                return Ok(false);
                            }
                            traj.next_action = *only;
                            self.action_one(traj)?;
                        }
                        _ => return Ok(true),
                    }
                }
            }
        }
    }

    // ========================================================================
    // Batches
    // ========================================================================

    pub(crate) fn initiate_batch(&self, trajectories: &mut [Trajectory]) -> SimResult<()> {
        if trajectories.len() >= PARALLEL_BATCH_THRESHOLD {
            trajectories
                .par_iter_mut()
                .for_each(|traj| self.initiate_one(traj));
        } else {
            trajectories.iter_mut().for_each(|traj| self.initiate_one(traj));
        }
        Ok(())
    }

    pub(crate) fn initiate_batch_from(
        &self,
        trajectories: &mut [Trajectory],
        state: &OpaqueState,
    ) -> SimResult<()> {
        let category = self.mdp.classify(state.downcast_ref::<M::State>(self.owner)?);
        for traj in trajectories.iter_mut() {
            traj.reset(state.clone(), category);
        }
        Ok(())
    }

    pub(crate) fn event_batch(&self, trajectories: &mut [Trajectory]) -> SimResult<bool> {
        trajectories
            .iter()
            .try_for_each(|traj| self.check_event_stream(traj))?;

        if trajectories.len() >= PARALLEL_BATCH_THRESHOLD {
            trajectories
                .par_iter_mut()
                .map(|traj| self.event_one(traj))
                .try_reduce(|| false, |a, b| Ok(a || b))
        } else {
            let mut any_awaiting = false;
            for traj in trajectories.iter_mut() {
                any_awaiting |= self.event_one(traj)?;
            }
            Ok(any_awaiting)
        }
    }

    pub(crate) fn action_batch(&self, trajectories: &mut [Trajectory]) -> SimResult<()> {
        trajectories
            .iter()
            .try_for_each(|traj| self.check_awaits_action(traj))?;

        if trajectories.len() >= PARALLEL_BATCH_THRESHOLD {
            trajectories
                .par_iter_mut()
                .try_for_each(|traj| self.action_one(traj))
        } else {
            trajectories
                .iter_mut()
                .try_for_each(|traj| self.action_one(traj))
        }
    }

    pub(crate) fn policy_action_batch(
        &self,
        trajectories: &mut [Trajectory],
        policy: &dyn Policy,
    ) -> SimResult<()> {
        if policy.owner() != self.owner {
            return Err(SimError::ContractViolation(format!(
                "policy \"{}\" was issued by another model than \"{}\"",
                policy.identifier(),
                M::TYPE_ID
            )));
        }
        trajectories
            .iter()
            .try_for_each(|traj| self.check_awaits_action(traj))?;

        let previous: Vec<(i64, RngStreams)> = trajectories
            .iter()
            .map(|t| (t.next_action, t.rng.clone()))
            .collect();
        let selected = if trajectories.len() >= PARALLEL_BATCH_THRESHOLD {
            trajectories
                .par_chunks_mut(PARALLEL_BATCH_THRESHOLD)
                .try_for_each(|chunk| policy.set_action(chunk))
        } else {
            policy.set_action(trajectories)
        };
        if let Err(e) = selected {
            for (traj, (action, rng)) in trajectories.iter_mut().zip(previous) {
                traj.next_action = action;
                traj.rng = rng;
            }
            return Err(e);
        }
        self.action_batch(trajectories)
    }

    pub(crate) fn advance_batch(
        &self,
        trajectories: &mut [Trajectory],
        max_epoch_count: usize,
    ) -> SimResult<bool> {
        trajectories.iter().try_for_each(|traj| {
            if traj.category.is_terminal() {
                Ok(())
            } else {
                self.check_event_stream(traj)?;
                self.check_state(traj)
            }
        })?;

        if trajectories.len() >= PARALLEL_BATCH_THRESHOLD {
            trajectories
                .par_iter_mut()
                .map(|traj| self.advance_one(traj, max_epoch_count))
                .try_reduce(|| true, |a, b| Ok(a && b))
        } else {
            let mut all_nontrivial = true;
            for traj in trajectories.iter_mut() {
                all_nontrivial &= self.advance_one(traj, max_epoch_count)?;
            }
            Ok(all_nontrivial)
        }
    }
}
