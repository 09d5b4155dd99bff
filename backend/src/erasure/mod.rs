//! Type Erasure
//!
//! Turns any type implementing [`Mdp`](crate::models::Mdp) into a
//! runtime-polymorphic [`Simulatable`], so the rollout evaluator, the search,
//! the generation loop and the comparer work with one interface regardless of
//! the concrete model.
//!
//! # Architecture
//!
//! ```text
//! M: Mdp  ──ModelAdapter::<M>::new(config)──▶  Arc<dyn Simulatable>
//!                                                 │
//!      Trajectory { OpaqueState(owner), ... } ◀───┤ step engine
//!      PolicyHandle (owner)                   ◀───┘ policy registry
//! ```
//!
//! States and policies carry the owner tag of the adapter that issued them.
//! Handing them to another adapter is a `ContractViolation`.
//!
//! # Example
//!
//! ```rust,ignore
//! let model: Arc<dyn Simulatable> = ModelAdapter::<Inventory>::new(&config)?.into_shared();
//! let mut trajs: Vec<Trajectory> = (0..100).map(|i| model.seeded_trajectory(42, i)).collect();
//! model.initiate_state(&mut trajs)?;
//! let policy = model.get_policy("random")?;
//! while model.incorporate_event(&mut trajs)? { /* ... */ }
//! ```

use crate::core::{SimResult, StateCategory, StaticInfo};
use crate::models::{Mdp, OpaqueState, Trajectory};
use crate::policy::{Policy, PolicyEvaluator, PolicyHandle, PolicyInfo};
use serde_json::Value;
use std::sync::Arc;

pub mod adapter;
pub(crate) mod step;

pub use adapter::ModelAdapter;

/// Shared handle to an adapted model
pub type SimulatableHandle = Arc<dyn Simulatable>;

/// Runtime-polymorphic simulation interface of one adapted model
///
/// All step-engine operations mutate the given trajectories in place. A batch
/// that fails validation is left untouched.
pub trait Simulatable: Send + Sync {
    // ========================================================================
    // Identity & static information
    // ========================================================================

    /// `"{type id}_{first 16 hex digits of the config hash}"`
    fn identifier(&self) -> &str;

    /// The model's `TYPE_ID`
    fn type_identifier(&self) -> &'static str;

    /// SHA-256 hex digest of the canonical model configuration
    fn config_hash(&self) -> &str;

    /// Owner tag stamped on every state and policy this adapter issues
    fn owner(&self) -> u64;

    fn static_info(&self) -> &StaticInfo;

    fn discount_factor(&self) -> f64 {
        self.static_info().discount_factor
    }

    fn valid_action_count(&self) -> usize {
        self.static_info().valid_action_count
    }

    fn num_event_streams(&self) -> usize {
        self.static_info().num_event_streams
    }

    fn num_features(&self) -> Option<usize> {
        self.static_info().num_features
    }

    // ========================================================================
    // States
    // ========================================================================

    /// Empty trajectory sized for this model, seeded `(0, 0)`
    fn new_trajectory(&self) -> Trajectory {
        Trajectory::new(self.num_event_streams())
    }

    /// Empty trajectory sized for this model, seeded `(base_seed, ordinal)`
    fn seeded_trajectory(&self, base_seed: u64, ordinal: u64) -> Trajectory {
        Trajectory::seeded(self.num_event_streams(), base_seed, ordinal)
    }

    /// The model's deterministic initial state
    fn initial_state(&self) -> OpaqueState;

    fn classify(&self, state: &OpaqueState) -> SimResult<StateCategory>;

    fn allowed_actions(&self, state: &OpaqueState) -> SimResult<Vec<i64>>;

    /// Append the feature encoding of `state` to `out`
    ///
    /// # Errors
    /// `UnsupportedOperation` if the model does not encode features.
    fn features(&self, state: &OpaqueState, out: &mut Vec<f64>) -> SimResult<()>;

    fn state_to_json(&self, state: &OpaqueState) -> SimResult<Value>;

    fn state_from_json(&self, value: &Value) -> SimResult<OpaqueState>;

    // ========================================================================
    // Policies
    // ========================================================================

    fn list_policies(&self) -> Vec<PolicyInfo>;

    /// Policy registered under `id`, built with no extra parameters
    fn get_policy(&self, id: &str) -> SimResult<PolicyHandle> {
        self.get_policy_with(&serde_json::json!({ "id": id }))
    }

    /// Policy described by `config` (a JSON object with at least `"id"`)
    fn get_policy_with(&self, config: &Value) -> SimResult<PolicyHandle>;

    /// Wrap a trained evaluator into a policy bound to this adapter
    fn policy_from_evaluator(
        &self,
        id: &str,
        evaluator: Arc<dyn PolicyEvaluator>,
    ) -> SimResult<PolicyHandle>;

    // ========================================================================
    // Step engine
    // ========================================================================

    /// Draw a (possibly random) initial state for every trajectory from its
    /// initiation stream and reset all accumulators
    fn initiate_state(&self, trajectories: &mut [Trajectory]) -> SimResult<()>;

    /// Start every trajectory from a copy of `state`
    fn initiate_state_from(
        &self,
        trajectories: &mut [Trajectory],
        state: &OpaqueState,
    ) -> SimResult<()>;

    /// Advance every `AwaitEvent` trajectory by one event
    ///
    /// Returns whether any trajectory is still `AwaitEvent` afterwards.
    fn incorporate_event(&self, trajectories: &mut [Trajectory]) -> SimResult<bool>;

    /// Apply `next_action` to every trajectory
    ///
    /// # Errors
    /// `ContractViolation` if any trajectory is not `AwaitAction`; nothing is
    /// mutated in that case.
    fn incorporate_action(&self, trajectories: &mut [Trajectory]) -> SimResult<()>;

    /// Let `policy` choose `next_action` for every trajectory, then apply it
    fn incorporate_action_with(
        &self,
        trajectories: &mut [Trajectory],
        policy: &dyn Policy,
    ) -> SimResult<()>;

    /// Advance every trajectory to its next decision with more than one
    /// allowed action
    ///
    /// Forced single-action decisions are applied automatically. A trajectory
    /// whose `epoch_count` reaches `max_epoch_count` before an event or a
    /// forced action is truncated to `EndOfHorizon`. Returns true iff every
    /// trajectory stopped at a non-trivial decision.
    fn incorporate_until_nontrivial_action(
        &self,
        trajectories: &mut [Trajectory],
        max_epoch_count: usize,
    ) -> SimResult<bool>;
}

/// Typed view of a state issued by `model`
///
/// # Errors
/// `ContractViolation` if the state belongs to another adapter or `M` is not
/// the adapted model type.
pub fn typed_state<'a, M: Mdp>(
    model: &dyn Simulatable,
    state: &'a OpaqueState,
) -> SimResult<&'a M::State> {
    state.downcast_ref::<M::State>(model.owner())
}
