//! Policy Module
//!
//! This module defines the policy interface used by the step engine, the
//! rollout evaluator and the generation loop.
//!
//! # Overview
//!
//! Policies come in three flavours, all handed out as a type-erased
//! [`PolicyHandle`]:
//! 1. **random**: uniform choice among the allowed actions; registered by
//!    every adapter
//! 2. **model policies**: heuristics a model registers through
//!    `Mdp::register_policies` (see [`registry::PolicyRegistry`])
//! 3. **trained policies**: a [`PolicyEvaluator`] produced by an external
//!    trainer, wrapped by `Simulatable::policy_from_evaluator`
//!
//! # Ownership
//!
//! A policy is bound to the adapter that issued it. Policies are NOT
//! interchangeable across adapters, even generic ones like `"random"` and even
//! when two adapters share a type id: the owner tag of the policy must match
//! the owner tag of every state it acts on.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! let policy = model.get_policy("random")?;
//! model.incorporate_action_with(&mut trajectories, policy.as_ref())?;
//! ```

use crate::core::SimResult;
use crate::models::Trajectory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod random;
pub mod registry;
pub mod trained;

pub(crate) mod adapted;

pub use random::RandomPolicy;
pub use registry::PolicyRegistry;
pub use trained::best_allowed_action;

/// Type-erased policy
///
/// # Example Implementation
///
/// ```
/// use decision_simulator_core_rs::policy::Policy;
/// use decision_simulator_core_rs::{SimResult, Trajectory};
///
/// /// Always picks action 0 (only sensible when 0 is always allowed)
/// struct FirstAction {
///     owner: u64,
/// }
///
/// impl Policy for FirstAction {
///     fn identifier(&self) -> &str {
///         "first_action"
///     }
///
///     fn owner(&self) -> u64 {
///         self.owner
///     }
///
///     fn set_action(&self, trajectories: &mut [Trajectory]) -> SimResult<()> {
///         for traj in trajectories.iter_mut() {
///             traj.next_action = 0;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Policy: Send + Sync {
    /// Policy id, e.g. `"random"` or `"gen3"`
    fn identifier(&self) -> &str;

    /// Owner tag of the adapter that issued this policy
    fn owner(&self) -> u64;

    /// Populate `next_action` of every trajectory from its current state
    ///
    /// # Errors
    /// - `ContractViolation` if a trajectory is not `AwaitAction` or its state
    ///   belongs to another adapter
    /// - `NoAllowedActions` if a state admits no action
    fn set_action(&self, trajectories: &mut [Trajectory]) -> SimResult<()>;
}

/// Shared handle to a policy
pub type PolicyHandle = Arc<dyn Policy>;

/// Callable produced by an external trainer
///
/// Maps a feature vector to one score per valid action (index = action).
/// Higher scores are preferred; a probability vector or a one-hot vector both
/// qualify.
pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(&self, features: &[f64]) -> Vec<f64>;
}

/// Entry of a policy listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInfo {
    pub id: String,
    pub description: String,
}
