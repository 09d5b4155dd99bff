//! Model Adapter
//!
//! Wraps a concrete `M: Mdp` behind the [`Simulatable`] interface.
//!
//! # Construction
//!
//! `ModelAdapter::<M>::new(config)`:
//! 1. builds `M` from its configuration and shares it through an `Arc`
//!    (issued policies hold a reference too)
//! 2. validates the static info (discount factor, action count, event
//!    streams)
//! 3. hashes the configuration to derive the identifier and the owner tag
//! 4. registers `"random"` and then the model's own policies
//!
//! Construction is the only place an adapter is mutated.

use crate::core::{SimError, SimResult, StateCategory, StaticInfo};
use crate::erasure::{Simulatable, SimulatableHandle};
use crate::models::{Mdp, OpaqueState, Trajectory};
use crate::orchestrator::checkpoint::{compute_config_hash, owner_tag};
use crate::policy::adapted::AdaptedPolicy;
use crate::policy::trained::EvaluatorPolicy;
use crate::policy::{
    Policy, PolicyEvaluator, PolicyHandle, PolicyInfo, PolicyRegistry, RandomPolicy,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// A model type erased behind `dyn Simulatable`
pub struct ModelAdapter<M: Mdp> {
    pub(crate) mdp: Arc<M>,
    pub(crate) info: StaticInfo,
    identifier: String,
    config_hash: String,
    pub(crate) owner: u64,
    policies: PolicyRegistry<M>,
}

/// What gets hashed: the model type together with its configuration, so
/// equal configurations of different model types never share an owner tag
#[derive(Serialize)]
struct HashedConfig<'a, C: Serialize> {
    #[serde(rename = "type")]
    type_id: &'static str,
    config: &'a C,
}

impl<M: Mdp> ModelAdapter<M> {
    /// Build and validate the adapter for `config`
    ///
    /// # Errors
    /// - `Configuration` if the model rejects the configuration or publishes
    ///   invalid static info
    /// - `Serialization` if the configuration cannot be serialized for hashing
    pub fn new(config: &M::Config) -> SimResult<Self> {
        let mdp = Arc::new(M::from_config(config)?);
        let info = mdp.static_info();
        info.validate(M::TYPE_ID)?;

        let config_hash = compute_config_hash(&HashedConfig {
            type_id: M::TYPE_ID,
            config,
        })?;
        let owner = owner_tag(&config_hash)?;
        let identifier = format!("{}_{}", M::TYPE_ID, &config_hash[..16]);

        let mut policies = PolicyRegistry::new();
        policies.register(
            "random",
            "uniform choice among the allowed actions",
            |mdp: &Arc<M>, _config: &Value| Ok(RandomPolicy::new(mdp.clone())),
        );
        mdp.register_policies(&mut policies);

        tracing::debug!(
            model = %identifier,
            actions = info.valid_action_count,
            discount = info.discount_factor,
            policies = policies.list().len(),
            "model adapted"
        );

        Ok(Self {
            mdp,
            info,
            identifier,
            config_hash,
            owner,
            policies,
        })
    }

    /// Build the adapter from an already-parsed JSON configuration
    ///
    /// Unknown keys (such as a registry `"id"`) are ignored.
    pub fn from_value(value: &Value) -> SimResult<Self> {
        let config: M::Config = serde_json::from_value(value.clone()).map_err(|e| {
            SimError::Configuration(format!(
                "invalid configuration for model \"{}\": {}",
                M::TYPE_ID,
                e
            ))
        })?;
        Self::new(&config)
    }

    /// Share the adapter as a type-erased handle
    pub fn into_shared(self) -> SimulatableHandle {
        Arc::new(self)
    }

    /// The wrapped model
    pub fn model(&self) -> &Arc<M> {
        &self.mdp
    }

    /// Tag a concrete state with this adapter's owner
    pub fn wrap_state(&self, state: M::State) -> OpaqueState {
        OpaqueState::new(self.owner, state)
    }

    /// Typed view of a state issued by this adapter
    pub fn typed_state<'a>(&self, state: &'a OpaqueState) -> SimResult<&'a M::State> {
        state.downcast_ref::<M::State>(self.owner)
    }
}

impl<M: Mdp> Simulatable for ModelAdapter<M> {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn type_identifier(&self) -> &'static str {
        M::TYPE_ID
    }

    fn config_hash(&self) -> &str {
        &self.config_hash
    }

    fn owner(&self) -> u64 {
        self.owner
    }

    fn static_info(&self) -> &StaticInfo {
        &self.info
    }

    fn initial_state(&self) -> OpaqueState {
        self.wrap_state(self.mdp.initial_state())
    }

    fn classify(&self, state: &OpaqueState) -> SimResult<StateCategory> {
        Ok(self.mdp.classify(self.typed_state(state)?))
    }

    fn allowed_actions(&self, state: &OpaqueState) -> SimResult<Vec<i64>> {
        Ok(self.mdp.allowed_actions(self.typed_state(state)?))
    }

    fn features(&self, state: &OpaqueState, out: &mut Vec<f64>) -> SimResult<()> {
        self.mdp.features(self.typed_state(state)?, out)
    }

    fn state_to_json(&self, state: &OpaqueState) -> SimResult<Value> {
        self.mdp.state_to_json(self.typed_state(state)?)
    }

    fn state_from_json(&self, value: &Value) -> SimResult<OpaqueState> {
        Ok(self.wrap_state(self.mdp.state_from_json(value)?))
    }

    fn list_policies(&self) -> Vec<PolicyInfo> {
        self.policies.list()
    }

    fn get_policy_with(&self, config: &Value) -> SimResult<PolicyHandle> {
        let (id, inner) = self.policies.build(&self.mdp, config)?;
        Ok(Arc::new(AdaptedPolicy::new(id, self.owner, inner)))
    }

    fn policy_from_evaluator(
        &self,
        id: &str,
        evaluator: Arc<dyn PolicyEvaluator>,
    ) -> SimResult<PolicyHandle> {
        if self.info.num_features.is_none() {
            // Fail here rather than on the first action selection
            let mut probe = Vec::new();
            self.mdp.features(&self.mdp.initial_state(), &mut probe)?;
        }
        Ok(Arc::new(EvaluatorPolicy::new(
            id.to_string(),
            self.owner,
            self.mdp.clone(),
            evaluator,
        )))
    }

    fn initiate_state(&self, trajectories: &mut [Trajectory]) -> SimResult<()> {
        self.initiate_batch(trajectories)
    }

    fn initiate_state_from(
        &self,
        trajectories: &mut [Trajectory],
        state: &OpaqueState,
    ) -> SimResult<()> {
        self.initiate_batch_from(trajectories, state)
    }

    fn incorporate_event(&self, trajectories: &mut [Trajectory]) -> SimResult<bool> {
        self.event_batch(trajectories)
    }

    fn incorporate_action(&self, trajectories: &mut [Trajectory]) -> SimResult<()> {
        self.action_batch(trajectories)
    }

    fn incorporate_action_with(
        &self,
        trajectories: &mut [Trajectory],
        policy: &dyn Policy,
    ) -> SimResult<()> {
        self.policy_action_batch(trajectories, policy)
    }

    fn incorporate_until_nontrivial_action(
        &self,
        trajectories: &mut [Trajectory],
        max_epoch_count: usize,
    ) -> SimResult<bool> {
        self.advance_batch(trajectories, max_epoch_count)
    }
}
