//! Policy registry
//!
//! Per-model table of policy factories, filled once while the adapter is
//! constructed and read-only afterwards.
//!
//! A factory receives the shared model and the full policy configuration
//! (a JSON object with at least an `"id"` key), so policies needing extra
//! parameters can read them while generic policies need nothing but the id.

use crate::core::{SimError, SimResult};
use crate::models::{Mdp, ModelPolicy};
use crate::policy::PolicyInfo;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

type PolicyFactory<M> =
    Box<dyn Fn(&Arc<M>, &Value) -> SimResult<Box<dyn ModelPolicy<M>>> + Send + Sync>;

struct PolicyEntry<M: Mdp> {
    description: String,
    factory: PolicyFactory<M>,
}

/// Registry of the policies available for model type `M`
///
/// # Example
///
/// ```rust,ignore
/// fn register_policies(&self, registry: &mut PolicyRegistry<Self>) {
///     registry.register("base_stock", "order up to the base-stock level", |mdp, config| {
///         BaseStockPolicy::new(mdp.clone(), config)
///     });
/// }
/// ```
pub struct PolicyRegistry<M: Mdp> {
    entries: BTreeMap<String, PolicyEntry<M>>,
}

impl<M: Mdp> Default for PolicyRegistry<M> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<M: Mdp> PolicyRegistry<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy factory under `id`
    ///
    /// Registering an id twice replaces the earlier entry.
    pub fn register<P, F>(&mut self, id: &str, description: &str, factory: F)
    where
        P: ModelPolicy<M> + 'static,
        F: Fn(&Arc<M>, &Value) -> SimResult<P> + Send + Sync + 'static,
    {
        if self.entries.contains_key(id) {
            tracing::warn!(
                model = M::TYPE_ID,
                policy = id,
                "policy already registered; overwriting previous registration"
            );
        }
        let factory: PolicyFactory<M> = Box::new(move |mdp, config| {
            let policy = factory(mdp, config)?;
            Ok(Box::new(policy) as Box<dyn ModelPolicy<M>>)
        });
        self.entries.insert(
            id.to_string(),
            PolicyEntry {
                description: description.to_string(),
                factory,
            },
        );
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// All registered policies, sorted by id
    pub fn list(&self) -> Vec<PolicyInfo> {
        self.entries
            .iter()
            .map(|(id, entry)| PolicyInfo {
                id: id.clone(),
                description: entry.description.clone(),
            })
            .collect()
    }

    /// Build the policy named by `config["id"]`
    ///
    /// # Errors
    /// - `Configuration` if `config` has no string `"id"`
    /// - `UnknownPolicy` if no policy is registered under that id
    /// - whatever the factory returns
    pub fn build(
        &self,
        mdp: &Arc<M>,
        config: &Value,
    ) -> SimResult<(String, Box<dyn ModelPolicy<M>>)> {
        let id = config
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SimError::Configuration(
                    "policy configuration must contain a string \"id\"".to_string(),
                )
            })?;

        let entry = self.entries.get(id).ok_or_else(|| {
            let available: Vec<&str> = self.entries.keys().map(String::as_str).collect();
            SimError::UnknownPolicy(format!(
                "no policy \"{}\" for model \"{}\"; available: {}",
                id,
                M::TYPE_ID,
                available.join(", ")
            ))
        })?;

        let policy = (entry.factory)(mdp, config)?;
        Ok((id.to_string(), policy))
    }
}
