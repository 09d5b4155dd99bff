//! Model Registry
//!
//! Explicit table from model type id to a factory producing a shared
//! [`Simulatable`](crate::erasure::Simulatable). The entry point builds one
//! registry, registers the model types it knows, and passes it to whatever
//! needs to resolve models from configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut registry = ModelRegistry::new();
//! registry.register::<LostSales>("lost sales inventory with lead time");
//!
//! let model = registry.get_model(&json!({
//!     "id": "lost_sales",
//!     "leadtime": 3,
//!     "p": 9.0,
//!     "h": 1.0
//! }))?;
//! ```

use crate::core::{SimError, SimResult};
use crate::erasure::{ModelAdapter, SimulatableHandle};
use crate::models::Mdp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

type ModelFactory = Box<dyn Fn(&Value) -> SimResult<SimulatableHandle> + Send + Sync>;

struct ModelEntry {
    description: String,
    factory: ModelFactory,
}

/// Entry of a model listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub description: String,
}

/// Registry of model types, keyed by `Mdp::TYPE_ID`
#[derive(Default)]
pub struct ModelRegistry {
    entries: BTreeMap<String, ModelEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register model type `M` under `M::TYPE_ID`
    ///
    /// Registering the same id twice replaces the earlier entry.
    pub fn register<M: Mdp>(&mut self, description: &str) {
        if self.entries.contains_key(M::TYPE_ID) {
            tracing::warn!(
                model = M::TYPE_ID,
                "model already registered; overwriting previous registration"
            );
        }
        self.entries.insert(
            M::TYPE_ID.to_string(),
            ModelEntry {
                description: description.to_string(),
                factory: Box::new(|config| Ok(ModelAdapter::<M>::from_value(config)?.into_shared())),
            },
        );
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Build the model named by `config["id"]` from the rest of `config`
    ///
    /// # Errors
    /// - `Configuration` if `config` has no string `"id"` or the model rejects
    ///   the configuration
    /// - `UnknownModel` if no model is registered under that id
    pub fn get_model(&self, config: &Value) -> SimResult<SimulatableHandle> {
        let id = config
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SimError::Configuration(
                    "model configuration must contain a string \"id\"".to_string(),
                )
            })?;

        let entry = self.entries.get(id).ok_or_else(|| {
            SimError::UnknownModel(format!(
                "no model available with identifier \"{}\"; use list_models() to obtain available models",
                id
            ))
        })?;

        (entry.factory)(config)
    }

    /// All registered models, sorted by id
    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.entries
            .iter()
            .map(|(id, entry)| ModelInfo {
                id: id.clone(),
                description: entry.description.clone(),
            })
            .collect()
    }
}
