//! Checkpoint - Config Identity and Generation Manifests
//!
//! Provides the configuration fingerprint that identifies an adapted model
//! and the manifest persisted alongside trained policies so an interrupted
//! generation loop can be resumed safely.
//!
//! # Critical Invariants
//!
//! - **Determinism**: the same configuration always hashes to the same digest,
//!   regardless of map iteration order
//! - **Config Matching**: a run may only resume from a manifest written for the
//!   same model configuration and sampling parameters
//! - **Completeness**: `generations_completed` never exceeds the number of
//!   recorded policy paths

use crate::core::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// ============================================================================
// Config Hashing
// ============================================================================

/// Recursively sort all object keys for a canonical representation
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Compute deterministic SHA256 hash of config
///
/// Uses canonical JSON serialization with sorted keys, so two configurations
/// that serialize to the same JSON document hash identically.
///
/// # Example
/// ```
/// use decision_simulator_core_rs::orchestrator::compute_config_hash;
/// use serde_json::json;
///
/// let a = compute_config_hash(&json!({"lead_time": 3, "holding": 1.0})).unwrap();
/// let b = compute_config_hash(&json!({"holding": 1.0, "lead_time": 3})).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub fn compute_config_hash<T: Serialize>(config: &T) -> SimResult<String> {
    let value = serde_json::to_value(config).map_err(|e| {
        SimError::Serialization(format!("config serialization failed: {}", e))
    })?;

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SimError::Serialization(format!("config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Owner tag derived from a config hash: its first 8 bytes as a u64
///
/// # Errors
/// `Serialization` if `config_hash` is not a hex digest of at least 16 digits.
pub fn owner_tag(config_hash: &str) -> SimResult<u64> {
    config_hash
        .get(..16)
        .and_then(|prefix| u64::from_str_radix(prefix, 16).ok())
        .ok_or_else(|| SimError::Serialization(format!("malformed config hash: {}", config_hash)))
}

// ============================================================================
// Generation Manifest
// ============================================================================

/// Progress record of a generation loop
///
/// Saved through the policy store after every generation; checked before a
/// resumed run loads earlier generations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationManifest {
    /// Identifier of the adapted model (`{type}_{hash prefix}`)
    pub model_identifier: String,

    /// Full config hash of the adapted model
    pub model_config_hash: String,

    /// Hash of the parameters that influence sampling and search
    pub improvement_hash: String,

    /// Number of generations whose policy has been saved
    pub generations_completed: usize,

    /// Store path of each saved generation, index 0 = generation 1
    pub policy_paths: Vec<String>,
}

impl GenerationManifest {
    pub fn new(model_identifier: &str, model_config_hash: &str, improvement_hash: &str) -> Self {
        Self {
            model_identifier: model_identifier.to_string(),
            model_config_hash: model_config_hash.to_string(),
            improvement_hash: improvement_hash.to_string(),
            generations_completed: 0,
            policy_paths: Vec::new(),
        }
    }

    /// Record that generation `generation` (1-based) was saved to `path`
    ///
    /// Re-recording an earlier generation replaces its path and drops all
    /// later generations, since they were derived from the replaced policy.
    pub fn record_generation(&mut self, generation: usize, path: &str) {
        let index = generation.saturating_sub(1);
        self.policy_paths.truncate(index);
        self.policy_paths.push(path.to_string());
        self.generations_completed = self.policy_paths.len();
    }

    /// Check that a run with the given hashes may resume after `resume_gen`
    ///
    /// # Errors
    /// `Configuration` if the hashes differ or fewer than `resume_gen`
    /// generations were completed.
    pub fn validate_resume(
        &self,
        model_config_hash: &str,
        improvement_hash: &str,
        resume_gen: usize,
    ) -> SimResult<()> {
        if self.model_config_hash != model_config_hash {
            return Err(SimError::Configuration(format!(
                "manifest was written for model config {} but the current model has {}",
                self.model_config_hash, model_config_hash
            )));
        }
        if self.improvement_hash != improvement_hash {
            return Err(SimError::Configuration(
                "manifest was written with different sampling parameters".to_string(),
            ));
        }
        if resume_gen > self.generations_completed {
            return Err(SimError::Configuration(format!(
                "resume_gen is {} but only {} generations were completed",
                resume_gen, self.generations_completed
            )));
        }
        Ok(())
    }
}
