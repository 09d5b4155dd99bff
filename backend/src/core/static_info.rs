//! Static model information
//!
//! Every model publishes a `StaticInfo` once. The adapter validates it at
//! construction and uses it to size trajectories (number of event streams)
//! and training targets (number of valid actions).

use crate::core::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether a model terminates on its own or runs indefinitely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizonType {
    /// Trajectories reach `Final` through the dynamics
    Finite,

    /// Trajectories only stop when truncated (`EndOfHorizon`)
    #[default]
    Infinite,
}

fn default_discount_factor() -> f64 {
    1.0
}

fn default_event_streams() -> usize {
    1
}

/// Static description of a model
///
/// # Example
/// ```
/// use decision_simulator_core_rs::{HorizonType, StaticInfo};
///
/// let info = StaticInfo::new(3)
///     .with_discount_factor(0.95)
///     .with_horizon(HorizonType::Finite)
///     .with_num_features(4);
///
/// assert_eq!(info.valid_action_count, 3);
/// assert!(info.validate("toy").is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticInfo {
    /// Actions are integers in `0..valid_action_count`
    pub valid_action_count: usize,

    /// Per-event discount factor, must lie in (0, 1]
    #[serde(default = "default_discount_factor")]
    pub discount_factor: f64,

    #[serde(default)]
    pub horizon_type: HorizonType,

    /// Number of independent event streams (`AwaitEvent(i)` uses stream `i`)
    #[serde(default = "default_event_streams")]
    pub num_event_streams: usize,

    /// Length of the feature vector, when the model encodes features
    #[serde(default)]
    pub num_features: Option<usize>,

    /// Free-form values a model wants to expose (not used by the core)
    #[serde(default)]
    pub diagnostics: Map<String, Value>,
}

impl StaticInfo {
    pub fn new(valid_action_count: usize) -> Self {
        Self {
            valid_action_count,
            discount_factor: default_discount_factor(),
            horizon_type: HorizonType::default(),
            num_event_streams: default_event_streams(),
            num_features: None,
            diagnostics: Map::new(),
        }
    }

    pub fn with_discount_factor(mut self, discount_factor: f64) -> Self {
        self.discount_factor = discount_factor;
        self
    }

    pub fn with_horizon(mut self, horizon_type: HorizonType) -> Self {
        self.horizon_type = horizon_type;
        self
    }

    pub fn with_event_streams(mut self, num_event_streams: usize) -> Self {
        self.num_event_streams = num_event_streams;
        self
    }

    pub fn with_num_features(mut self, num_features: usize) -> Self {
        self.num_features = Some(num_features);
        self
    }

    pub fn with_diagnostic(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.diagnostics.insert(key.to_string(), value.into());
        self
    }

    /// Check the invariants the engine relies on
    ///
    /// # Errors
    /// `SimError::Configuration` when the discount factor is outside (0, 1],
    /// there are no valid actions, or no event streams.
    pub fn validate(&self, type_id: &str) -> SimResult<()> {
        // Written so that NaN is rejected as well
        if !(self.discount_factor > 0.0 && self.discount_factor <= 1.0) {
            return Err(SimError::Configuration(format!(
                "model \"{}\": discount_factor is invalid: {}. Must be in (0.0, 1.0]",
                type_id, self.discount_factor
            )));
        }

        if self.valid_action_count == 0 {
            return Err(SimError::Configuration(format!(
                "model \"{}\": valid_action_count must be > 0",
                type_id
            )));
        }

        if self.num_event_streams == 0 {
            return Err(SimError::Configuration(format!(
                "model \"{}\": num_event_streams must be >= 1",
                type_id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let info = StaticInfo::new(2);
        assert_eq!(info.discount_factor, 1.0);
        assert_eq!(info.num_event_streams, 1);
        assert_eq!(info.horizon_type, HorizonType::Infinite);
        assert!(info.validate("t").is_ok());
    }

    #[test]
    fn test_discount_factor_bounds() {
        assert!(StaticInfo::new(2).with_discount_factor(1.0).validate("t").is_ok());
        assert!(StaticInfo::new(2).with_discount_factor(1e-9).validate("t").is_ok());

        for bad in [0.0, -0.5, 1.0001, f64::NAN, f64::INFINITY] {
            let err = StaticInfo::new(2)
                .with_discount_factor(bad)
                .validate("t")
                .unwrap_err();
            assert!(matches!(err, SimError::Configuration(_)), "{} accepted", bad);
        }
    }

    #[test]
    fn test_zero_actions_rejected() {
        assert!(StaticInfo::new(0).validate("t").is_err());
    }

    #[test]
    fn test_zero_event_streams_rejected() {
        assert!(StaticInfo::new(2).with_event_streams(0).validate("t").is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let info: StaticInfo =
            serde_json::from_str(r#"{"valid_action_count": 4, "horizon_type": "finite"}"#).unwrap();
        assert_eq!(info.valid_action_count, 4);
        assert_eq!(info.horizon_type, HorizonType::Finite);
        assert_eq!(info.discount_factor, 1.0);
    }
}
