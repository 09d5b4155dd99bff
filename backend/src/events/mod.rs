//! Event logging for generation runs and policy comparisons.
//!
//! This module defines the Event enum which captures every significant step of
//! the generation loop and the comparer. Events enable:
//! - Auditing (which policy produced which samples, where it was saved)
//! - Resumption checks (which generations were loaded instead of trained)
//! - Analysis (rollouts spent and search depth per generation)
//!
//! The log is returned to callers and never printed; human-readable progress
//! goes through `tracing`.
//!
//! # Example
//!
//! ```rust
//! use decision_simulator_core_rs::events::{Event, EventLog};
//!
//! let mut log = EventLog::new();
//! log.log(Event::PolicySaved {
//!     generation: 1,
//!     policy_id: "gen1".to_string(),
//!     path: "out/lost_sales_3fa4c2d19be07a51_gen1".to_string(),
//! });
//!
//! assert_eq!(log.events_for_generation(1).len(), 1);
//! assert_eq!(log.events()[0].event_type(), "PolicySaved");
//! ```

use serde::{Deserialize, Serialize};

/// Event emitted by the generation loop or the comparer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A generation started sampling under `sampling_policy`
    GenerationStarted {
        generation: usize,
        sampling_policy: String,
    },

    /// All training samples of a generation were produced
    SamplesGenerated {
        generation: usize,
        num_samples: usize,
        rollouts_used: usize,
        mean_rounds: f64,
    },

    /// The trainer returned a new policy
    PolicyTrained {
        generation: usize,
        policy_id: String,
    },

    PolicySaved {
        generation: usize,
        policy_id: String,
        path: String,
    },

    /// A generation was restored from the store instead of trained
    PolicyLoaded {
        generation: usize,
        policy_id: String,
        path: String,
    },

    ManifestSaved {
        generations_completed: usize,
    },

    /// Policies were simulated on common random numbers
    ComparisonFinished {
        policies: Vec<String>,
        num_trajectories: usize,
        best_policy: String,
    },
}

impl Event {
    /// Generation this event belongs to, if any
    pub fn generation(&self) -> Option<usize> {
        match self {
            Event::GenerationStarted { generation, .. }
            | Event::SamplesGenerated { generation, .. }
            | Event::PolicyTrained { generation, .. }
            | Event::PolicySaved { generation, .. }
            | Event::PolicyLoaded { generation, .. } => Some(*generation),
            Event::ManifestSaved { .. } | Event::ComparisonFinished { .. } => None,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::GenerationStarted { .. } => "GenerationStarted",
            Event::SamplesGenerated { .. } => "SamplesGenerated",
            Event::PolicyTrained { .. } => "PolicyTrained",
            Event::PolicySaved { .. } => "PolicySaved",
            Event::PolicyLoaded { .. } => "PolicyLoaded",
            Event::ManifestSaved { .. } => "ManifestSaved",
            Event::ComparisonFinished { .. } => "ComparisonFinished",
        }
    }

    /// Policy the event is about, if a single one
    pub fn policy_id(&self) -> Option<&str> {
        match self {
            Event::GenerationStarted {
                sampling_policy, ..
            } => Some(sampling_policy),
            Event::PolicyTrained { policy_id, .. }
            | Event::PolicySaved { policy_id, .. }
            | Event::PolicyLoaded { policy_id, .. } => Some(policy_id),
            _ => None,
        }
    }
}

/// Append-only event log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_for_generation(&self, generation: usize) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.generation() == Some(generation))
            .collect()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Append all events of `other`
    pub fn extend(&mut self, other: EventLog) {
        self.events.extend(other.events);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_generation() {
        let event = Event::SamplesGenerated {
            generation: 3,
            num_samples: 100,
            rollouts_used: 5000,
            mean_rounds: 2.0,
        };
        assert_eq!(event.generation(), Some(3));

        let event = Event::ManifestSaved {
            generations_completed: 3,
        };
        assert_eq!(event.generation(), None);
    }

    #[test]
    fn test_event_policy_id() {
        let event = Event::GenerationStarted {
            generation: 1,
            sampling_policy: "random".to_string(),
        };
        assert_eq!(event.policy_id(), Some("random"));
    }

    #[test]
    fn test_event_log_queries() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        log.log(Event::GenerationStarted {
            generation: 1,
            sampling_policy: "random".to_string(),
        });
        log.log(Event::PolicyTrained {
            generation: 1,
            policy_id: "gen1".to_string(),
        });
        log.log(Event::GenerationStarted {
            generation: 2,
            sampling_policy: "gen1".to_string(),
        });

        assert_eq!(log.len(), 3);
        assert_eq!(log.events_for_generation(1).len(), 2);
        assert_eq!(log.events_of_type("GenerationStarted").len(), 2);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = Event::ManifestSaved {
            generations_completed: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ManifestSaved");
        assert_eq!(json["generations_completed"], 2);
    }
}
