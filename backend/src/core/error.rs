//! Crate-wide error type
//!
//! Two families share one enum:
//!
//! - **Contract violations** indicate a bug in the calling code (wrong state
//!   category, state used with the wrong adapter). They abort the call and are
//!   never recovered from internally.
//! - Everything else is a condition the caller can check for and handle
//!   (bad configuration, missing optional capability, no actions left, failures
//!   of external collaborators).

use thiserror::Error;

/// Errors produced by the simulation core
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Missing or out-of-range configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller broke an engine precondition
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Model does not provide an optional capability that was requested
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A decision was requested for a state without allowed actions
    #[error("No allowed actions: {0}")]
    NoAllowedActions(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    /// Failure reported by the external policy trainer
    #[error("Trainer error: {0}")]
    Trainer(String),

    /// Failure reported by the external policy store
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// True when the error signals a programming bug rather than a
    /// recoverable condition
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, SimError::ContractViolation(_))
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Serialization(err.to_string())
    }
}

/// Result alias used throughout the crate
pub type SimResult<T> = Result<T, SimError>;
