//! Model Contract
//!
//! This module defines the capability set a model type must expose to be
//! simulated by the core.
//!
//! # Overview
//!
//! A model is any type that implements [`Mdp`]. Models do not share a base
//! type; the adapter in `erasure` is generic over `M: Mdp` and erases the
//! concrete type behind `dyn Simulatable`. Checking happens at compile time:
//! a type that misses one of the required methods does not implement `Mdp`,
//! so `ModelAdapter<M>` cannot be instantiated for it.
//!
//! Required capabilities:
//! 1. **from_config**: build the model from its own configuration type
//! 2. **static_info**: valid action count, discount factor, horizon type
//! 3. **initial_state**: deterministic initial state
//! 4. **sample_event**: draw an event from a random stream
//! 5. **apply_event / apply_action**: mutate a state, return the immediate cost
//! 6. **classify**: the `StateCategory` of a state
//! 7. **allowed_actions**: actions allowed in a state
//!
//! Optional capabilities have default implementations. Defaults either fall
//! back to a required capability (`random_initial_state`) or report
//! `SimError::UnsupportedOperation` when invoked (`features`, ...), which does
//! not affect the rest of the interface.
//!
//! # Cost Convention
//!
//! Every returned value is a **cost**; the core minimises. Rewards are returned
//! negated.
//!
//! # Example
//!
//! ```rust
//! use decision_simulator_core_rs::models::Mdp;
//! use decision_simulator_core_rs::{RandomStream, SimResult, StateCategory, StaticInfo};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct CoinConfig {
//!     rounds: i64,
//! }
//!
//! #[derive(Debug, Clone)]
//! struct CoinState {
//!     rounds_left: i64,
//!     cat: StateCategory,
//! }
//!
//! struct CoinGame {
//!     rounds: i64,
//! }
//!
//! impl Mdp for CoinGame {
//!     const TYPE_ID: &'static str = "coin_game";
//!     type Config = CoinConfig;
//!     type State = CoinState;
//!     type Event = bool;
//!
//!     fn from_config(config: &CoinConfig) -> SimResult<Self> {
//!         Ok(CoinGame { rounds: config.rounds })
//!     }
//!
//!     fn static_info(&self) -> StaticInfo {
//!         StaticInfo::new(2)
//!     }
//!
//!     fn initial_state(&self) -> CoinState {
//!         CoinState { rounds_left: self.rounds, cat: StateCategory::await_action() }
//!     }
//!
//!     fn sample_event(&self, rng: &mut RandomStream) -> bool {
//!         rng.next_f64() < 0.5
//!     }
//!
//!     fn apply_event(&self, state: &mut CoinState, heads: &bool) -> f64 {
//!         state.rounds_left -= 1;
//!         state.cat = if state.rounds_left == 0 {
//!             StateCategory::Final
//!         } else {
//!             StateCategory::await_action()
//!         };
//!         if *heads { 0.0 } else { 1.0 }
//!     }
//!
//!     fn apply_action(&self, state: &mut CoinState, _action: i64) -> f64 {
//!         state.cat = StateCategory::await_event();
//!         0.0
//!     }
//!
//!     fn classify(&self, state: &CoinState) -> StateCategory {
//!         state.cat
//!     }
//!
//!     fn allowed_actions(&self, _state: &CoinState) -> Vec<i64> {
//!         vec![0, 1]
//!     }
//! }
//! ```

use crate::core::{SimError, SimResult, StateCategory, StaticInfo};
use crate::policy::registry::PolicyRegistry;
use crate::rng::RandomStream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

/// Structural contract of a sequential decision process
pub trait Mdp: Sized + Send + Sync + 'static {
    /// Model type identifier; also the registry key
    const TYPE_ID: &'static str;

    /// Model-specific configuration (hashed into the adapter identifier)
    type Config: Serialize + DeserializeOwned + Send + Sync;

    type State: Clone + Debug + Send + Sync + 'static;

    type Event;

    /// Build the model from its configuration
    ///
    /// # Errors
    /// `SimError::Configuration` for missing or out-of-range parameters.
    fn from_config(config: &Self::Config) -> SimResult<Self>;

    fn static_info(&self) -> StaticInfo;

    /// Deterministic initial state
    fn initial_state(&self) -> Self::State;

    /// Randomised initial state; defaults to the deterministic one
    fn random_initial_state(&self, rng: &mut RandomStream) -> Self::State {
        let _ = rng;
        self.initial_state()
    }

    /// Draw an event
    fn sample_event(&self, rng: &mut RandomStream) -> Self::Event;

    /// Draw an event for `AwaitEvent(stream)`
    ///
    /// Models that declare several event streams override this; the default
    /// ignores the stream index.
    fn sample_event_on(&self, stream: usize, rng: &mut RandomStream) -> Self::Event {
        let _ = stream;
        self.sample_event(rng)
    }

    /// Apply an event, returning the immediate cost
    fn apply_event(&self, state: &mut Self::State, event: &Self::Event) -> f64;

    /// Apply an action, returning the immediate cost
    ///
    /// Callers are responsible for passing an allowed action; what happens
    /// otherwise is up to the model.
    fn apply_action(&self, state: &mut Self::State, action: i64) -> f64;

    fn classify(&self, state: &Self::State) -> StateCategory;

    /// Actions allowed in `state`; never empty unless the state is `Final`
    fn allowed_actions(&self, state: &Self::State) -> Vec<i64>;

    fn is_allowed_action(&self, state: &Self::State, action: i64) -> bool {
        self.allowed_actions(state).contains(&action)
    }

    /// Register model-specific policies. The generic `"random"` policy is
    /// always registered by the adapter.
    fn register_policies(&self, registry: &mut PolicyRegistry<Self>) {
        let _ = registry;
    }

    /// Append the numeric encoding of `state` to `out`
    ///
    /// Must be a pure function of the state.
    fn features(&self, state: &Self::State, out: &mut Vec<f64>) -> SimResult<()> {
        let _ = (state, out);
        Err(SimError::UnsupportedOperation(format!(
            "model \"{}\" does not encode features",
            Self::TYPE_ID
        )))
    }

    /// Exact event distribution, for solvers that enumerate events
    fn event_probabilities(&self) -> SimResult<Vec<(Self::Event, f64)>> {
        Err(SimError::UnsupportedOperation(format!(
            "model \"{}\" does not enumerate event probabilities",
            Self::TYPE_ID
        )))
    }

    fn state_to_json(&self, state: &Self::State) -> SimResult<Value> {
        let _ = state;
        Err(SimError::UnsupportedOperation(format!(
            "model \"{}\" does not convert states to JSON",
            Self::TYPE_ID
        )))
    }

    fn state_from_json(&self, value: &Value) -> SimResult<Self::State> {
        let _ = value;
        Err(SimError::UnsupportedOperation(format!(
            "model \"{}\" does not build states from JSON",
            Self::TYPE_ID
        )))
    }
}

/// A policy written against a concrete model type
///
/// Registered through [`PolicyRegistry`] and handed out by the adapter as a
/// type-erased `PolicyHandle`. Deterministic policies ignore `rng`; randomised
/// ones draw from it (it is the trajectory's own policy stream).
pub trait ModelPolicy<M: Mdp>: Send + Sync {
    /// Select an action for `state`
    ///
    /// # Errors
    /// `SimError::NoAllowedActions` when the state admits no action.
    fn get_action(&self, state: &M::State, rng: &mut RandomStream) -> SimResult<i64>;
}
