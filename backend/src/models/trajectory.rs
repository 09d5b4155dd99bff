//! Trajectory
//!
//! One simulated run of a model. A trajectory owns exactly one state plus
//! the bookkeeping the step engine maintains:
//!
//! - `category`: which engine operation is legal next
//! - `event_count`: events incorporated since the last initiation
//! - `epoch_count`: decision epochs since the last initiation (see below)
//! - `cumulative_return`: discounted cost accrued so far
//! - `effective_discount_factor`: product of per-event discount factors so far
//! - `next_action`: set by a policy, consumed by `incorporate_action`
//! - `rng`: the trajectory's private random streams
//!
//! # Lifecycle
//!
//! ```text
//! Trajectory::new  →  initiate_state  →  incorporate_event / incorporate_action ...
//!   (no state)        (counters reset)    (mutated in place)
//! ```
//!
//! Trajectories are owned by the caller; the engine never keeps references
//! to them across calls.
//!
//! # Epochs
//!
//! Every event closes an epoch. An action that follows another action with
//! no event in between also closes one, so a model that never emits events
//! still advances towards any epoch limit:
//!
//! ```text
//! action, event, action, event      → 2 epochs (= event_count)
//! action, action, action            → 2 epochs
//! ```

use crate::core::{SimError, SimResult, StateCategory};
use crate::models::state::OpaqueState;
use crate::rng::RngStreams;

/// One simulated run of a model
#[derive(Debug, Clone)]
pub struct Trajectory {
    /// Current state category
    pub category: StateCategory,

    /// Action to incorporate next (valid between selection and incorporation)
    pub next_action: i64,

    /// Number of events incorporated since initiation
    pub event_count: usize,

    /// Number of epochs since initiation; horizons are measured in epochs
    pub epoch_count: usize,

    /// Sum of `cost × effective_discount_factor` over all steps so far
    pub cumulative_return: f64,

    /// Discount applied to the next step's cost
    pub effective_discount_factor: f64,

    /// Private random streams (events, initiation, policy)
    pub rng: RngStreams,

    state: Option<OpaqueState>,

    /// Whether the last incorporated step was an action
    after_action: bool,
}

impl Trajectory {
    /// Create an empty trajectory with streams for `num_event_streams` event
    /// streams, seeded with base seed 0 and ordinal 0
    pub fn new(num_event_streams: usize) -> Self {
        Self::seeded(num_event_streams, 0, 0)
    }

    /// Create an empty trajectory seeded for `(base_seed, ordinal)`
    pub fn seeded(num_event_streams: usize, base_seed: u64, ordinal: u64) -> Self {
        Self {
            category: StateCategory::Final,
            next_action: 0,
            event_count: 0,
            epoch_count: 0,
            cumulative_return: 0.0,
            effective_discount_factor: 1.0,
            rng: RngStreams::seeded(num_event_streams, base_seed, ordinal),
            state: None,
            after_action: false,
        }
    }

    /// Reseed every random stream for `(base_seed, ordinal)`
    pub fn seed_rngs(&mut self, base_seed: u64, ordinal: u64) {
        self.rng.reseed(base_seed, ordinal);
    }

    pub fn has_state(&self) -> bool {
        self.state.is_some()
    }

    /// Current state
    ///
    /// # Errors
    /// `ContractViolation` if the trajectory was never initiated.
    pub fn state(&self) -> SimResult<&OpaqueState> {
        self.state.as_ref().ok_or_else(uninitiated)
    }

    pub(crate) fn state_mut(&mut self) -> SimResult<&mut OpaqueState> {
        self.state.as_mut().ok_or_else(uninitiated)
    }

    /// Split borrow of the state and the random streams
    pub(crate) fn state_and_rng(&mut self) -> SimResult<(&mut OpaqueState, &mut RngStreams)> {
        match self.state.as_mut() {
            Some(state) => Ok((state, &mut self.rng)),
            None => Err(uninitiated()),
        }
    }

    /// Install a new state and reset all accumulators
    pub(crate) fn reset(&mut self, state: OpaqueState, category: StateCategory) {
        self.state = Some(state);
        self.category = category;
        self.next_action = 0;
        self.event_count = 0;
        self.epoch_count = 0;
        self.cumulative_return = 0.0;
        self.effective_discount_factor = 1.0;
        self.after_action = false;
    }

    /// Book an incorporated event
    pub(crate) fn close_event_epoch(&mut self) {
        self.event_count += 1;
        self.epoch_count += 1;
        self.after_action = false;
    }

    /// Book an incorporated action
    pub(crate) fn record_action(&mut self) {
        if self.after_action {
            self.epoch_count += 1;
        }
        self.after_action = true;
    }
}

fn uninitiated() -> SimError {
    SimError::ContractViolation("trajectory has no state; call initiate_state first".to_string())
}
