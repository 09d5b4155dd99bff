//! Model contract and per-simulation state
//!
//! - **contract**: the `Mdp` trait a model type implements, and `ModelPolicy`
//! - **state**: `OpaqueState`, a model state with its owner tag erased
//! - **trajectory**: one simulated run (state, category, return bookkeeping, RNG)

pub mod contract;
pub mod state;
pub mod trajectory;

// Re-exports
pub use contract::{Mdp, ModelPolicy};
pub use state::OpaqueState;
pub use trajectory::Trajectory;
