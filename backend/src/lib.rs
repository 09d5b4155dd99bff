//! Decision Simulator Core - Rust Engine
//!
//! Generic simulation and policy-improvement engine for sequential decision
//! processes with deterministic, parallel execution.
//!
//! # Architecture
//!
//! - **core**: State categories, static model info, error type
//! - **rng**: Seeded per-trajectory random streams
//! - **models**: The `Mdp` contract, opaque states, trajectories
//! - **erasure**: Adapter turning any `Mdp` into a `dyn Simulatable`
//! - **policy**: Policy interface, random policy, per-model policy registry
//! - **rollout**: Rollout evaluation of candidate actions
//! - **search**: Sequential halving over candidate actions
//! - **orchestrator**: Generation loop (sample → search → train → save)
//! - **comparer**: Policy comparison on common random numbers
//! - **events**: Event log of generation and comparison runs
//! - **registry**: Model type registry
//! - **demonstrator**: Step-by-step traces of single trajectories
//! - **modelling**: Helpers for model authors
//!
//! # Critical Invariants
//!
//! 1. All randomness is deterministic (seeded by base seed and ordinal)
//! 2. Results are identical regardless of thread count
//! 3. States and policies are only ever used with the adapter that issued them
//! 4. Every returned value is a cost; lower is better

// Module declarations
pub mod comparer;
pub mod core;
pub mod demonstrator;
pub mod erasure;
pub mod events;
pub mod modelling;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod registry;
pub mod rng;
pub mod rollout;
pub mod search;

// Re-exports for convenience
pub use comparer::{ComparerConfig, PairedComparison, PolicyComparer, PolicyComparison};
pub use core::{HorizonType, SimError, SimResult, StateCategory, StaticInfo};
pub use erasure::{typed_state, ModelAdapter, Simulatable, SimulatableHandle};
pub use events::{Event, EventLog};
pub use models::{Mdp, ModelPolicy, OpaqueState, Trajectory};
pub use orchestrator::{
    GenerationManifest, GenerationReport, ImprovementConfig, PolicyImprover, PolicyStore,
    PolicyTrainer, TrainingSample,
};
pub use policy::{Policy, PolicyEvaluator, PolicyHandle, PolicyInfo, PolicyRegistry};
pub use registry::{ModelInfo, ModelRegistry};
pub use rng::{RandomStream, RngStreams};
pub use rollout::{ActionEvaluation, RolloutConfig, RolloutEvaluator};
pub use search::{SearchConfig, SearchResult, SequentialHalvingSearch, TargetKind};
