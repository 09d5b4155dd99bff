//! Orchestrator - generation loop and run bookkeeping
//!
//! See `engine.rs` for the loop itself and `checkpoint.rs` for config hashing
//! and the generation manifest.

pub mod checkpoint;
pub mod engine;

pub use engine::{
    GenerationReport, ImprovementConfig, PolicyImprover, PolicyStore, PolicyTrainer, SampleStats,
    TrainingSample,
};

pub use checkpoint::{compute_config_hash, owner_tag, GenerationManifest};
