//! Deterministic random number generation
//!
//! Every trajectory owns its own set of ChaCha8 streams, seeded from a base
//! seed, a per-trajectory ordinal and a stream index.
//! CRITICAL: All randomness in the simulator MUST go through this module.

mod streams;

pub use streams::{RandomStream, RngStreams};
