//! Seeded random streams
//!
//! # Seeding
//!
//! A stream is identified by the triple `(base_seed, ordinal, stream key)`:
//!
//! ```text
//! key = stream slot (initiation, policy, event 0, event 1, ...)
//! rng = ChaCha8Rng::seed_from_u64(mix(base_seed, key))
//! rng.set_stream(ordinal)
//! ```
//!
//! The ordinal selects one of ChaCha's 2^64 independent streams, so trajectory
//! `k` of a batch gets the same numbers whether it is simulated first, last or
//! on another thread.
//!
//! # Determinism
//!
//! Same triple → same sequence of random numbers. This is CRITICAL for:
//! - Reproducing a single rollout
//! - Common random numbers when comparing policies or candidate actions
//! - Testing

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

const INITIATION_KEY: u64 = 0;
const POLICY_KEY: u64 = 1;
const FIRST_EVENT_KEY: u64 = 2;

/// splitmix64 finalizer; decorrelates nearby seeds before they reach ChaCha
fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// One independent random stream
///
/// Implements [`rand::RngCore`], so models can use any `rand` distribution.
///
/// # Example
/// ```
/// use decision_simulator_core_rs::RandomStream;
///
/// let mut rng = RandomStream::new(12345);
/// let value = rng.range(0, 100); // [0, 100)
/// assert!((0..100).contains(&value));
/// ```
#[derive(Debug, Clone)]
pub struct RandomStream {
    inner: ChaCha8Rng,
}

impl RandomStream {
    /// Create a stream from a single seed (ordinal 0)
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(mix64(seed)),
        }
    }

    /// Create the stream `key` for trajectory `ordinal` under `base_seed`
    pub fn for_stream(base_seed: u64, ordinal: u64, key: u64) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(mix64(base_seed ^ mix64(key)));
        inner.set_stream(ordinal);
        Self { inner }
    }

    /// Generate next random u64 value
    pub fn next(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Generate random value in range [min, max)
    ///
    /// # Panics
    /// Panics if min >= max
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");
        self.inner.gen_range(min..max)
    }

    /// Generate random f64 in range [0.0, 1.0)
    pub fn next_f64(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }
}

impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

/// The full set of streams owned by one trajectory
///
/// - one stream per event stream declared by the model
/// - one initiation stream (random initial states)
/// - one policy stream (randomised policies)
///
/// Streams are never shared between trajectories.
#[derive(Debug, Clone)]
pub struct RngStreams {
    initiation: RandomStream,
    policy: RandomStream,
    events: Vec<RandomStream>,
}

impl RngStreams {
    /// Create streams for `num_event_streams` event streams (at least one),
    /// seeded with base seed 0 and ordinal 0
    pub fn new(num_event_streams: usize) -> Self {
        Self::seeded(num_event_streams, 0, 0)
    }

    pub fn seeded(num_event_streams: usize, base_seed: u64, ordinal: u64) -> Self {
        let events = (0..num_event_streams.max(1) as u64)
            .map(|i| RandomStream::for_stream(base_seed, ordinal, FIRST_EVENT_KEY + i))
            .collect();
        Self {
            initiation: RandomStream::for_stream(base_seed, ordinal, INITIATION_KEY),
            policy: RandomStream::for_stream(base_seed, ordinal, POLICY_KEY),
            events,
        }
    }

    /// Reseed every stream for `(base_seed, ordinal)`
    pub fn reseed(&mut self, base_seed: u64, ordinal: u64) {
        *self = Self::seeded(self.events.len(), base_seed, ordinal);
    }

    pub fn num_event_streams(&self) -> usize {
        self.events.len()
    }

    pub fn initiation(&mut self) -> &mut RandomStream {
        &mut self.initiation
    }

    pub fn policy(&mut self) -> &mut RandomStream {
        &mut self.policy
    }

    /// Event stream `index`, or `None` if the model declared fewer streams
    pub fn event(&mut self, index: usize) -> Option<&mut RandomStream> {
        self.events.get_mut(index)
    }
}
