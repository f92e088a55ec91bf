//! Random-number facade.
//!
//! Host execution and accelerator execution are backed by different
//! generator implementations. [`RandomGenerator`] hides which one is in use:
//! callers only see an [`RngCore`] and a seed.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Which generator implementation backs a [`RandomGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// General-purpose host generator.
    Host,
    /// Counter-based generator matching accelerator-side streams.
    Accelerator,
}

#[derive(Debug, Clone)]
enum Engine {
    Host(StdRng),
    Accelerator(ChaCha8Rng),
}

/// Seedable random stream with a hidden implementation.
///
/// Cloning yields an independent generator of the same kind, starting from
/// the source's current state.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    seed: u64,
    engine: Engine,
}

impl RandomGenerator {
    /// Generator seeded from a high-entropy process-specific source.
    pub fn new(kind: GeneratorKind) -> Self {
        Self::with_seed(kind, entropy_seed())
    }

    /// Fully deterministic generator.
    pub fn with_seed(kind: GeneratorKind, seed: u64) -> Self {
        let engine = match kind {
            GeneratorKind::Host => Engine::Host(StdRng::seed_from_u64(seed)),
            GeneratorKind::Accelerator => Engine::Accelerator(ChaCha8Rng::seed_from_u64(seed)),
        };
        Self { seed, engine }
    }

    pub fn kind(&self) -> GeneratorKind {
        match self.engine {
            Engine::Host(_) => GeneratorKind::Host,
            Engine::Accelerator(_) => GeneratorKind::Accelerator,
        }
    }

    /// Seed the stream was last (re)started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the stream from `seed`, keeping the implementation.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::with_seed(self.kind(), seed);
    }

    /// Opaque handle to the underlying generator.
    pub fn generator(&mut self) -> &mut dyn RngCore {
        match &mut self.engine {
            Engine::Host(rng) => rng,
            Engine::Accelerator(rng) => rng,
        }
    }
}

impl RngCore for RandomGenerator {
    fn next_u32(&mut self) -> u32 {
        self.generator().next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.generator().next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.generator().fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.generator().try_fill_bytes(dest)
    }
}

/// Draw a seed from the operating system, falling back to process id and time.
pub fn entropy_seed() -> u64 {
    let mut bytes = [0u8; 8];
    match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(e) => {
            debug!(error = %e, "os entropy unavailable, deriving seed from pid and time");
            let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or_default();
            splitmix64(nanos ^ (u64::from(std::process::id()) << 32))
        }
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
