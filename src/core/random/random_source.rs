// Randomness behind a trait so the XP roll and the 8-ball pick can be
// seeded in tests instead of going through a process-global RNG.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

pub trait RandomSource: Send + Sync {
    /// Uniform integer in [low, high). Callers guarantee low < high.
    fn roll_range(&self, low: u64, high: u64) -> u64;

    /// Uniform index in [0, len). Callers guarantee len > 0.
    fn pick(&self, len: usize) -> usize;
}

/// Production source backed by `StdRng`.
///
/// The Mutex is uncontended in practice - one roll per inbound message -
/// and keeps the trait object `Sync` without threading `&mut` everywhere.
pub struct StdRandomSource {
    rng: Mutex<StdRng>,
}

impl StdRandomSource {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic source for tests.
    #[allow(dead_code)]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for StdRandomSource {
    fn roll_range(&self, low: u64, high: u64) -> u64 {
        let mut rng = self.rng.lock().expect("RNG lock poisoned");
        rng.gen_range(low..high)
    }

    fn pick(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().expect("RNG lock poisoned");
        rng.gen_range(0..len)
    }
}
