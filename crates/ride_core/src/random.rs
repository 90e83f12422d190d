//! Injectable randomness for distance jitter, weather surge, captain choice
//! and ride codes.
//!
//! Statistical behaviour only; nothing correctness-bearing depends on the
//! order in which concurrent callers draw from a shared source.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform random draws.
pub trait RandomSource: Send + Sync + std::fmt::Debug {
    /// Sample from `[0, 1)`.
    fn next_unit(&self) -> f64;

    /// Sample an index in `0..len`. `len` must be non-zero.
    fn pick_index(&self, len: usize) -> usize {
        debug_assert!(len > 0, "pick_index needs a non-empty range");
        ((self.next_unit() * len as f64) as usize).min(len.saturating_sub(1))
    }
}

/// `StdRng` behind a mutex; seeded for reproducible runs, entropy otherwise.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng: Mutex::new(rng) }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen::<f64>()
    }

    fn pick_index(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(0..len)
    }
}

/// Always returns the same unit sample. Pins jitter, weather and selection.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&self) -> f64 {
        self.0.clamp(0.0, 1.0 - f64::EPSILON)
    }
}
