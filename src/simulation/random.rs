//! Random sources for the step failure model.
//!
//! The engine asks for uniform draws in `[0, 1)`. Production uses a seeded or
//! entropy-seeded `SmallRng`; tests inject fixed or scripted draws so the
//! compound failure rule can be driven deterministically.

use std::collections::VecDeque;

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    /// Returns the next draw.
    fn next_unit(&self) -> f64;
}

/// `SmallRng`-backed source.
pub struct SeededRandom {
    rng: Mutex<SmallRng>,
}

impl SeededRandom {
    /// Seeds from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Seeds deterministically.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl Default for SeededRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl std::fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededRandom").finish_non_exhaustive()
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }
}

/// Returns the same draw every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&self) -> f64 {
        self.0
    }
}

/// Replays a script of draws, then falls back to a default value.
#[derive(Debug)]
pub struct ScriptedRandom {
    script: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl ScriptedRandom {
    /// Creates a source that replays `draws` and then returns `fallback`.
    #[must_use]
    pub fn new(draws: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            script: Mutex::new(draws.into_iter().collect()),
            fallback,
        }
    }

    /// Draws not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&self) -> f64 {
        self.script.lock().pop_front().unwrap_or(self.fallback)
    }
}
