//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Synthetic telemetry engine."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of every random draw the engine makes.
///
/// Drift noise, synthesis noise, the fault trigger, and fault duration/machine/direction
/// choices all go through this trait, so a scripted implementation pins exact outputs.
pub trait RandomSource {
    /// Uniform draw in `[low, high]`. Returns `low` when the interval is empty.
    fn uniform(&mut self, low: f64, high: f64) -> f64;
    /// Bernoulli trial succeeding with `probability`.
    fn chance(&mut self, probability: f64) -> bool;
    /// Uniform index in `0..len`; `len` is non-zero.
    fn index(&mut self, len: usize) -> usize;
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        (**self).uniform(low, high)
    }

    fn chance(&mut self, probability: f64) -> bool {
        (**self).chance(probability)
    }

    fn index(&mut self, len: usize) -> usize {
        (**self).index(len)
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        (**self).uniform(low, high)
    }

    fn chance(&mut self, probability: f64) -> bool {
        (**self).chance(probability)
    }

    fn index(&mut self, len: usize) -> usize {
        (**self).index(len)
    }
}

/// Pseudo-random source backed by [`StdRng`].
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Reproducible stream for a given seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Stream seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandomSource for SeededRandom {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if low.is_nan() || high.is_nan() || high <= low {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    fn chance(&mut self, probability: f64) -> bool {
        if probability.is_nan() {
            return false;
        }
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len.max(1))
    }
}

/// Replays queued draws in order, falling back to neutral values when a queue runs dry.
///
/// Uniform draws are scripted as unit fractions: `0.0` yields `low`, `1.0` yields `high`,
/// and the fallback `0.5` yields the midpoint (zero noise, zero drift). Chances fall back
/// to `false` and indices to `0`.
#[derive(Debug, Default, Clone)]
pub struct ScriptedRandom {
    fractions: VecDeque<f64>,
    chances: VecDeque<bool>,
    indices: VecDeque<usize>,
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue unit fractions for upcoming `uniform` calls.
    pub fn with_fractions(mut self, fractions: impl IntoIterator<Item = f64>) -> Self {
        self.fractions.extend(fractions);
        self
    }

    /// Queue outcomes for upcoming `chance` calls.
    pub fn with_chances(mut self, chances: impl IntoIterator<Item = bool>) -> Self {
        self.chances.extend(chances);
        self
    }

    /// Queue results for upcoming `index` calls.
    pub fn with_indices(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.indices.extend(indices);
        self
    }

    pub fn push_fraction(&mut self, fraction: f64) {
        self.fractions.push_back(fraction);
    }

    pub fn push_chance(&mut self, outcome: bool) {
        self.chances.push_back(outcome);
    }

    pub fn push_index(&mut self, index: usize) {
        self.indices.push_back(index);
    }
}

impl RandomSource for ScriptedRandom {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        let fraction = self.fractions.pop_front().unwrap_or(0.5);
        low + (high - low) * fraction
    }

    fn chance(&mut self, _probability: f64) -> bool {
        self.chances.pop_front().unwrap_or(false)
    }

    fn index(&mut self, len: usize) -> usize {
        self.indices.pop_front().unwrap_or(0) % len.max(1)
    }
}
