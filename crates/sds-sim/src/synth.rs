//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Synthetic telemetry engine."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use sds_common::config::SimulationConfig;

use crate::catalog::SensorSpec;
use crate::random::RandomSource;

/// Maps a target percentage onto a sensor's physical range, adds noise, and clamps
/// the result to the tolerance band around the nominal range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Synthesizer {
    noise_fraction: f64,
    tolerance_fraction: f64,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

impl Synthesizer {
    pub fn new(noise_fraction: f64, tolerance_fraction: f64) -> Self {
        Self {
            noise_fraction,
            tolerance_fraction,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.noise_fraction, config.tolerance_fraction)
    }

    /// Draw a fresh noise fraction and synthesize `spec` at `target_pct`.
    ///
    /// Degenerate ranges consume no draw.
    pub fn synthesize(&self, spec: &SensorSpec, target_pct: f64, rng: &mut impl RandomSource) -> f64 {
        if spec.span() <= 0.0 {
            return spec.low;
        }
        let noise = rng.uniform(-self.noise_fraction, self.noise_fraction);
        self.value_with_noise(spec, target_pct, noise)
    }

    /// Deterministic core: `noise` is the fraction of span to add before clamping.
    pub fn value_with_noise(&self, spec: &SensorSpec, target_pct: f64, noise: f64) -> f64 {
        let span = spec.span();
        if span <= 0.0 {
            return spec.low;
        }
        let raw = spec.low + span * target_pct / 100.0 + noise * span;
        let margin = self.tolerance_fraction * span;
        raw.clamp(spec.low - margin, spec.high + margin)
    }

    /// Bounds a synthesized value of `spec` can take.
    pub fn tolerance_band(&self, spec: &SensorSpec) -> (f64, f64) {
        let span = spec.span();
        if span <= 0.0 {
            return (spec.low, spec.low);
        }
        let margin = self.tolerance_fraction * span;
        (spec.low - margin, spec.high + margin)
    }
}

/// Wire form of a synthesized value: `"0"`/`"1"` for binary sensors, two decimals otherwise.
pub fn format_value(spec: &SensorSpec, value: f64) -> String {
    if spec.is_binary() {
        let state = if value.round_ties_even() >= 1.0 { 1 } else { 0 };
        state.to_string()
    } else {
        format!("{:.2}", value)
    }
}
