//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Synthetic telemetry engine."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use sds_common::config::{FaultProfile, SimulationConfig, SpanConfig};

use crate::random::RandomSource;
use crate::state::{FaultDirection, SensorState};

/// Per-tick target update: a mean-reverting random walk for healthy machines and a
/// directional ramp for the faulted one.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftModel {
    step_pct: f64,
    mean_reversion: f64,
    centre_pct: f64,
    band: SpanConfig,
    profile: FaultProfile,
}

impl Default for DriftModel {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

impl DriftModel {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            step_pct: config.drift_step_pct,
            mean_reversion: config.mean_reversion,
            centre_pct: config.centre_pct,
            band: config.normal_band_pct,
            profile: config.fault_profile,
        }
    }

    /// Random-walk step with pull toward the centre, clamped to the normal band.
    pub fn normal_target(&self, current_pct: f64, rng: &mut impl RandomSource) -> f64 {
        let step = rng.uniform(-self.step_pct, self.step_pct);
        let next = current_pct + step + (self.centre_pct - current_pct) * self.mean_reversion;
        next.clamp(self.band.min, self.band.max)
    }

    /// Ramp for a faulted sensor at `progress` through the episode. Not clamped.
    pub fn fault_target(&self, direction: FaultDirection, progress: f64) -> f64 {
        match direction {
            FaultDirection::High => {
                self.profile.high_start_pct + progress * self.profile.high_overshoot_pct
            }
            FaultDirection::Low => {
                self.profile.low_start_pct - progress * self.profile.low_overshoot_pct
            }
        }
    }

    /// Advance one sensor.
    ///
    /// `fault_progress` is `Some` when the sensor's machine is the faulted machine.
    /// A faulted sensor without a direction gets one drawn here and keeps it until
    /// the episode clears; a healthy sensor loses any leftover direction.
    pub fn advance(
        &self,
        state: &mut SensorState,
        fault_progress: Option<f64>,
        rng: &mut impl RandomSource,
    ) {
        match fault_progress {
            None => {
                state.fault_direction = None;
                state.target_pct = self.normal_target(state.target_pct, rng);
            }
            Some(progress) => {
                let direction = *state
                    .fault_direction
                    .get_or_insert_with(|| draw_direction(rng));
                state.target_pct = self.fault_target(direction, progress);
            }
        }
    }
}

fn draw_direction(rng: &mut impl RandomSource) -> FaultDirection {
    if rng.index(2) == 0 {
        FaultDirection::High
    } else {
        FaultDirection::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{ScriptedRandom, SeededRandom};
    use approx::assert_relative_eq;

    fn state(target_pct: f64) -> SensorState {
        SensorState {
            target_pct,
            value: 0.0,
            fault_direction: None,
        }
    }

    #[test]
    fn normal_step_reverts_toward_centre() {
        let model = DriftModel::default();
        // Fraction 0.5 -> zero step; only the reversion term applies.
        let mut rng = ScriptedRandom::new().with_fractions([0.5, 1.0, 0.0]);
        assert_relative_eq!(model.normal_target(70.0, &mut rng), 69.0);
        assert_relative_eq!(model.normal_target(50.0, &mut rng), 52.0);
        assert_relative_eq!(model.normal_target(30.0, &mut rng), 29.0);
    }

    #[test]
    fn normal_target_never_leaves_band() {
        let model = DriftModel::default();
        let mut rng = SeededRandom::from_seed(99);
        let mut target = 50.0;
        for _ in 0..20_000 {
            target = model.normal_target(target, &mut rng);
            assert!((15.0..=85.0).contains(&target));
        }
        // Even pinned at an edge by a scripted extreme walk.
        let mut rng = ScriptedRandom::new().with_fractions(std::iter::repeat(1.0).take(500));
        let mut target = 84.0;
        for _ in 0..500 {
            target = model.normal_target(target, &mut rng);
            assert!(target <= 85.0);
        }
    }

    #[test]
    fn returning_from_fault_clamps_into_band() {
        let model = DriftModel::default();
        let mut rng = ScriptedRandom::new();
        assert_eq!(model.normal_target(120.0, &mut rng), 85.0);
        assert_eq!(model.normal_target(-10.0, &mut rng), 15.0);
    }

    #[test]
    fn fault_ramps_follow_profile() {
        let model = DriftModel::default();
        assert_relative_eq!(model.fault_target(FaultDirection::High, 0.0), 80.0);
        assert_relative_eq!(model.fault_target(FaultDirection::High, 0.5), 100.0);
        assert_relative_eq!(model.fault_target(FaultDirection::High, 1.0), 120.0);
        assert_relative_eq!(model.fault_target(FaultDirection::Low, 0.0), 20.0);
        assert_relative_eq!(model.fault_target(FaultDirection::Low, 1.0), -10.0);
        // Slightly past the end before the episode clears; no clamp.
        assert!(model.fault_target(FaultDirection::High, 1.05) > 120.0);
    }

    #[test]
    fn custom_profile_changes_ramp() {
        let config = SimulationConfig {
            fault_profile: FaultProfile {
                high_start_pct: 90.0,
                high_overshoot_pct: 10.0,
                low_start_pct: 10.0,
                low_overshoot_pct: 5.0,
            },
            ..SimulationConfig::default()
        };
        let model = DriftModel::from_config(&config);
        assert_relative_eq!(model.fault_target(FaultDirection::High, 1.0), 100.0);
        assert_relative_eq!(model.fault_target(FaultDirection::Low, 1.0), 5.0);
    }

    #[test]
    fn fault_direction_is_drawn_once_per_episode() {
        let model = DriftModel::default();
        let mut rng = ScriptedRandom::new().with_indices([1, 0, 0]);
        let mut sensor = state(50.0);
        model.advance(&mut sensor, Some(0.0), &mut rng);
        assert_eq!(sensor.fault_direction, Some(FaultDirection::Low));
        assert_relative_eq!(sensor.target_pct, 20.0);

        model.advance(&mut sensor, Some(1.0), &mut rng);
        assert_eq!(sensor.fault_direction, Some(FaultDirection::Low));
        assert_relative_eq!(sensor.target_pct, -10.0);
    }

    #[test]
    fn healthy_advance_clears_direction() {
        let model = DriftModel::default();
        let mut rng = ScriptedRandom::new();
        let mut sensor = SensorState {
            fault_direction: Some(FaultDirection::High),
            ..state(120.0)
        };
        model.advance(&mut sensor, None, &mut rng);
        assert!(sensor.fault_direction.is_none());
        assert_eq!(sensor.target_pct, 85.0);
    }
}
