//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Synthetic telemetry engine."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
//! Fault episode state machine.
//!
//! The controller is either idle or faulting exactly one machine. A new episode can
//! only start from idle, so two machines are never faulted at once.

use chrono::{DateTime, Utc};
use sds_common::config::{SimulationConfig, SpanConfig};
use sds_common::time::seconds_between;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::LimitCatalog;
use crate::errors::{Result, SimError};
use crate::random::RandomSource;

/// The single live fault.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultEpisode {
    pub machine: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl FaultEpisode {
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        seconds_between(self.started_at, now)
    }

    /// Fraction of the episode elapsed at `now`. May slightly exceed 1 before expiry.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if self.duration_secs <= 0.0 {
            return 1.0;
        }
        self.elapsed_secs(now) / self.duration_secs
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_secs(now) > self.duration_secs
    }
}

/// Observable controller state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FaultTransition {
    Started {
        machine: String,
        duration_secs: f64,
    },
    Cleared {
        machine: String,
        elapsed_secs: f64,
    },
}

impl FaultTransition {
    pub fn machine(&self) -> &str {
        match self {
            FaultTransition::Started { machine, .. } | FaultTransition::Cleared { machine, .. } => {
                machine
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FaultController {
    probability: f64,
    duration_secs: SpanConfig,
    active: Option<FaultEpisode>,
}

impl Default for FaultController {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

impl FaultController {
    pub fn new(probability: f64, duration_secs: SpanConfig) -> Self {
        Self {
            probability,
            duration_secs,
            active: None,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.fault_probability, config.fault_duration_secs)
    }

    pub fn active(&self) -> Option<&FaultEpisode> {
        self.active.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    /// Whether `machine` is the machine currently faulted.
    pub fn is_faulted(&self, machine: &str) -> bool {
        self.active
            .as_ref()
            .is_some_and(|episode| episode.machine == machine)
    }

    /// Progress of the live episode for sensors of `machine`, or `None` when healthy.
    pub fn progress_for(&self, machine: &str, now: DateTime<Utc>) -> Option<f64> {
        self.active
            .as_ref()
            .filter(|episode| episode.machine == machine)
            .map(|episode| episode.progress(now))
    }

    /// Faulted → Idle once the episode has outlived its duration.
    ///
    /// Returns the finished episode so the caller can clear its sensors' tags.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Option<(FaultEpisode, FaultTransition)> {
        if !self.active.as_ref().is_some_and(|episode| episode.is_expired(now)) {
            return None;
        }
        let episode = self.active.take()?;
        let elapsed_secs = episode.elapsed_secs(now);
        info!(
            machine = %episode.machine,
            elapsed_secs,
            duration_secs = episode.duration_secs,
            "fault episode cleared"
        );
        let transition = FaultTransition::Cleared {
            machine: episode.machine.clone(),
            elapsed_secs,
        };
        Some((episode, transition))
    }

    /// Idle → Faulted with the configured per-tick probability.
    ///
    /// No draw is made while an episode is live or when the catalog has no machines.
    /// Draw order: trigger chance, machine index, duration.
    pub fn maybe_trigger(
        &mut self,
        catalog: &LimitCatalog,
        now: DateTime<Utc>,
        rng: &mut impl RandomSource,
    ) -> Option<FaultTransition> {
        if self.active.is_some() || catalog.machine_count() == 0 {
            return None;
        }
        if !rng.chance(self.probability) {
            return None;
        }
        let machine = catalog.machine_at(rng.index(catalog.machine_count()))?;
        let duration_secs = rng.uniform(self.duration_secs.min, self.duration_secs.max);
        Some(self.start(machine.to_owned(), now, duration_secs))
    }

    /// Start an episode on `machine` immediately, bypassing the trigger draw.
    pub fn force(
        &mut self,
        catalog: &LimitCatalog,
        machine: &str,
        now: DateTime<Utc>,
        duration_secs: f64,
    ) -> Result<FaultTransition> {
        if let Some(episode) = &self.active {
            return Err(SimError::FaultActive(episode.machine.clone()));
        }
        if catalog.machine_sensors(machine).is_empty() {
            return Err(SimError::UnknownMachine(machine.to_owned()));
        }
        Ok(self.start(machine.to_owned(), now, duration_secs))
    }

    fn start(&mut self, machine: String, now: DateTime<Utc>, duration_secs: f64) -> FaultTransition {
        warn!(machine = %machine, duration_secs, "fault episode started");
        self.active = Some(FaultEpisode {
            machine: machine.clone(),
            started_at: now,
            duration_secs,
        });
        FaultTransition::Started {
            machine,
            duration_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SensorSpec;
    use crate::random::{ScriptedRandom, SeededRandom};
    use chrono::{Duration, TimeZone};

    fn catalog() -> LimitCatalog {
        LimitCatalog::from_specs([
            SensorSpec::new("PUMP1:TEMP", 0.0, 100.0),
            SensorSpec::new("PUMP1:RPM", 0.0, 3000.0),
            SensorSpec::new("VALVE1:STATE", 0.0, 1.0),
        ])
        .unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn trigger_selects_machine_and_duration() {
        let mut controller = FaultController::default();
        let mut rng = ScriptedRandom::new()
            .with_chances([true])
            .with_indices([1])
            .with_fractions([0.0]);
        let transition = controller.maybe_trigger(&catalog(), t0(), &mut rng).unwrap();
        assert_eq!(
            transition,
            FaultTransition::Started {
                machine: "VALVE1".into(),
                duration_secs: 30.0
            }
        );
        assert!(controller.is_faulted("VALVE1"));
        assert!(!controller.is_faulted("PUMP1"));
        assert_eq!(controller.active().unwrap().started_at, t0());
    }

    #[test]
    fn failed_trigger_stays_idle() {
        let mut controller = FaultController::default();
        let mut rng = ScriptedRandom::new().with_chances([false]);
        assert!(controller.maybe_trigger(&catalog(), t0(), &mut rng).is_none());
        assert!(controller.is_idle());
    }

    #[test]
    fn live_episode_blocks_new_trigger() {
        let mut controller = FaultController::default();
        controller.force(&catalog(), "PUMP1", t0(), 60.0).unwrap();
        let mut rng = ScriptedRandom::new().with_chances([true]).with_indices([1]);
        assert!(controller
            .maybe_trigger(&catalog(), t0() + Duration::seconds(5), &mut rng)
            .is_none());
        assert!(controller.is_faulted("PUMP1"));
        assert!(matches!(
            controller.force(&catalog(), "VALVE1", t0(), 10.0),
            Err(SimError::FaultActive(machine)) if machine == "PUMP1"
        ));
    }

    #[test]
    fn empty_catalog_never_triggers() {
        let empty = LimitCatalog::default();
        let mut controller = FaultController::new(1.0, SpanConfig::new(30.0, 120.0));
        let mut rng = ScriptedRandom::new().with_chances([true]);
        assert!(controller.maybe_trigger(&empty, t0(), &mut rng).is_none());
        assert!(controller.is_idle());
        // The queued chance was not consumed.
        assert!(rng.chance(0.0));
    }

    #[test]
    fn expiry_requires_elapsed_strictly_greater() {
        let mut controller = FaultController::default();
        controller.force(&catalog(), "PUMP1", t0(), 30.0).unwrap();
        assert!(controller.expire(t0() + Duration::seconds(30)).is_none());
        let (episode, transition) = controller.expire(t0() + Duration::seconds(31)).unwrap();
        assert_eq!(episode.machine, "PUMP1");
        assert_eq!(transition.machine(), "PUMP1");
        assert!(controller.is_idle());
        assert!(controller.expire(t0() + Duration::seconds(60)).is_none());
    }

    #[test]
    fn progress_is_scoped_to_faulted_machine() {
        let mut controller = FaultController::default();
        controller.force(&catalog(), "PUMP1", t0(), 40.0).unwrap();
        let now = t0() + Duration::seconds(10);
        assert_eq!(controller.progress_for("PUMP1", now), Some(0.25));
        assert_eq!(controller.progress_for("VALVE1", now), None);
    }

    #[test]
    fn force_rejects_unknown_machine() {
        let mut controller = FaultController::default();
        assert!(matches!(
            controller.force(&catalog(), "BOILER", t0(), 30.0),
            Err(SimError::UnknownMachine(_))
        ));
    }

    #[test]
    fn at_most_one_episode_over_long_run() {
        let catalog = catalog();
        let mut controller = FaultController::new(0.5, SpanConfig::new(2.0, 5.0));
        let mut rng = SeededRandom::from_seed(8);
        let mut live = 0i32;
        for second in 0..5_000 {
            let now = t0() + Duration::seconds(second);
            if controller.expire(now).is_some() {
                live -= 1;
            }
            if controller.maybe_trigger(&catalog, now, &mut rng).is_some() {
                live += 1;
            }
            assert!((0..=1).contains(&live));
            assert_eq!(live == 1, controller.active().is_some());
        }
    }
}
