//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Synthetic telemetry engine."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use indexmap::IndexMap;
use sds_common::config::SpanConfig;
use serde::Serialize;

use crate::catalog::LimitCatalog;
use crate::errors::{Result, SimError};
use crate::random::RandomSource;
use crate::synth::Synthesizer;

/// Direction a faulted sensor is pushed for the whole episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultDirection {
    High,
    Low,
}

impl FaultDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultDirection::High => "high",
            FaultDirection::Low => "low",
        }
    }
}

/// Mutable simulation state of one sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    /// Position within the nominal range, in percent. Faults may push it past 0–100.
    pub target_pct: f64,
    /// Last synthesized value.
    pub value: f64,
    /// Present only while the sensor's machine is faulted.
    pub fault_direction: Option<FaultDirection>,
}

/// Per-sensor state keyed by identity. The key set is fixed at initialization.
#[derive(Debug, Clone)]
pub struct SensorStateStore {
    states: IndexMap<String, SensorState>,
}

impl SensorStateStore {
    /// Seed every catalog sensor with a target drawn from `initial_target_pct`
    /// and synthesize its first value.
    pub fn initialize(
        catalog: &LimitCatalog,
        initial_target_pct: SpanConfig,
        synthesizer: &Synthesizer,
        rng: &mut impl RandomSource,
    ) -> Self {
        let states = catalog
            .sensors()
            .map(|spec| {
                let target_pct = rng.uniform(initial_target_pct.min, initial_target_pct.max);
                let value = synthesizer.synthesize(spec, target_pct, rng);
                (
                    spec.identity.clone(),
                    SensorState {
                        target_pct,
                        value,
                        fault_direction: None,
                    },
                )
            })
            .collect();
        Self { states }
    }

    pub fn get(&self, identity: &str) -> Option<&SensorState> {
        self.states.get(identity)
    }

    pub fn get_mut(&mut self, identity: &str) -> Result<&mut SensorState> {
        self.states
            .get_mut(identity)
            .ok_or_else(|| SimError::UnknownSensor(identity.to_owned()))
    }

    pub fn set_target(&mut self, identity: &str, target_pct: f64) -> Result<()> {
        self.get_mut(identity)?.target_pct = target_pct;
        Ok(())
    }

    pub fn set_value(&mut self, identity: &str, value: f64) -> Result<()> {
        self.get_mut(identity)?.value = value;
        Ok(())
    }

    pub fn set_fault_direction(
        &mut self,
        identity: &str,
        direction: Option<FaultDirection>,
    ) -> Result<()> {
        self.get_mut(identity)?.fault_direction = direction;
        Ok(())
    }

    /// Drop the direction tag of every listed sensor; unknown identities are skipped.
    pub fn clear_fault_directions<'a>(&mut self, identities: impl IntoIterator<Item = &'a String>) {
        for identity in identities {
            if let Some(state) = self.states.get_mut(identity.as_str()) {
                state.fault_direction = None;
            }
        }
    }

    /// States in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SensorState)> {
        self.states.iter().map(|(id, state)| (id.as_str(), state))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
