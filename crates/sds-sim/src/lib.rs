//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "01-bootstrap"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Synthetic telemetry engine module exports and shared types."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
//! Synthetic sensor telemetry for exercising monitoring pipelines without hardware.
//!
//! A [`LimitCatalog`] describes every sensor's operational range. The
//! [`SensorGenerator`] walks each sensor's target percentage, injects single-machine
//! fault episodes, and synthesizes a formatted value per sensor every tick. The
//! [`runtime`] module paces ticks and hands readings to a transport.

pub mod catalog;
pub mod drift;
pub mod emitter;
pub mod errors;
pub mod fault;
pub mod frames;
pub mod generator;
pub mod random;
pub mod runtime;
pub mod state;
pub mod synth;

pub use catalog::{split_identity, LimitCatalog, SensorSpec, UNKNOWN_MACHINE};
pub use drift::DriftModel;
pub use emitter::ReadingEmitter;
pub use errors::{Result, SimError};
pub use fault::{FaultController, FaultEpisode, FaultTransition};
pub use frames::Reading;
pub use generator::{SensorGenerator, TickOutcome};
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use runtime::{run, RunSettings, RunSummary, StopReason};
pub use state::{FaultDirection, SensorState, SensorStateStore};
pub use synth::{format_value, Synthesizer};
