//! ---
//! sds_section: "01-core-functionality"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Shared primitives and utilities for the publisher runtime."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
//! Core shared primitives for the synthetic sensor data workspace.
//! This crate exposes configuration loading, logging, loop timing, and
//! time helpers consumed by the engine, transports, and binaries.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod time;

pub use config::{
    AppConfig, FaultProfile, LoggingConfig, PublisherConfig, SimulationConfig, SpanConfig,
    TransportConfig, TransportKind,
};
pub use logging::{init_tracing, LogFormat};
pub use metrics::{JitterStats, JitterSummary, LoopTimingReporter};
