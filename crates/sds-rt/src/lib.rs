//! ---
//! sds_section: "01-core-functionality"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Runtime helpers supporting the tick loop."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
//! Fixed-cadence scheduling helpers for the publisher tick loop.

pub mod scheduling;

pub use scheduling::{period_from_secs, RateLimiter, RtError};
