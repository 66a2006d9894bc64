//! ---
//! sds_section: "01-core-functionality"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Shared primitives and utilities for the publisher runtime."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

/// Convert a duration into microseconds, saturating at `u64::MAX`.
pub fn duration_to_micros(duration: Duration) -> u64 {
    duration
        .as_secs()
        .saturating_mul(1_000_000)
        .saturating_add(u64::from(duration.subsec_micros()))
}

/// Signed seconds elapsed from `earlier` to `later`, with microsecond resolution.
pub fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later.signed_duration_since(earlier);
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Offset `origin` by a fractional number of seconds.
pub fn offset_by_secs(origin: DateTime<Utc>, secs: f64) -> DateTime<Utc> {
    let micros = (secs * 1_000_000.0).round() as i64;
    origin + chrono::Duration::microseconds(micros)
}

/// ISO-8601 UTC rendering used on the wire, e.g. `2024-05-01T12:00:00.250000Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
