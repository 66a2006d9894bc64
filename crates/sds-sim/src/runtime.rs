//! ---
//! sds_section: "11-simulation"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Synthetic telemetry engine."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
//! Fixed-cadence tick loop.
//!
//! Ticks run strictly one after another. Cancellation is only observed while waiting
//! for the next slot, so a shutdown never interrupts a tick half way. The transport is
//! closed on every exit path.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use sds_common::config::PublisherConfig;
use sds_common::time::offset_by_secs;
use sds_common::{JitterSummary, LoopTimingReporter};
use sds_rt::RateLimiter;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::emitter::ReadingEmitter;
use crate::errors::Result;
use crate::fault::FaultTransition;
use crate::generator::SensorGenerator;
use crate::random::RandomSource;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub interval: Duration,
    /// Log a progress line every this many messages; `0` disables it.
    pub progress_every: u64,
    /// Stop after this many ticks; run until shutdown when `None`.
    pub max_ticks: Option<u64>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&PublisherConfig::default())
    }
}

impl RunSettings {
    pub fn from_config(config: &PublisherConfig) -> Self {
        Self {
            interval: config.interval,
            progress_every: config.progress_every,
            max_ticks: config.max_ticks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Shutdown,
    TickBudget,
}

/// Work done by a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub messages_published: u64,
    pub faults_started: u64,
    pub faults_cleared: u64,
    pub stop: StopReason,
    pub jitter: Option<JitterSummary>,
}

/// Drive `generator` at `settings.interval` until `shutdown` resolves or the tick
/// budget is spent, publishing one reading per tick through `emitter`.
///
/// Tick timestamps are the wall-clock start of the run offset by monotonic elapsed
/// time, so clock adjustments never reorder readings.
pub async fn run<R, F>(
    generator: &mut SensorGenerator<R>,
    emitter: &mut ReadingEmitter,
    settings: &RunSettings,
    shutdown: F,
) -> Result<RunSummary>
where
    R: RandomSource,
    F: Future<Output = ()>,
{
    info!(
        sensors = generator.catalog().len(),
        machines = generator.catalog().machine_count(),
        queue = emitter.queue(),
        transport = emitter.transport_name(),
        interval_ms = settings.interval.as_millis() as u64,
        "telemetry loop starting"
    );
    let outcome = drive(generator, emitter, settings, shutdown).await;
    let closed = emitter.close().await;

    let summary = match (outcome, closed) {
        (Ok(summary), Ok(())) => summary,
        (Ok(_), Err(err)) => return Err(err),
        (Err(err), closed) => {
            if let Err(close_err) = closed {
                warn!(error = %close_err, "transport close failed after loop error");
            }
            error!(error = %err, published = emitter.published(), "telemetry loop aborted");
            return Err(err);
        }
    };

    info!(
        ticks = summary.ticks,
        messages_published = summary.messages_published,
        faults_started = summary.faults_started,
        faults_cleared = summary.faults_cleared,
        stop = ?summary.stop,
        "telemetry loop finished"
    );
    if let Some(jitter) = &summary.jitter {
        info!(
            mean_us = jitter.mean_us,
            std_dev_us = jitter.std_dev_us,
            max_us = jitter.max_us,
            samples = jitter.samples,
            "tick jitter"
        );
    }
    Ok(summary)
}

async fn drive<R, F>(
    generator: &mut SensorGenerator<R>,
    emitter: &mut ReadingEmitter,
    settings: &RunSettings,
    shutdown: F,
) -> Result<RunSummary>
where
    R: RandomSource,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut limiter = RateLimiter::new(settings.interval);
    let mut timing = LoopTimingReporter::new(settings.interval);
    let wall_origin = Utc::now();
    let mono_origin = tokio::time::Instant::now();
    let mut faults_started = 0;
    let mut faults_cleared = 0;

    let stop = loop {
        if settings.max_ticks.is_some_and(|max| generator.ticks() >= max) {
            break StopReason::TickBudget;
        }
        let slot = tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("shutdown requested");
                break StopReason::Shutdown;
            }
            slot = limiter.tick() => slot,
        };
        timing.record_tick_at(slot.into_std());

        let elapsed = slot.saturating_duration_since(mono_origin);
        let now = offset_by_secs(wall_origin, elapsed.as_secs_f64());
        let outcome = generator.tick(now);
        for transition in &outcome.transitions {
            match transition {
                FaultTransition::Started { .. } => faults_started += 1,
                FaultTransition::Cleared { .. } => faults_cleared += 1,
            }
        }
        emitter.emit(outcome.reading).await?;

        let published = emitter.published();
        if settings.progress_every > 0 && published % settings.progress_every == 0 {
            info!(published, active_fault = ?generator.faults().active().map(|e| &e.machine), "progress");
        }
    };

    Ok(RunSummary {
        ticks: generator.ticks(),
        messages_published: emitter.published(),
        faults_started,
        faults_cleared,
        stop,
        jitter: timing.summary(),
    })
}
