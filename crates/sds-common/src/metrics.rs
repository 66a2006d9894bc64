//! ---
//! sds_section: "01-core-functionality"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Shared primitives and utilities for the publisher runtime."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::time::duration_to_micros;

/// Running jitter statistics, kept incrementally so long runs stay O(1) in memory.
#[derive(Debug, Default, Clone)]
pub struct JitterStats {
    count: u64,
    mean_us: f64,
    m2: f64,
    min_us: u64,
    max_us: u64,
}

impl JitterStats {
    pub fn record(&mut self, jitter: Duration) {
        let micros = duration_to_micros(jitter);
        let value = micros as f64;
        self.count += 1;
        if self.count == 1 {
            self.min_us = micros;
            self.max_us = micros;
        } else {
            self.min_us = self.min_us.min(micros);
            self.max_us = self.max_us.max(micros);
        }
        // Welford update.
        let delta = value - self.mean_us;
        self.mean_us += delta / self.count as f64;
        self.m2 += delta * (value - self.mean_us);
    }

    pub fn summary(&self) -> Option<JitterSummary> {
        if self.count == 0 {
            return None;
        }
        let variance = if self.count > 1 {
            self.m2 / (self.count - 1) as f64
        } else {
            0.0
        };
        Some(JitterSummary {
            mean_us: self.mean_us,
            std_dev_us: variance.sqrt(),
            min_us: self.min_us,
            max_us: self.max_us,
            samples: self.count,
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JitterSummary {
    pub mean_us: f64,
    pub std_dev_us: f64,
    pub min_us: u64,
    pub max_us: u64,
    pub samples: u64,
}

/// Measures tick spacing against the configured period.
#[derive(Debug)]
pub struct LoopTimingReporter {
    target_interval: Duration,
    last_tick: Option<Instant>,
    stats: JitterStats,
}

impl LoopTimingReporter {
    pub fn new(target_interval: Duration) -> Self {
        Self {
            target_interval,
            last_tick: None,
            stats: JitterStats::default(),
        }
    }

    pub fn record_tick(&mut self) {
        self.record_tick_at(Instant::now());
    }

    pub fn record_tick_at(&mut self, now: Instant) {
        if let Some(previous) = self.last_tick {
            let actual = now.saturating_duration_since(previous);
            let jitter = if actual > self.target_interval {
                actual - self.target_interval
            } else {
                self.target_interval - actual
            };
            self.stats.record(jitter);
        }
        self.last_tick = Some(now);
    }

    pub fn summary(&self) -> Option<JitterSummary> {
        self.stats.summary()
    }
}
