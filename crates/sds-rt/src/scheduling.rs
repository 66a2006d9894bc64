//! ---
//! sds_section: "01-core-functionality"
//! sds_subsection: "module"
//! sds_type: "source"
//! sds_scope: "code"
//! sds_description: "Runtime helpers supporting the tick loop."
//! sds_version: "v0.1.0"
//! sds_owner: "tbd"
//! ---
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RtError {
    #[error("tick period must be a positive, finite number of seconds (got {0})")]
    InvalidPeriod(f64),
}

/// Convert a user-supplied period in seconds into a [`Duration`].
pub fn period_from_secs(secs: f64) -> Result<Duration, RtError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(RtError::InvalidPeriod(secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| RtError::InvalidPeriod(secs))
}

/// Async rate limiter yielding one tick per period.
///
/// The first tick completes immediately. A tick that overruns its slot delays the
/// schedule instead of bursting to catch up, so ticks never overlap or bunch.
#[derive(Debug)]
pub struct RateLimiter {
    interval: tokio::time::Interval,
    ticks: u64,
}

impl RateLimiter {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, ticks: 0 }
    }

    /// Wait for the next slot. Cancel-safe, so it can sit in a `select!`.
    pub async fn tick(&mut self) -> Instant {
        let at = self.interval.tick().await;
        self.ticks += 1;
        trace!(tick = self.ticks, "rate limiter tick");
        at
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_from_secs_accepts_fractions() {
        assert_eq!(period_from_secs(0.5).unwrap(), Duration::from_millis(500));
        assert_eq!(period_from_secs(1.0).unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn period_from_secs_rejects_non_positive() {
        assert_eq!(period_from_secs(0.0), Err(RtError::InvalidPeriod(0.0)));
        assert!(period_from_secs(-1.0).is_err());
        assert!(period_from_secs(f64::NAN).is_err());
        assert!(period_from_secs(f64::INFINITY).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_follow_the_period() {
        let mut limiter = RateLimiter::new(Duration::from_secs(1));
        let first = limiter.tick().await;
        let second = limiter.tick().await;
        let third = limiter.tick().await;
        assert_eq!(second - first, Duration::from_secs(1));
        assert_eq!(third - second, Duration::from_secs(1));
        assert_eq!(limiter.ticks(), 3);
        assert_eq!(limiter.period(), Duration::from_secs(1));
    }
}
