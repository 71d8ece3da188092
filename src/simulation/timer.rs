//! Step wait and wall-clock providers.
//!
//! The step wait is the engine's only suspension point. [`TokioTimer`] yields
//! to the runtime for the (optionally scaled) nominal duration, so many
//! simulations make progress on a shared pool. Timestamps and durations come
//! from a separate [`Clock`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ValidationError;

/// Suspends a simulation for the length of a step.
#[async_trait]
pub trait StepTimer: Send + Sync {
    /// Waits for `nominal`, yielding to other tasks meanwhile.
    async fn wait(&self, nominal: Duration);
}

/// Sleeps on the tokio timer, scaling every nominal duration.
#[derive(Debug, Clone, Copy)]
pub struct TokioTimer {
    time_scale: f64,
}

impl TokioTimer {
    /// Real-time timer (scale 1.0).
    #[must_use]
    pub const fn real_time() -> Self {
        Self { time_scale: 1.0 }
    }

    /// Timer that multiplies every nominal duration by `time_scale`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTimeScale` for a negative or non-finite scale.
    pub fn scaled(time_scale: f64) -> Result<Self, ValidationError> {
        if !time_scale.is_finite() || time_scale < 0.0 {
            return Err(ValidationError::InvalidTimeScale { value: time_scale });
        }
        Ok(Self { time_scale })
    }

    /// The configured scale.
    #[must_use]
    pub const fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Duration actually slept for a step of length `nominal`.
    #[must_use]
    pub fn scaled_duration(&self, nominal: Duration) -> Duration {
        Duration::try_from_secs_f64(nominal.as_secs_f64() * self.time_scale).unwrap_or(Duration::MAX)
    }
}

impl Default for TokioTimer {
    fn default() -> Self {
        Self::real_time()
    }
}

#[async_trait]
impl StepTimer for TokioTimer {
    async fn wait(&self, nominal: Duration) {
        tokio::time::sleep(self.scaled_duration(nominal)).await;
    }
}

/// Skips the wait but still yields once to the scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateTimer;

#[async_trait]
impl StepTimer for ImmediateTimer {
    async fn wait(&self, _nominal: Duration) {
        tokio::task::yield_now().await;
    }
}

/// Source of wall-clock timestamps.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// System UTC clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Whole seconds between `start` and `end`, rounded; zero if `end < start`.
#[must_use]
pub fn elapsed_secs_rounded(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let ms = (end - start).num_milliseconds().max(0);
    let ms = u64::try_from(ms).unwrap_or(0);
    (ms + 500) / 1000
}
