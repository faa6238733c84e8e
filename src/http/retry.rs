//! Backoff policy: which statuses are transient and how long to wait between attempts.

use rand::Rng;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default number of retries after the first attempt.
pub const MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Default upper bound for any single wait.
pub const MAX_DELAY: Duration = Duration::from_secs(30);

/// Statuses worth retrying: rate limiting and transient server failures.
pub const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of the computed delay used as the random spread, in `0.0..=1.0`.
    pub jitter: f64,
    pub transient_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: INITIAL_DELAY,
            max_delay: MAX_DELAY,
            multiplier: 2.0,
            jitter: 0.1,
            transient_statuses: TRANSIENT_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn no_retries() -> Self {
        Self::default().with_max_retries(0)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total number of transport calls a single request may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::Config(format!(
                "retry jitter must be within 0.0..=1.0, got {}",
                self.jitter
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::Config(format!(
                "retry multiplier must be a finite number >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.max_delay < self.initial_delay {
            return Err(Error::Config(format!(
                "retry max delay ({:?}) is shorter than the initial delay ({:?})",
                self.max_delay, self.initial_delay
            )));
        }
        Ok(())
    }

    /// Returns true iff `status` is one of the transient statuses.
    pub fn should_retry(&self, status: u16) -> bool {
        self.transient_statuses.contains(&status)
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// A server-provided `retry_after` wins over the exponential schedule but is
    /// still capped at `max_delay`. Jitter only applies to the computed schedule.
    pub fn compute_delay(&self, attempt: u32, retry_after: Option<f64>) -> Duration {
        let max_secs = self.max_delay.as_secs_f64();

        if let Some(seconds) = retry_after {
            return Duration::from_secs_f64(seconds.clamp(0.0, max_secs));
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        // powi overflows to inf (or NaN for 0 * inf) on huge exponents
        let delay = if raw.is_finite() { raw.clamp(0.0, max_secs) } else { max_secs };

        let spread = delay * self.jitter;
        let jittered = if spread > 0.0 {
            delay + rand::rng().random_range(-spread..=spread)
        } else {
            delay
        };

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Parses a `Retry-After` header value in its numeric-seconds form.
///
/// HTTP-date values are not supported and yield `None`, as does anything negative
/// or non-finite.
pub fn parse_retry_after(value: &str) -> Option<f64> {
    let seconds: f64 = value.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}
