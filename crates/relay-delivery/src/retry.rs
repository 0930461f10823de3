//! Per-call retry policy for the HTTP transport.
//!
//! Retries belong to the transport: the fan-out issues one logical delivery
//! per endpoint and the transport decides how many physical attempts that
//! delivery takes. Delays use backoff with jitter so endpoints that share an
//! outage are not hammered in lockstep.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

/// Retry policy for a single delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,

    /// Base delay for backoff calculation.
    pub base_delay: Duration,

    /// Maximum delay between attempts.
    pub max_delay: Duration,

    /// Jitter percentage (0.0 to 1.0) to add randomness.
    pub jitter_factor: f64,

    /// Strategy for calculating backoff delays.
    pub backoff_strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.25,
            backoff_strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Total attempts this policy allows, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Decides whether a failed attempt should be retried and after what
    /// delay.
    ///
    /// `attempt_number` is 1-based and refers to the attempt that just
    /// failed.
    pub fn decide(&self, attempt_number: u32, error: &DeliveryError) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::GiveUp { reason: format!("non-retryable error: {error}") };
        }

        if attempt_number >= self.max_attempts() {
            return RetryDecision::GiveUp {
                reason: format!("maximum attempts ({}) exceeded", self.max_attempts()),
            };
        }

        RetryDecision::Retry { delay: self.calculate_delay(attempt_number, error) }
    }

    /// Calculates the wait before the attempt following `attempt_number`.
    ///
    /// A Retry-After hint from the endpoint replaces the backoff but is still
    /// capped at `max_delay`.
    fn calculate_delay(&self, attempt_number: u32, error: &DeliveryError) -> Duration {
        if let Some(retry_after_seconds) = error.retry_after_seconds() {
            return std::cmp::min(Duration::from_secs(retry_after_seconds), self.max_delay);
        }

        let base_delay = match self.backoff_strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear => self.base_delay * attempt_number.max(1),
            BackoffStrategy::Exponential => {
                let exponent = attempt_number.saturating_sub(1).min(20);
                self.base_delay * 2_u32.saturating_pow(exponent)
            },
        };

        let capped_delay = std::cmp::min(base_delay, self.max_delay);

        std::cmp::min(apply_jitter(capped_delay, self.jitter_factor), self.max_delay)
    }
}

/// Strategy for calculating retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed,
    /// Delay doubles each attempt.
    Exponential,
    /// Delay grows by the base amount each attempt.
    Linear,
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the delay.
    Retry {
        /// How long to wait before the next attempt
        delay: Duration,
    },
    /// Stop; the last failure is final.
    GiveUp {
        /// Why no further attempt is made
        reason: String,
    },
}

/// Randomizes a delay by ±`jitter_factor`.
fn apply_jitter(duration: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 || duration.is_zero() {
        return duration;
    }

    let clamped_jitter = jitter_factor.clamp(0.0, 1.0);

    let mut rng = rand::rng();
    let jitter_range = duration.as_secs_f64() * clamped_jitter;
    let jitter_offset = rng.random_range(-jitter_range..=jitter_range);

    Duration::from_secs_f64((duration.as_secs_f64() + jitter_offset).max(0.0))
}
