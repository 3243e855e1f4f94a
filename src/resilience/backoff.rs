//! Exponential backoff with multiplicative jitter.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use crate::config::schema::BackoffConfig;

/// Rejected backoff parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackoffError {
    #[error("base delay must be greater than zero")]
    ZeroBaseDelay,

    #[error("base delay {base:?} exceeds max delay {max:?}")]
    BaseExceedsMax { base: Duration, max: Duration },

    #[error("jitter fraction {0} is outside [0, 1]")]
    InvalidJitter(f64),

    #[error("max attempts must be at least 1 (use None for unlimited)")]
    ZeroAttempts,
}

/// Retry delay policy. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    jitter_fraction: f64,
}

impl BackoffPolicy {
    /// Build a policy, rejecting malformed parameters up front.
    ///
    /// `max_attempts = None` retries forever.
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
        max_attempts: Option<u32>,
        jitter_fraction: f64,
    ) -> Result<Self, BackoffError> {
        if base_delay.is_zero() {
            return Err(BackoffError::ZeroBaseDelay);
        }
        if base_delay > max_delay {
            return Err(BackoffError::BaseExceedsMax {
                base: base_delay,
                max: max_delay,
            });
        }
        if !jitter_fraction.is_finite() || !(0.0..=1.0).contains(&jitter_fraction) {
            return Err(BackoffError::InvalidJitter(jitter_fraction));
        }
        if max_attempts == Some(0) {
            return Err(BackoffError::ZeroAttempts);
        }

        Ok(Self {
            base_delay,
            max_delay,
            max_attempts,
            jitter_fraction,
        })
    }

    pub fn from_config(config: &BackoffConfig) -> Result<Self, BackoffError> {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            match config.max_attempts {
                0 => None,
                n => Some(n),
            },
            config.jitter_fraction,
        )
    }

    /// Capped exponential delay for `attempt` (1-indexed), before jitter.
    pub fn ceiling_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay to sleep after failed attempt number `attempt`.
    ///
    /// Jitter scales the ceiling by a factor in `[1 - j, 1 + j]`; the result
    /// never exceeds `max_delay`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling_for(attempt);
        if self.jitter_fraction == 0.0 {
            return ceiling;
        }

        let low = 1.0 - self.jitter_fraction;
        let high = 1.0 + self.jitter_fraction;
        let factor = rand::thread_rng().gen_range(low..=high);

        ceiling.mul_f64(factor).min(self.max_delay)
    }

    /// True once `attempts` failures have used up the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts >= max,
            None => false,
        }
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            max_attempts: Some(5),
            jitter_fraction: 0.2,
        }
    }
}
