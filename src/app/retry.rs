//! Retry classification and backoff
//!
//! Decides, per failed attempt, whether an identifier is retried, how long
//! the worker waits first, and whether the session must be replaced before
//! the next attempt. Delays grow monotonically with the attempt number; a
//! rate-limit response always waits at least as long as any other transient
//! failure at the same attempt.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::retry;
use crate::errors::LookupError;

/// Whether a failure is worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Transient,
    Fatal,
}

/// What the worker does after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, optionally rotate the session, then try again
    Retry { delay: Duration, rotate: bool },
    /// Report the failure as terminal
    GiveUp,
}

/// Retry ceiling and backoff parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per identifier, including the first
    pub max_attempts: u32,
    /// Delay before the first retry of a generic transient failure
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Growth factor between retries
    pub multiplier: u32,
    /// Cap for generic transient delays
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Fixed part of the wait after a rate-limit response
    #[serde(with = "humantime_serde")]
    pub rate_limit_cooldown: Duration,
    /// Per-attempt increment of the rate-limit wait
    #[serde(with = "humantime_serde")]
    pub rate_limit_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            base_delay: retry::BASE_DELAY,
            multiplier: retry::MULTIPLIER,
            max_delay: retry::MAX_DELAY,
            rate_limit_cooldown: retry::RATE_LIMIT_COOLDOWN,
            rate_limit_step: retry::RATE_LIMIT_STEP,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.multiplier == 0 {
            return Err("multiplier must be at least 1".to_string());
        }
        if self.max_delay < self.base_delay {
            return Err("max_delay cannot be shorter than base_delay".to_string());
        }
        Ok(())
    }

    /// Sort a failure into transient or fatal
    pub fn classify(&self, error: &LookupError) -> Classification {
        if error.is_fatal() {
            Classification::Fatal
        } else {
            Classification::Transient
        }
    }

    /// Failures that mean the session itself is no longer trusted
    pub fn requires_rotation(&self, error: &LookupError) -> bool {
        matches!(
            error,
            LookupError::RateLimited
                | LookupError::AccessDenied
                | LookupError::TokenUnavailable { .. }
        )
    }

    /// Wait before the attempt following failed attempt `attempt` (1-based)
    pub fn next_delay(&self, attempt: u32, error: &LookupError) -> Duration {
        let generic = self.generic_delay(attempt);
        if matches!(error, LookupError::RateLimited) {
            let step = self.rate_limit_step.saturating_mul(attempt);
            let cooldown = self.rate_limit_cooldown.saturating_add(step);
            cooldown.max(generic)
        } else {
            generic
        }
    }

    fn generic_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = (self.multiplier as u64).saturating_pow(exponent);
        let millis = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(millis.min(self.max_delay.as_millis() as u64))
    }

    /// Decide what follows failed attempt `attempt` (1-based)
    pub fn decide(&self, attempt: u32, error: &LookupError) -> RetryDecision {
        if self.classify(error) == Classification::Fatal || attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.next_delay(attempt, error),
            rotate: self.requires_rotation(error),
        }
    }

    /// Terminal error for a failure the policy gave up on
    pub fn terminal_error(&self, attempt: u32, error: LookupError) -> LookupError {
        if attempt > 1 && self.classify(&error) == Classification::Transient {
            LookupError::RetriesExhausted {
                attempts: attempt,
                last: Box::new(error),
            }
        } else {
            error
        }
    }
}
