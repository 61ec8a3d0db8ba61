//! Global request admission
//!
//! Every outgoing request, token page loads included, passes
//! [`RateGate::admit`]. The gate enforces two limits shared by all workers:
//! at most `max_per_window` admissions in any rolling window, and a minimum
//! delay between any two admissions.
//!
//! Admission reserves a time slot while holding the lock and then sleeps
//! until that slot without it, so one worker waiting out the window never
//! blocks another from reserving the following slot.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::constants::limits;
use crate::errors::{describe_wait, ConfigError};

/// Limits enforced by the gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateGateConfig {
    /// Admissions allowed in any rolling window
    pub max_per_window: u32,
    /// Length of the rolling window
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Minimum delay between two consecutive admissions
    #[serde(with = "humantime_serde")]
    pub min_interval: Duration,
    /// Added to the wait when the window quota is exhausted
    #[serde(with = "humantime_serde")]
    pub safety_margin: Duration,
}

impl Default for RateGateConfig {
    fn default() -> Self {
        Self {
            max_per_window: limits::MAX_REQUESTS_PER_WINDOW,
            window: limits::WINDOW,
            min_interval: limits::MIN_INTERVAL,
            safety_margin: limits::SAFETY_MARGIN,
        }
    }
}

impl RateGateConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_per_window == 0 {
            return Err("max_per_window must be greater than 0".to_string());
        }
        if self.window.is_zero() {
            return Err("window must be greater than 0".to_string());
        }
        if self.min_interval > self.window {
            return Err("min_interval cannot exceed window".to_string());
        }
        Ok(())
    }
}

/// Shared admission state
///
/// `recent` holds the slots of the last `max_per_window` admissions in
/// ascending order.
#[derive(Debug)]
struct RateBudget {
    config: RateGateConfig,
    recent: VecDeque<Instant>,
    last: Option<Instant>,
    total_admitted: u64,
    total_waited: Duration,
}

impl RateBudget {
    fn new(config: RateGateConfig) -> Self {
        Self {
            recent: VecDeque::with_capacity(config.max_per_window as usize + 1),
            config,
            last: None,
            total_admitted: 0,
            total_waited: Duration::ZERO,
        }
    }

    /// Reserve the earliest slot at or after `now` that keeps both limits
    fn reserve(&mut self, now: Instant) -> Instant {
        let max = self.config.max_per_window as usize;
        let mut slot = now;

        if let Some(last) = self.last {
            slot = slot.max(last + self.config.min_interval);
        }
        if self.recent.len() >= max {
            let window_start = self.recent[self.recent.len() - max];
            slot = slot.max(window_start + self.config.window + self.config.safety_margin);
        }

        self.recent.push_back(slot);
        while self.recent.len() > max {
            self.recent.pop_front();
        }
        self.last = Some(slot);
        self.total_admitted += 1;
        self.total_waited += slot.saturating_duration_since(now);
        slot
    }

    /// Admissions inside the window ending at `now`
    fn issued_in_window(&self, now: Instant) -> usize {
        self.recent
            .iter()
            .filter(|slot| now.saturating_duration_since(**slot) < self.config.window)
            .count()
    }
}

/// Snapshot of gate activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateGateStats {
    pub total_admitted: u64,
    pub total_waited: Duration,
}

/// Process-wide request gate shared by all workers
#[derive(Debug)]
pub struct RateGate {
    budget: Mutex<RateBudget>,
}

impl RateGate {
    /// Gate enforcing `config`; a zero budget or window is refused
    pub fn new(config: RateGateConfig) -> Result<Self, ConfigError> {
        config
            .validate()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "rate".to_string(),
                value: format!("{} per {:?}", config.max_per_window, config.window),
                reason,
            })?;
        Ok(Self {
            budget: Mutex::new(RateBudget::new(config)),
        })
    }

    /// Wait until one more request may be issued
    pub async fn admit(&self) {
        let now = Instant::now();
        let (slot, window_full, in_window) = {
            let mut budget = self.budget.lock().await;
            let full = budget.recent.len() >= budget.config.max_per_window as usize;
            let in_window = budget.issued_in_window(now);
            (budget.reserve(now), full, in_window)
        };

        let wait = slot.saturating_duration_since(now);
        if !wait.is_zero() {
            if window_full && wait >= Duration::from_secs(1) {
                info!("Request window exhausted, waiting {}", describe_wait(wait));
            } else {
                debug!(
                    "Rate gate delaying request by {:?} ({} in window)",
                    wait, in_window
                );
            }
            sleep_until(slot).await;
        }
    }

    pub async fn stats(&self) -> RateGateStats {
        let budget = self.budget.lock().await;
        RateGateStats {
            total_admitted: budget.total_admitted,
            total_waited: budget.total_waited,
        }
    }
}
