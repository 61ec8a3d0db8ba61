//! Worker configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::workers;

/// Configuration for lookup workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrent workers to spawn
    pub worker_count: usize,
    /// Base pause between two lookups of the same worker (zero disables pacing)
    #[serde(with = "humantime_serde")]
    pub pacing_interval: Duration,
    /// Additional pause per worker id, so workers drift apart
    #[serde(with = "humantime_serde")]
    pub pacing_stagger: Duration,
    /// Upper bound of the random jitter added to each pacing wait
    #[serde(with = "humantime_serde")]
    pub pacing_jitter: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: workers::DEFAULT_WORKER_COUNT,
            pacing_interval: workers::PACING_INTERVAL,
            pacing_stagger: workers::PACING_STAGGER,
            pacing_jitter: workers::PACING_JITTER,
        }
    }
}

impl WorkerConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("Worker count must be greater than 0".to_string());
        }
        if self.worker_count > workers::MAX_WORKER_COUNT {
            return Err(format!(
                "Worker count cannot exceed {}",
                workers::MAX_WORKER_COUNT
            ));
        }
        Ok(())
    }

    /// Pause between lookups for a given worker, `None` when pacing is off
    pub fn pacing_for(&self, worker_id: u32) -> Option<Duration> {
        if self.pacing_interval.is_zero() {
            return None;
        }
        Some(
            self.pacing_interval
                .saturating_add(self.pacing_stagger.saturating_mul(worker_id)),
        )
    }

    /// No pacing at all, for runs against local endpoints
    pub fn unpaced(worker_count: usize) -> Self {
        Self {
            worker_count,
            pacing_interval: Duration::ZERO,
            pacing_stagger: Duration::ZERO,
            pacing_jitter: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker_count, workers::DEFAULT_WORKER_COUNT);
    }

    #[test]
    fn test_validation_bounds() {
        assert!(WorkerConfig::unpaced(0).validate().is_err());
        assert!(WorkerConfig::unpaced(workers::MAX_WORKER_COUNT + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_pacing_staggered_by_worker() {
        let config = WorkerConfig::default();
        assert_eq!(config.pacing_for(0), Some(Duration::from_secs(5)));
        assert_eq!(config.pacing_for(2), Some(Duration::from_secs(9)));
        assert_eq!(WorkerConfig::unpaced(2).pacing_for(1), None);
    }
}
