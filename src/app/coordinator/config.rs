//! Coordinator configuration

use serde::{Deserialize, Serialize};

use crate::app::endpoint::LookupVariant;
use crate::app::rate_gate::RateGateConfig;
use crate::app::retry::RetryPolicy;
use crate::app::session::SessionConfig;
use crate::app::worker::WorkerConfig;
use crate::constants::coordinator;

/// Everything a lookup run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub variant: LookupVariant,
    /// Host override for the variant's endpoint
    pub base_url: Option<String>,
    /// Process at most this many pending identifiers
    pub limit: Option<usize>,
    /// Capacity of the worker-to-collector channel
    pub result_buffer: usize,
    /// Show a progress bar while running
    pub show_progress: bool,
    pub rate: RateGateConfig,
    pub session: SessionConfig,
    pub worker: WorkerConfig,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            variant: LookupVariant::default(),
            base_url: None,
            limit: None,
            result_buffer: coordinator::RESULT_CHANNEL_CAPACITY,
            show_progress: true,
            rate: RateGateConfig::default(),
            session: SessionConfig::default(),
            worker: WorkerConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_variant(mut self, variant: LookupVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker.worker_count = worker_count;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Validate every section, collecting all problems
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.result_buffer == 0 {
            errors.push("result_buffer must be greater than 0".to_string());
        }
        for (section, result) in [
            ("rate", self.rate.validate()),
            ("session", self.session.validate()),
            ("worker", self.worker.validate()),
            ("retry", self.retry.validate()),
        ] {
            if let Err(e) = result {
                errors.push(format!("{}: {}", section, e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
