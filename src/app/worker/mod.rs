//! Lookup worker system
//!
//! Workers share one [`LookupServices`] bundle (session manager, fetcher,
//! extraction pipeline, rate gate and retry policy) and one work queue, but
//! each owns its own session.
//!
//! # Module Organization
//!
//! - [`config`] - Worker count and pacing
//! - [`types`] - Worker state machine and reports
//! - [`core`] - Individual worker with the per-identifier retry loop
//! - [`pool`] - Spawning and joining workers

pub mod config;
pub mod core;
pub mod pool;
pub mod types;

use std::sync::Arc;

use crate::app::endpoint::EndpointProfile;
use crate::app::extraction::ExtractionPipeline;
use crate::app::fetcher::Fetcher;
use crate::app::rate_gate::{RateGate, RateGateConfig};
use crate::app::retry::RetryPolicy;
use crate::app::session::{SessionConfig, SessionManager};
use crate::errors::ConfigError;

pub use config::WorkerConfig;
pub use self::core::LookupWorker;
pub use pool::{PoolState, WorkerExit, WorkerPool};
pub use types::{WorkerReport, WorkerState};

/// Components every worker uses
#[derive(Debug)]
pub struct LookupServices {
    pub gate: Arc<RateGate>,
    pub sessions: SessionManager,
    pub fetcher: Fetcher,
    pub pipeline: ExtractionPipeline,
    pub retry: RetryPolicy,
}

impl LookupServices {
    /// Wire the services for one endpoint profile with a fresh rate gate
    pub fn new(
        profile: EndpointProfile,
        gate: RateGateConfig,
        session: SessionConfig,
        retry: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        let profile = Arc::new(profile);
        let gate = Arc::new(RateGate::new(gate)?);
        Ok(Self {
            sessions: SessionManager::new(Arc::clone(&profile), Arc::clone(&gate), session)?,
            pipeline: ExtractionPipeline::for_variant(profile.variant)?,
            fetcher: Fetcher::new(profile),
            gate,
            retry,
        })
    }
}
