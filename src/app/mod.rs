//! Core application logic for DNI Fetcher
//!
//! This module contains the lookup pipeline: endpoint profiles, the shared
//! rate gate, per-worker sessions, fetching and field extraction, the retry
//! policy, the work queue and worker pool, the collector and the stores, all
//! tied together by the [`Coordinator`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use dni_fetcher::app::{ExtractionPipeline, Identifier, LookupVariant};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = ExtractionPipeline::for_variant(LookupVariant::FullName)?;
//! let identifier = Identifier::parse("12345678")?;
//! let record = pipeline.extract(r#"<input id="nombres" value="ANA">"#, &identifier)?;
//! println!("{:?}", record);
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod coordinator;
pub mod endpoint;
pub mod extraction;
pub mod fetcher;
pub mod models;
pub mod queue;
pub mod rate_gate;
pub mod retry;
pub mod session;
pub mod store;
pub mod worker;

// Re-export main public API
pub use collector::{Collector, CollectorTally};
pub use coordinator::{Coordinator, CoordinatorConfig, RunSummary, SignalHandler};
pub use endpoint::{EndpointProfile, LookupVariant, ResponseFormat, TokenLocation};
pub use extraction::{Document, ExtractionPipeline, Strategy};
pub use fetcher::Fetcher;
pub use models::{Field, FieldRecord, Identifier, LookupOutcome};
pub use queue::{QueueStats, Unfinished, WorkQueue};
pub use rate_gate::{RateGate, RateGateConfig, RateGateStats};
pub use retry::{RetryDecision, RetryPolicy};
pub use session::{Session, SessionConfig, SessionManager};
pub use store::{DatabaseConfig, MemoryStore, PendingSource, PgStore, RecordSink};
pub use worker::{LookupServices, WorkerConfig, WorkerPool, WorkerReport};
