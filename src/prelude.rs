//! Prelude module for DNI Fetcher Library
//!
//! Re-exports the items needed for a typical embedding with a single
//! `use dni_fetcher::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dni_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let store = PgStore::connect(&DatabaseConfig::from_env()?, LookupVariant::BirthDate).await?;
//!     let config = CoordinatorConfig::default().with_variant(LookupVariant::BirthDate);
//!     let summary = Coordinator::new(config).run(&store, store.clone()).await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, LookupError, Result};

// Orchestration
pub use crate::app::{Coordinator, CoordinatorConfig, RunSummary};

// Data types
pub use crate::app::{Field, FieldRecord, Identifier, LookupOutcome, LookupVariant};

// Stores
pub use crate::app::{DatabaseConfig, MemoryStore, PendingSource, PgStore, RecordSink};

// Tunables
pub use crate::app::{RateGateConfig, RetryPolicy, SessionConfig, WorkerConfig};
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{DEFAULT_WORKER_COUNT, MAX_REQUESTS_PER_WINDOW, WINDOW};

pub use std::sync::Arc;

pub use tokio;
