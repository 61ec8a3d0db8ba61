//! Pending-identifier source and result sink
//!
//! The coordinator reads the identifiers that still lack data from a
//! [`PendingSource`]; the collector writes completed records to a
//! [`RecordSink`]. Writes are idempotent overwrites, so re-running a batch
//! is harmless.

pub mod memory;
pub mod postgres;

use std::future::Future;

use crate::app::endpoint::LookupVariant;
use crate::app::models::FieldRecord;
use crate::errors::StoreResult;

pub use memory::MemoryStore;
pub use postgres::{DatabaseConfig, PgStore};

/// Supplies identifiers that still need a lookup
pub trait PendingSource: Send + Sync {
    /// Identifiers missing the variant's fields, in stable order
    fn pending(&self, variant: LookupVariant)
        -> impl Future<Output = StoreResult<Vec<String>>> + Send;
}

/// Persists completed records
pub trait RecordSink: Send + Sync {
    /// Write the filled fields of a record
    fn update(&self, record: &FieldRecord) -> impl Future<Output = StoreResult<()>> + Send;
}
