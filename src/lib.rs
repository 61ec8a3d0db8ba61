//! DNI Fetcher Library
//!
//! A Rust library for enriching identity-document records from public lookup
//! pages. Provides concurrent lookups under a strict shared request budget,
//! with per-worker sessions, layered field extraction and idempotent writes.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
