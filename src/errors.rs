//! Error types for DNI Fetcher
//!
//! Per-identifier failures are described by [`LookupError`], which the retry
//! policy classifies as transient or fatal. Startup failures (configuration,
//! datastore) surface as [`AppError`] and terminate the process.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single identifier lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Identifier is not exactly eight ASCII digits
    #[error("Invalid identifier '{identifier}': expected 8 digits")]
    InvalidInput { identifier: String },

    /// The lookup page did not yield a session token
    #[error("Session token unavailable: {reason}")]
    TokenUnavailable { reason: String },

    /// Endpoint signalled too many requests
    #[error("Rate limited by endpoint")]
    RateLimited,

    /// Endpoint refused the session (HTTP 403 or literal "-1" body)
    #[error("Access denied by endpoint")]
    AccessDenied,

    /// Endpoint has no record for the identifier (HTTP 404 or literal "0" body)
    #[error("No record exists for identifier")]
    NotFound,

    /// Endpoint answered with an error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Network-level failure (connect, timeout, body read)
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Endpoint answered but rejected the query
    #[error("Lookup rejected by endpoint: {message}")]
    EndpointRejected { message: String },

    /// Every extraction strategy came up empty
    #[error("No data found in response")]
    NoDataFound,

    /// Retry ceiling reached; carries the last underlying cause
    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<LookupError>,
    },

    /// No worker managed to establish a session
    #[error("No worker could establish a session")]
    SessionUnavailable,

    /// Run was cancelled before the identifier finished
    #[error("Lookup cancelled")]
    Cancelled,

    /// The worker processing the identifier terminated unexpectedly
    #[error("Worker {worker_id} terminated before reporting a result")]
    WorkerLost { worker_id: u32 },
}

impl LookupError {
    /// Build a transport error from a reqwest failure
    pub fn transport(error: &reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            format!("request timed out ({})", error)
        } else if error.is_connect() {
            format!("connection failed ({})", error)
        } else {
            error.to_string()
        };
        Self::Transport { message }
    }

    /// Map an HTTP error status onto the taxonomy
    ///
    /// 419 (expired CSRF token) and 401 mean the session token went stale.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            403 => Self::AccessDenied,
            404 => Self::NotFound,
            419 | 401 => Self::TokenUnavailable {
                reason: format!("HTTP {}", status),
            },
            status => Self::ServerError { status },
        }
    }

    /// The innermost cause, unwrapping retry exhaustion
    pub fn root_cause(&self) -> &LookupError {
        match self {
            LookupError::RetriesExhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }

    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LookupError::Transport { .. }
            | LookupError::RateLimited
            | LookupError::AccessDenied
            | LookupError::TokenUnavailable { .. } => true,
            LookupError::ServerError { status } => *status >= 500,
            _ => false,
        }
    }

    /// Whether retrying is pointless
    pub fn is_fatal(&self) -> bool {
        !self.is_transient()
    }

    /// Short machine-friendly category for logging and tallies
    pub fn category(&self) -> &'static str {
        match self {
            LookupError::InvalidInput { .. } => "invalid_input",
            LookupError::TokenUnavailable { .. } => "token_unavailable",
            LookupError::RateLimited => "rate_limited",
            LookupError::AccessDenied => "access_denied",
            LookupError::NotFound => "not_found",
            LookupError::ServerError { .. } => "server_error",
            LookupError::Transport { .. } => "transport",
            LookupError::EndpointRejected { .. } => "rejected",
            LookupError::NoDataFound => "no_data",
            LookupError::RetriesExhausted { .. } => "retries_exhausted",
            LookupError::SessionUnavailable => "session_unavailable",
            LookupError::Cancelled => "cancelled",
            LookupError::WorkerLost { .. } => "worker_lost",
        }
    }
}

/// Datastore errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not connect to the datastore
    #[error("Database connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    /// Query for pending identifiers failed
    #[error("Database query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Writing a completed record failed
    #[error("Failed to write record for {identifier}: {reason}")]
    Write { identifier: String, reason: String },

    /// A record carried a value the datastore cannot accept
    #[error("Invalid value for column {column}: {value}")]
    InvalidValue { column: String, value: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Missing required configuration field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    /// Datastore error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Lookup error escaping the worker pool (startup only)
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Store(_) => "store",
            AppError::Config(_) => "config",
            AppError::Lookup(_) => "lookup",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Lookup result type alias
pub type LookupResult<T> = std::result::Result<T, LookupError>;

/// Store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Describe a wait for log output, e.g. "1m 30s"
pub(crate) fn describe_wait(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
