//! Command-line argument parsing for DNI Fetcher
//!
//! The tool has a single action: process the pending identifiers of one
//! lookup variant. Every flag is optional and overrides the configuration
//! file.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::app::{CoordinatorConfig, LookupVariant};

/// DNI Fetcher - Enrich identity records from public lookup pages
#[derive(Parser, Debug)]
#[command(
    name = "dni_fetcher",
    version,
    about = "Fill missing identity-document fields from public lookup pages",
    long_about = "Reads identifiers that still lack data from the database, looks each one up
with a small pool of workers under a shared request budget, and writes the extracted fields back."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Run options
    #[command(flatten)]
    pub run: RunArgs,
}

/// Logging and configuration options
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write a default configuration file (to --config or the user config dir) and exit
    #[arg(long)]
    pub init_config: bool,
}

/// Options for a lookup run
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Which lookup to perform
    #[arg(long, value_enum)]
    pub variant: Option<LookupVariant>,

    /// Number of concurrent lookup workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Maximum number of identifiers to process
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Perform lookups but print results instead of writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        self.log_level_or(tracing::Level::WARN)
    }

    /// Logging level, using `configured` when no verbosity flag is given
    pub fn log_level_or(&self, configured: tracing::Level) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            configured
        }
    }
}

impl RunArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }
        if self.limit == Some(0) {
            return Err("Limit must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Apply flag overrides on top of file configuration
    pub fn apply_to(&self, mut config: CoordinatorConfig) -> CoordinatorConfig {
        if let Some(variant) = self.variant {
            config = config.with_variant(variant);
        }
        if let Some(workers) = self.workers {
            config = config.with_worker_count(workers);
        }
        if let Some(limit) = self.limit {
            config = config.with_limit(limit);
        }
        if self.no_progress {
            config = config.with_progress(false);
        }
        config
    }
}
