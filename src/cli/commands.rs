//! Command handler for DNI Fetcher CLI
//!
//! Connects CLI flags, the configuration file and the environment to a
//! coordinator run against the PostgreSQL store.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, warn};

use crate::app::{
    Coordinator, CoordinatorConfig, DatabaseConfig, Field, FieldRecord, MemoryStore, PgStore,
    RunSummary, SignalHandler,
};
use crate::cli::Cli;
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Handle `--init-config`
///
/// Writes the commented defaults to `path`, or to the per-user config file
/// when no path is given. An existing file is never overwritten.
pub async fn handle_init_config(path: Option<PathBuf>) -> Result<()> {
    let config_path = match path.or_else(AppConfig::default_config_path) {
        Some(path) => path,
        None => {
            return Err(AppError::generic(
                "Could not determine the user configuration directory; pass --config",
            ))
        }
    };

    if AppConfig::write_default_config(&config_path).await? {
        println!("📁 Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   You can customize settings by editing this file.");
    } else {
        println!("Configuration file already exists: {}", config_path.display());
    }
    Ok(())
}

/// Handle a lookup run
///
/// Applies CLI overrides to the loaded configuration, connects to the
/// database, runs the batch and prints the summary. With `--dry-run` the
/// lookups still happen but results go to memory and are printed instead of
/// written.
pub async fn handle_run(cli: Cli, app_config: AppConfig) -> Result<()> {
    let start_time = Instant::now();
    cli.run.validate().map_err(AppError::generic)?;

    let mut config = cli.run.apply_to(app_config.to_runtime_config());
    if cli.global.quiet {
        config = config.with_progress(false);
    }
    info!(
        "Starting {} lookups with {} workers",
        config.variant.as_str(),
        config.worker.worker_count
    );

    let db_config = DatabaseConfig::from_env()?;
    let store = PgStore::connect(&db_config, config.variant).await?;

    let coordinator = Coordinator::new(config.clone());
    let signals = SignalHandler::new(coordinator.cancellation_token()).setup();

    let summary = if cli.run.dry_run {
        println!("Dry run - results will not be written to the database");
        let sink = MemoryStore::new();
        let summary = coordinator.run(&store, sink.clone()).await;
        print_records(&config, &sink.written().await);
        summary
    } else {
        coordinator.run(&store, store.clone()).await
    };
    signals.abort();
    let summary = summary?;

    print_summary(&summary);
    info!("Run completed in {:?}", start_time.elapsed());
    if summary.cancelled {
        warn!("Run was interrupted before finishing");
    }
    Ok(())
}

fn print_records(config: &CoordinatorConfig, records: &[FieldRecord]) {
    let variant = config.variant;
    for record in records {
        let values: Vec<String> = variant
            .fields_of_interest()
            .iter()
            .chain(variant.optional_fields())
            .map(|field: &Field| format!("{}={}", field.column(), record.get(*field)))
            .collect();
        println!("  {} {}", record.identifier, values.join(" "));
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("📋 Lookup Summary");
    println!("=================");
    println!("{}", summary);
    if summary.total > 0 {
        println!("Success rate: {:.1}%", summary.success_rate());
    }
    for (category, count) in &summary.failures_by_category {
        println!("  {:<20} {}", category, count);
    }
    if summary.sink_errors > 0 {
        println!("⚠️  {} records could not be saved", summary.sink_errors);
    }
    if summary.workers_without_session > 0 {
        println!(
            "⚠️  {} of {} workers could not establish a session",
            summary.workers_without_session, summary.workers_started
        );
    }
}
