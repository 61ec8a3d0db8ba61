//! DNI Fetcher CLI application
//!
//! Command-line interface for filling missing identity-document fields from
//! public lookup pages, with a shared request budget and progress tracking.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use dni_fetcher::cli::{handle_init_config, handle_run, Cli};
use dni_fetcher::config::AppConfig;
use dni_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    if cli.global.init_config {
        return handle_init_config(cli.global.config.clone()).await;
    }

    let config = AppConfig::load(cli.global.config.clone()).await?;
    init_logging(&cli, cli.log_level_or(config.logging.tracing_level()));

    info!("DNI Fetcher v{} starting", env!("CARGO_PKG_VERSION"));
    handle_run(cli, config).await
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli, log_level: tracing::Level) {
    let mut filter = EnvFilter::from_default_env();
    match format!("dni_fetcher={}", log_level).parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring invalid log directive: {}", e),
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
