//! Configuration management for DNI Fetcher
//!
//! Settings come from a TOML file with one section per component. Every
//! section is optional and falls back to the built-in defaults, so an empty
//! or missing file gives a working configuration. Durations use humantime
//! strings such as `"12s"` or `"1m"`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{
    CoordinatorConfig, LookupVariant, RateGateConfig, RetryPolicy, SessionConfig, WorkerConfig,
};
use crate::constants::{coordinator, files, limits, retry, session, workers};
use crate::errors::{AppError, ConfigError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Which endpoint to query
    pub endpoint: EndpointConfigToml,
    /// Shared request budget
    pub rate: RateGateConfig,
    /// Session rotation and HTTP timeouts
    pub session: SessionConfig,
    /// Worker count and pacing
    pub worker: WorkerConfig,
    /// Retry ceiling and backoff
    pub retry: RetryPolicy,
    /// Run-level settings
    pub coordinator: CoordinatorConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly endpoint selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfigToml {
    pub variant: LookupVariant,
    /// Alternative scheme and host for the variant's endpoint
    pub base_url: Option<String>,
}

/// TOML-friendly coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfigToml {
    /// Process at most this many pending identifiers
    pub limit: Option<usize>,
    /// Capacity of the worker-to-collector channel
    pub result_buffer: usize,
    /// Enable progress bar display
    pub enable_progress_bar: bool,
}

impl Default for CoordinatorConfigToml {
    fn default() -> Self {
        Self {
            limit: None,
            result_buffer: coordinator::RESULT_CHANNEL_CAPACITY,
            enable_progress_bar: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when no verbosity flag is given
    pub level: String,
}

impl LoggingConfig {
    /// Parsed level; unknown names fall back to WARN
    pub fn tracing_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::WARN)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Convert to the runtime configuration of a lookup run
    pub fn to_runtime_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            variant: self.endpoint.variant,
            base_url: self.endpoint.base_url.clone(),
            limit: self.coordinator.limit,
            result_buffer: self.coordinator.result_buffer,
            show_progress: self.coordinator.enable_progress_bar,
            rate: self.rate.clone(),
            session: self.session.clone(),
            worker: self.worker.clone(),
            retry: self.retry.clone(),
        }
    }

    /// Load configuration with precedence:
    /// 1. Explicit path (must exist)
    /// 2. `./dni-fetcher.toml`
    /// 3. `<config dir>/dni-fetcher/config.toml`
    /// 4. Built-in defaults
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        match config_path {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(files::LOCAL_CONFIG_FILE)];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        search_paths.into_iter().find(|path| {
            let found = path.exists();
            if found {
                debug!("Found config file: {}", path.display());
            }
            found
        })
    }

    /// Per-user config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(files::CONFIG_DIR_NAME).join(files::CONFIG_FILE_NAME))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::InvalidFormat)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Write the commented default configuration to `path`
    ///
    /// An existing file is left untouched. Returns whether a file was created.
    pub async fn write_default_config(path: &Path) -> Result<bool> {
        if path.exists() {
            debug!("Config file already exists: {}", path.display());
            return Ok(false);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::generic(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(|e| {
                AppError::generic(format!(
                    "Failed to write config file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        info!("Created default configuration file: {}", path.display());
        Ok(true)
    }

    /// Default configuration file with comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# DNI Fetcher Configuration
# Every setting is optional; remove a line to use its default.

[endpoint]
# full-name, verification-digit or birth-date
variant = "full-name"
# base_url = "https://eldni.com"

[rate]
# Shared by all workers
max_per_window = {max}
window = "1m"
min_interval = "{interval}s"
safety_margin = "1s"

[session]
# Completed lookups before a fresh session (0 = never)
rotate_every = {rotate}
rotation_pause = "{pause}s"
request_timeout = "30s"
connect_timeout = "10s"

[worker]
worker_count = {workers}
pacing_interval = "{pacing}s"
pacing_stagger = "2s"
pacing_jitter = "1s"

[retry]
max_attempts = {attempts}
base_delay = "10s"
multiplier = 2
max_delay = "5m"
rate_limit_cooldown = "30s"
rate_limit_step = "30s"

[coordinator]
# limit = 100
result_buffer = {buffer}
enable_progress_bar = true

[logging]
level = "warn"  # error, warn, info, debug, trace
"#,
            max = limits::MAX_REQUESTS_PER_WINDOW,
            interval = limits::MIN_INTERVAL.as_secs(),
            rotate = session::ROTATE_EVERY,
            pause = session::ROTATION_PAUSE.as_secs(),
            workers = workers::DEFAULT_WORKER_COUNT,
            pacing = workers::PACING_INTERVAL.as_secs(),
            attempts = retry::MAX_ATTEMPTS,
            buffer = coordinator::RESULT_CHANNEL_CAPACITY,
        )
    }
}
