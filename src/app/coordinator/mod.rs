//! Lookup run orchestration
//!
//! The coordinator is the control plane of a run. It loads the pending
//! identifiers, fills the work queue, starts the collector and the worker
//! pool, and waits for both. Once the workers are gone it accounts for every
//! identifier that did not get an outcome (never claimed because no worker
//! held a session, interrupted by shutdown, or lost with a crashed worker)
//! so that each enqueued identifier is reported exactly once.
//!
//! # Module Organization
//!
//! - [`config`] - Run configuration and validation
//! - [`stats`] - Final run summary
//! - [`signals`] - CTRL-C / SIGTERM handling
//! - [`progress`] - Progress bar
//!
//! # Examples
//!
//! ```rust,no_run
//! use dni_fetcher::app::{Coordinator, CoordinatorConfig, MemoryStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::with_pending(["12345678", "87654321"]);
//! let coordinator = Coordinator::new(CoordinatorConfig::default().with_progress(false));
//! let summary = coordinator.run(&store, store.clone()).await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod progress;
pub mod signals;
pub mod stats;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::collector::{Collector, CollectorTally};
use crate::app::endpoint::EndpointProfile;
use crate::app::models::LookupOutcome;
use crate::app::queue::{Unfinished, WorkQueue};
use crate::app::store::{PendingSource, RecordSink};
use crate::app::worker::{LookupServices, WorkerExit, WorkerPool};
use crate::errors::{AppError, ConfigError, LookupError, Result};

pub use config::CoordinatorConfig;
pub use progress::lookup_progress_bar;
pub use signals::SignalHandler;
pub use stats::RunSummary;

/// Runs one batch of lookups from a source into a sink
pub struct Coordinator {
    config: CoordinatorConfig,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Build the endpoint profile and shared services for this run
    fn services(&self) -> std::result::Result<LookupServices, ConfigError> {
        let profile = match &self.config.base_url {
            Some(base_url) => EndpointProfile::with_base_url(self.config.variant, base_url)?,
            None => EndpointProfile::for_variant(self.config.variant)?,
        };
        LookupServices::new(
            profile,
            self.config.rate.clone(),
            self.config.session.clone(),
            self.config.retry.clone(),
        )
    }

    /// Identifiers to process, after applying the configured limit
    async fn load_pending<P: PendingSource>(&self, source: &P) -> Result<Vec<String>> {
        let mut pending = source.pending(self.config.variant).await?;
        info!(
            "Found {} identifiers pending {} lookup",
            pending.len(),
            self.config.variant.as_str()
        );
        if let Some(limit) = self.config.limit {
            if pending.len() > limit {
                info!("Limiting run to the first {} identifiers", limit);
                pending.truncate(limit);
            }
        }
        Ok(pending)
    }

    /// Run the whole batch and return its summary
    ///
    /// # Errors
    ///
    /// Fails before any lookup when the configuration is invalid or the
    /// pending identifiers cannot be loaded. Per-identifier failures never
    /// fail the run; they are counted in the summary.
    pub async fn run<P, S>(&self, source: &P, sink: S) -> Result<RunSummary>
    where
        P: PendingSource,
        S: RecordSink + 'static,
    {
        let started_at = Utc::now();
        let clock = Instant::now();

        self.config
            .validate()
            .map_err(|errors| ConfigError::ValidationFailed { errors })?;
        let services = Arc::new(self.services()?);

        let pending = self.load_pending(source).await?;
        let queue = Arc::new(WorkQueue::new());
        let total = queue.add_bulk(pending).await as u64;
        let mut summary = RunSummary::empty(started_at);
        if total == 0 {
            info!("Nothing to look up");
            return Ok(summary);
        }
        summary.total = total;

        let (results_tx, results_rx) = mpsc::channel::<LookupOutcome>(self.config.result_buffer);
        let mut collector = Collector::new(sink, results_rx);
        let progress = self.config.show_progress.then(|| lookup_progress_bar(total));
        if let Some(bar) = &progress {
            collector = collector.with_progress(bar.clone());
        }
        let collector_handle = tokio::spawn(collector.run());

        let mut pool = WorkerPool::new(
            self.config.worker.clone(),
            Arc::clone(&services),
            Arc::clone(&queue),
            self.cancel.clone(),
        );
        pool.start(&results_tx);
        summary.workers_started = self.config.worker.worker_count;

        let exits = pool.join().await;
        let mut lost_workers = HashSet::new();
        let mut any_session = false;
        for exit in &exits {
            match exit {
                WorkerExit::Completed(report) => {
                    any_session |= report.session_acquired;
                    if !report.session_acquired {
                        summary.workers_without_session += 1;
                    }
                    summary.rotations += report.rotations;
                }
                WorkerExit::Panicked { worker_id, .. } => {
                    lost_workers.insert(*worker_id);
                }
            }
        }
        if !any_session && lost_workers.is_empty() {
            error!("No worker could establish a session");
        }

        let unfinished = queue.take_unfinished().await;
        if !unfinished.is_empty() {
            let cancelled = self.cancel.is_cancelled();
            warn!(
                "{} identifiers did not complete, reporting them as failed",
                unfinished.len()
            );
            for outcome in leftover_outcomes(unfinished, cancelled, &lost_workers) {
                if results_tx.send(outcome).await.is_err() {
                    error!("Collector stopped before all leftovers were reported");
                    break;
                }
            }
        }
        drop(results_tx);

        let tally = match collector_handle.await {
            Ok(tally) => tally,
            Err(e) => {
                if let Some(bar) = &progress {
                    bar.abandon();
                }
                return Err(AppError::generic(format!("Collector task failed: {}", e)));
            }
        };

        summary.apply_tally(&tally);
        summary.apply_gate(services.gate.stats().await);
        summary.cancelled = self.cancel.is_cancelled();
        summary.duration = clock.elapsed();
        log_summary(&summary, &tally);
        Ok(summary)
    }
}

/// Failure outcomes for identifiers that never got one from a worker
fn leftover_outcomes(
    unfinished: Unfinished,
    cancelled: bool,
    lost_workers: &HashSet<u32>,
) -> Vec<LookupOutcome> {
    let pending_error = if cancelled {
        LookupError::Cancelled
    } else {
        LookupError::SessionUnavailable
    };

    let mut outcomes: Vec<LookupOutcome> = unfinished
        .pending
        .into_iter()
        .map(|raw| LookupOutcome::unprocessed(raw, pending_error.clone()))
        .collect();

    outcomes.extend(unfinished.in_flight.into_iter().map(|(worker_id, raw)| {
        let error = if lost_workers.contains(&worker_id) || !cancelled {
            LookupError::WorkerLost { worker_id }
        } else {
            LookupError::Cancelled
        };
        LookupOutcome::unprocessed(raw, error)
    }));
    outcomes
}

fn log_summary(summary: &RunSummary, tally: &CollectorTally) {
    info!(
        "Run finished in {:.1}s: {} ({:.1}% success, {} requests, {} rotations)",
        summary.duration.as_secs_f64(),
        summary,
        summary.success_rate(),
        summary.requests,
        summary.rotations
    );
    for (category, count) in &tally.failures_by_category {
        info!("  {}: {}", category, count);
    }
    if !summary.is_accounted() {
        error!(
            "Outcome count mismatch: {} outcomes for {} identifiers",
            summary.succeeded + summary.failed,
            summary.total
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::endpoint::LookupVariant;
    use crate::app::store::MemoryStore;
    use crate::app::worker::WorkerConfig;
    use std::time::Duration;

    fn unreachable_config() -> CoordinatorConfig {
        let mut config = CoordinatorConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .with_progress(false);
        config.worker = WorkerConfig::unpaced(2);
        config.session.rotation_pause = Duration::ZERO;
        config.session.connect_timeout = Duration::from_secs(1);
        config.session.request_timeout = Duration::from_secs(2);
        config.rate.min_interval = Duration::ZERO;
        config
    }

    #[test]
    fn test_leftovers_when_no_session() {
        let unfinished = Unfinished {
            pending: vec!["11111111".to_string(), "22222222".to_string()],
            in_flight: vec![],
        };
        let outcomes = leftover_outcomes(unfinished, false, &HashSet::new());
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| o.result == Err(LookupError::SessionUnavailable)));
    }

    #[test]
    fn test_leftovers_after_cancellation_and_crash() {
        let unfinished = Unfinished {
            pending: vec!["11111111".to_string()],
            in_flight: vec![(0, "22222222".to_string()), (1, "33333333".to_string())],
        };
        let lost = HashSet::from([1]);
        let outcomes = leftover_outcomes(unfinished, true, &lost);

        assert_eq!(outcomes[0].result, Err(LookupError::Cancelled));
        assert_eq!(outcomes[1].result, Err(LookupError::Cancelled));
        assert_eq!(
            outcomes[2].result,
            Err(LookupError::WorkerLost { worker_id: 1 })
        );
        assert!(outcomes.iter().all(|o| o.worker_id.is_none()));
    }

    #[tokio::test]
    async fn test_empty_source_yields_empty_summary() {
        let store = MemoryStore::new();
        let coordinator = Coordinator::new(unreachable_config());
        let summary = coordinator.run(&store, store.clone()).await.unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.workers_started, 0);
        assert!(store.written().await.is_empty());
    }

    /// Every identifier fails with SessionUnavailable when the site is down
    #[tokio::test]
    async fn test_unreachable_site_accounts_every_identifier() {
        let store = MemoryStore::with_pending(["11111111", "22222222", "33333333"]);
        let coordinator = Coordinator::new(unreachable_config());
        let summary = coordinator.run(&store, store.clone()).await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.workers_without_session, 2);
        assert_eq!(
            summary.failures_by_category.get("session_unavailable"),
            Some(&3)
        );
        assert!(summary.is_accounted());
    }

    #[tokio::test]
    async fn test_limit_and_invalid_config() {
        let store = MemoryStore::with_pending(["11111111", "22222222", "33333333"]);
        let coordinator = Coordinator::new(unreachable_config().with_limit(1));
        let summary = coordinator.run(&store, store.clone()).await.unwrap();
        assert_eq!(summary.total, 1);

        let invalid = Coordinator::new(
            unreachable_config()
                .with_variant(LookupVariant::BirthDate)
                .with_worker_count(0),
        );
        let result = invalid.run(&store, store.clone()).await;
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::ValidationFailed { .. }))
        ));
    }
}
