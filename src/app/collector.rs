//! Single consumer of lookup outcomes
//!
//! The collector is the only writer to the result sink. It drains the
//! outcome channel until every sender is gone, persists successful records
//! one at a time and keeps the success/failure tally for the run summary.

use std::collections::BTreeMap;

use indicatif::ProgressBar;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::app::models::LookupOutcome;
use crate::app::store::RecordSink;
use crate::constants::coordinator;

/// Counts produced by the collector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorTally {
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Successful lookups whose record could not be written
    pub sink_errors: u64,
    /// Failures by error category
    pub failures_by_category: BTreeMap<&'static str, u64>,
}

impl CollectorTally {
    fn record_failure(&mut self, category: &'static str) {
        self.failed += 1;
        *self.failures_by_category.entry(category).or_insert(0) += 1;
    }
}

/// Writes outcomes to a sink
pub struct Collector<S> {
    sink: S,
    rx: mpsc::Receiver<LookupOutcome>,
    progress: Option<ProgressBar>,
    tally: CollectorTally,
}

impl<S: RecordSink> Collector<S> {
    pub fn new(sink: S, rx: mpsc::Receiver<LookupOutcome>) -> Self {
        Self {
            sink,
            rx,
            progress: None,
            tally: CollectorTally::default(),
        }
    }

    /// Advance a progress bar for every outcome
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Drain the channel and return the final tally
    pub async fn run(mut self) -> CollectorTally {
        while let Some(outcome) = self.rx.recv().await {
            self.handle(outcome).await;

            if self.tally.received % coordinator::TALLY_LOG_EVERY == 0 {
                info!(
                    "Progress: {} processed, {} succeeded, {} failed",
                    self.tally.received, self.tally.succeeded, self.tally.failed
                );
            }
            if let Some(progress) = &self.progress {
                progress.inc(1);
                progress.set_message(format!(
                    "{} ok / {} failed",
                    self.tally.succeeded, self.tally.failed
                ));
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish_with_message(format!(
                "{} ok / {} failed",
                self.tally.succeeded, self.tally.failed
            ));
        }
        self.tally
    }

    async fn handle(&mut self, outcome: LookupOutcome) {
        self.tally.received += 1;
        match outcome.result {
            Ok(record) => match self.sink.update(&record).await {
                Ok(()) => {
                    self.tally.succeeded += 1;
                    info!(
                        "Saved {} ({} fields)",
                        record.identifier,
                        record.filled().count()
                    );
                }
                Err(e) => {
                    self.tally.sink_errors += 1;
                    self.tally.record_failure("sink_write");
                    error!("Could not save {}: {}", record.identifier, e);
                }
            },
            Err(e) => {
                self.tally.record_failure(e.category());
                warn!(
                    "{} failed after {} attempt(s): {} [cause: {}]",
                    outcome.raw_identifier,
                    outcome.attempts,
                    e,
                    e.root_cause().category()
                );
            }
        }
    }
}
