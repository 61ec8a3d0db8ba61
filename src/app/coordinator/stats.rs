//! Run summary

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::app::collector::CollectorTally;
use crate::app::rate_gate::RateGateStats;

/// Final result of a lookup run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Identifiers enqueued
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Successful lookups that could not be written
    pub sink_errors: u64,
    pub failures_by_category: BTreeMap<&'static str, u64>,
    /// Workers spawned
    pub workers_started: usize,
    /// Workers that never obtained a session
    pub workers_without_session: usize,
    /// Session rotations across all workers
    pub rotations: u64,
    /// Requests admitted by the rate gate
    pub requests: u64,
    /// Time spent waiting on the rate gate, summed over requests
    pub gate_wait: Duration,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl RunSummary {
    /// Summary for a run with nothing to do
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            sink_errors: 0,
            failures_by_category: BTreeMap::new(),
            workers_started: 0,
            workers_without_session: 0,
            rotations: 0,
            requests: 0,
            gate_wait: Duration::ZERO,
            cancelled: false,
            started_at,
            duration: Duration::ZERO,
        }
    }

    pub(crate) fn apply_tally(&mut self, tally: &CollectorTally) {
        self.succeeded = tally.succeeded;
        self.failed = tally.failed;
        self.sink_errors = tally.sink_errors;
        self.failures_by_category = tally.failures_by_category.clone();
    }

    pub(crate) fn apply_gate(&mut self, stats: RateGateStats) {
        self.requests = stats.total_admitted;
        self.gate_wait = stats.total_waited;
    }

    /// Every enqueued identifier got exactly one outcome
    pub fn is_accounted(&self) -> bool {
        self.succeeded + self.failed == self.total
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64 * 100.0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "succeeded: {}, failed: {}, total: {}",
            self.succeeded, self.failed, self.total
        )
    }
}
