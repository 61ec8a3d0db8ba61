//! Shared identifier queue
//!
//! Workers claim identifiers one at a time and acknowledge each claim once
//! its outcome has been handed to the collector. Anything left pending or
//! claimed-but-unacknowledged when the workers stop can be drained by the
//! coordinator, so no identifier is ever silently dropped.

use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::Mutex;
use tracing::{debug, info};

/// Identifiers not yet acknowledged, split by state
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Unfinished {
    /// Never claimed by any worker
    pub pending: Vec<String>,
    /// Claimed by a worker that did not acknowledge, with the worker id
    pub in_flight: Vec<(u32, String)>,
}

impl Unfinished {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.in_flight.len()
    }
}

/// Queue counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub total_added: u64,
    pub duplicates_skipped: u64,
    pub pending: usize,
    pub in_flight: usize,
    pub completed: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<String>,
    seen: HashSet<String>,
    in_flight: HashMap<String, u32>,
    total_added: u64,
    duplicates_skipped: u64,
    completed: u64,
}

/// Multi-consumer queue of raw identifiers
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue identifiers once each; returns how many were added
    pub async fn add_bulk<I>(&self, identifiers: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut state = self.state.lock().await;
        let mut added = 0;
        for identifier in identifiers {
            if state.seen.insert(identifier.clone()) {
                state.pending.push_back(identifier);
                state.total_added += 1;
                added += 1;
            } else {
                state.duplicates_skipped += 1;
                debug!("Skipping duplicate identifier {}", identifier);
            }
        }
        if state.duplicates_skipped > 0 {
            info!(
                "Queued {} identifiers ({} duplicates skipped)",
                added, state.duplicates_skipped
            );
        } else {
            info!("Queued {} identifiers", added);
        }
        added
    }

    /// Claim the next identifier for a worker
    pub async fn claim(&self, worker_id: u32) -> Option<String> {
        let mut state = self.state.lock().await;
        let identifier = state.pending.pop_front()?;
        state.in_flight.insert(identifier.clone(), worker_id);
        Some(identifier)
    }

    /// Mark a claimed identifier as reported
    pub async fn acknowledge(&self, identifier: &str) {
        let mut state = self.state.lock().await;
        if state.in_flight.remove(identifier).is_some() {
            state.completed += 1;
        }
    }

    /// Remove everything not yet acknowledged
    pub async fn take_unfinished(&self) -> Unfinished {
        let mut state = self.state.lock().await;
        let pending: Vec<String> = state.pending.drain(..).collect();
        let mut in_flight: Vec<(u32, String)> = state
            .in_flight
            .drain()
            .map(|(identifier, worker)| (worker, identifier))
            .collect();
        in_flight.sort();
        Unfinished { pending, in_flight }
    }

    pub async fn is_drained(&self) -> bool {
        let state = self.state.lock().await;
        state.pending.is_empty() && state.in_flight.is_empty()
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.state.lock().await;
        QueueStats {
            total_added: state.total_added,
            duplicates_skipped: state.duplicates_skipped,
            pending: state.pending.len(),
            in_flight: state.in_flight.len(),
            completed: state.completed,
        }
    }
}
