//! Worker pool management
//!
//! Spawns the configured number of lookup workers over a shared queue,
//! result channel and cancellation token, and joins them at the end of the
//! run. A worker task that panics is reported with its id so the coordinator
//! can account for whatever it had claimed.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::config::WorkerConfig;
use super::core::LookupWorker;
use super::types::WorkerReport;
use super::LookupServices;
use crate::app::models::LookupOutcome;
use crate::app::queue::WorkQueue;

/// Current state of the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Pool has been created but not started
    Created,
    /// Workers are running
    Running,
    /// All workers have been joined
    Finished,
}

/// How one worker task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Completed(WorkerReport),
    Panicked { worker_id: u32, message: String },
}

/// Pool of lookup workers
pub struct WorkerPool {
    config: WorkerConfig,
    services: Arc<LookupServices>,
    queue: Arc<WorkQueue>,
    cancel: CancellationToken,
    handles: Vec<(u32, JoinHandle<WorkerReport>)>,
    state: PoolState,
}

impl WorkerPool {
    pub fn new(
        config: WorkerConfig,
        services: Arc<LookupServices>,
        queue: Arc<WorkQueue>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            services,
            queue,
            cancel,
            handles: Vec::new(),
            state: PoolState::Created,
        }
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    /// Spawn exactly `worker_count` workers
    pub fn start(&mut self, results_tx: &mpsc::Sender<LookupOutcome>) {
        if self.state != PoolState::Created {
            return;
        }

        info!("Starting {} workers", self.config.worker_count);
        for worker_id in 0..self.config.worker_count as u32 {
            let worker = LookupWorker::new(
                worker_id,
                &self.config,
                Arc::clone(&self.services),
                Arc::clone(&self.queue),
                results_tx.clone(),
                self.cancel.clone(),
            );
            let handle = tokio::spawn(worker.run());
            self.handles.push((worker_id, handle));
        }
        self.state = PoolState::Running;
    }

    /// Wait for every worker to stop
    pub async fn join(mut self) -> Vec<WorkerExit> {
        let handles = std::mem::take(&mut self.handles);
        let (ids, tasks): (Vec<u32>, Vec<_>) = handles.into_iter().unzip();

        let exits = join_all(tasks)
            .await
            .into_iter()
            .zip(ids)
            .map(|(result, worker_id)| match result {
                Ok(report) => WorkerExit::Completed(report),
                Err(e) => {
                    error!("Worker {} terminated abnormally: {}", worker_id, e);
                    WorkerExit::Panicked {
                        worker_id,
                        message: e.to_string(),
                    }
                }
            })
            .collect();

        self.state = PoolState::Finished;
        exits
    }
}
