//! Core lookup worker implementation
//!
//! A worker owns one session for its whole life. It claims identifiers from
//! the shared queue, paces itself, runs the bounded retry loop for each one
//! and hands exactly one outcome per identifier to the collector. Every wait
//! (gate, pacing, backoff, network) is raced against the cancellation token.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::WorkerConfig;
use super::types::{WorkerReport, WorkerState};
use super::LookupServices;
use crate::app::models::{FieldRecord, Identifier, LookupOutcome};
use crate::app::queue::WorkQueue;
use crate::app::retry::RetryDecision;
use crate::app::session::Session;
use crate::errors::{describe_wait, LookupError, LookupResult};

/// Individual lookup worker
pub struct LookupWorker {
    id: u32,
    services: Arc<LookupServices>,
    queue: Arc<WorkQueue>,
    results_tx: mpsc::Sender<LookupOutcome>,
    cancel: CancellationToken,
    pacer: Option<DefaultDirectRateLimiter>,
    jitter: Jitter,
    state: WorkerState,
    report: WorkerReport,
}

impl LookupWorker {
    pub fn new(
        id: u32,
        config: &WorkerConfig,
        services: Arc<LookupServices>,
        queue: Arc<WorkQueue>,
        results_tx: mpsc::Sender<LookupOutcome>,
        cancel: CancellationToken,
    ) -> Self {
        let pacer = config
            .pacing_for(id)
            .and_then(Quota::with_period)
            .map(|quota| RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN)));

        Self {
            id,
            services,
            queue,
            results_tx,
            cancel,
            pacer,
            jitter: Jitter::up_to(config.pacing_jitter),
            state: WorkerState::Idle,
            report: WorkerReport::new(id),
        }
    }

    /// Run until the queue is empty, cancellation, or session failure
    pub async fn run(mut self) -> WorkerReport {
        self.transition(WorkerState::AcquiringSession);

        let Some(mut session) = self.acquire_session().await else {
            self.transition(WorkerState::Done);
            return self.report;
        };
        self.report.session_acquired = true;
        info!("Worker {} ready", self.id);
        self.transition(WorkerState::Working);

        loop {
            if self.cancel.is_cancelled() {
                self.report.cancelled = true;
                break;
            }

            let Some(raw) = self.queue.claim(self.id).await else {
                debug!("Worker {} found the queue empty", self.id);
                break;
            };

            let outcome = self.process(&mut session, &raw).await;
            if matches!(outcome.result, Err(LookupError::Cancelled)) {
                self.report.cancelled = true;
            }
            self.report.processed += 1;
            if outcome.is_success() {
                self.report.succeeded += 1;
            } else {
                self.report.failed += 1;
            }

            self.transition(WorkerState::Emitting);
            if self.results_tx.send(outcome).await.is_err() {
                error!("Worker {}: result channel closed, stopping", self.id);
                break;
            }
            self.queue.acknowledge(&raw).await;
            self.transition(WorkerState::Working);
        }

        self.transition(WorkerState::Draining);
        info!(
            "Worker {} finished: {} processed, {} succeeded, {} failed, {} rotations",
            self.id,
            self.report.processed,
            self.report.succeeded,
            self.report.failed,
            self.report.rotations
        );
        self.transition(WorkerState::Done);
        self.report
    }

    fn transition(&mut self, next: WorkerState) {
        if self.state != next {
            debug!("Worker {}: {} -> {}", self.id, self.state, next);
            self.state = next;
        }
    }

    /// Race a future against cancellation
    async fn cancellable<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            output = future => Some(output),
        }
    }

    async fn acquire_session(&mut self) -> Option<Session> {
        let services = Arc::clone(&self.services);
        let mut session = match services.sessions.open(self.id) {
            Ok(session) => session,
            Err(e) => {
                warn!("Worker {} could not open a session: {}", self.id, e);
                return None;
            }
        };

        match self
            .cancellable(services.sessions.ensure_token(&mut session))
            .await
        {
            Some(Ok(())) => Some(session),
            Some(Err(e)) => {
                warn!(
                    "Worker {} could not establish a session, exiting: {}",
                    self.id, e
                );
                None
            }
            None => {
                self.report.cancelled = true;
                None
            }
        }
    }

    async fn rotate(&mut self, session: &mut Session) -> Option<LookupResult<()>> {
        let services = Arc::clone(&self.services);
        self.report.rotations += 1;
        self.cancellable(services.sessions.rotate(session)).await
    }

    /// Produce the single outcome for one claimed identifier
    async fn process(&mut self, session: &mut Session, raw: &str) -> LookupOutcome {
        let identifier = match Identifier::parse(raw) {
            Ok(identifier) => identifier,
            Err(e) => {
                warn!("Worker {} rejected identifier '{}': {}", self.id, raw, e);
                return LookupOutcome::failure(raw, self.id, 0, e);
            }
        };

        if self.services.sessions.rotation_due(session) || !session.has_token() {
            match self.rotate(session).await {
                Some(Ok(())) => {}
                // The first attempt below fails on the missing token
                Some(Err(_)) => {}
                None => return LookupOutcome::failure(raw, self.id, 0, LookupError::Cancelled),
            }
        }

        if !self.pace().await {
            return LookupOutcome::failure(raw, self.id, 0, LookupError::Cancelled);
        }

        let policy = self.services.retry.clone();
        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            let error = match self.attempt(session, &identifier).await {
                Ok(record) => {
                    info!("Worker {}: {} found", self.id, identifier);
                    break LookupOutcome::success(raw, self.id, attempt, record);
                }
                Err(LookupError::Cancelled) => {
                    break LookupOutcome::failure(raw, self.id, attempt, LookupError::Cancelled);
                }
                Err(error) => error,
            };

            match policy.decide(attempt, &error) {
                RetryDecision::GiveUp => {
                    if policy.requires_rotation(&error) {
                        session.invalidate();
                    }
                    let error = policy.terminal_error(attempt, error);
                    warn!("Worker {}: {} failed: {}", self.id, identifier, error);
                    break LookupOutcome::failure(raw, self.id, attempt, error);
                }
                RetryDecision::Retry { delay, rotate } => {
                    warn!(
                        "Worker {}: {} attempt {}/{} failed ({}), retrying in {}",
                        self.id,
                        identifier,
                        attempt,
                        policy.max_attempts,
                        error,
                        describe_wait(delay)
                    );
                    if !self.sleep(delay).await {
                        break LookupOutcome::failure(raw, self.id, attempt, LookupError::Cancelled);
                    }
                    if rotate && self.rotate(session).await.is_none() {
                        break LookupOutcome::failure(raw, self.id, attempt, LookupError::Cancelled);
                    }
                }
            }
        };

        session.record_use();
        outcome
    }

    /// One gate-fetch-extract pass
    async fn attempt(&mut self, session: &Session, identifier: &Identifier) -> LookupResult<FieldRecord> {
        if !session.has_token() {
            return Err(LookupError::TokenUnavailable {
                reason: "session renewal failed".to_string(),
            });
        }

        let services = Arc::clone(&self.services);

        self.transition(WorkerState::WaitingForGate);
        self.cancellable(services.gate.admit())
            .await
            .ok_or(LookupError::Cancelled)?;

        self.transition(WorkerState::Fetching);
        let body = self
            .cancellable(services.fetcher.fetch(session, identifier))
            .await
            .ok_or(LookupError::Cancelled)??;

        self.transition(WorkerState::Extracting);
        let result = services.pipeline.extract(&body, identifier);
        self.transition(WorkerState::Working);
        result
    }

    /// Wait out this worker's pacing interval; false when cancelled
    async fn pace(&self) -> bool {
        match &self.pacer {
            Some(pacer) => self
                .cancellable(pacer.until_ready_with_jitter(self.jitter))
                .await
                .is_some(),
            None => !self.cancel.is_cancelled(),
        }
    }

    /// Sleep unless cancelled; false when cancelled
    async fn sleep(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        self.cancellable(tokio::time::sleep(delay)).await.is_some()
    }
}
