//! Worker state and reporting types

use std::fmt;

/// Lifecycle of a lookup worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Idle,
    AcquiringSession,
    Working,
    WaitingForGate,
    Fetching,
    Extracting,
    Emitting,
    Draining,
    Done,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Idle => "idle",
            WorkerState::AcquiringSession => "acquiring-session",
            WorkerState::Working => "working",
            WorkerState::WaitingForGate => "waiting-for-gate",
            WorkerState::Fetching => "fetching",
            WorkerState::Extracting => "extracting",
            WorkerState::Emitting => "emitting",
            WorkerState::Draining => "draining",
            WorkerState::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a worker did before it stopped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: u32,
    /// False when the initial session could not be established
    pub session_acquired: bool,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Rotations performed, proactive and reactive
    pub rotations: u64,
    /// Stopped because of cancellation rather than an empty queue
    pub cancelled: bool,
}

impl WorkerReport {
    pub fn new(worker_id: u32) -> Self {
        Self {
            worker_id,
            ..Default::default()
        }
    }
}
