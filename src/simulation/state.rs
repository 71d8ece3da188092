//! Per-simulation mutable state.
//!
//! One engine task writes a [`SimulationState`]; any number of readers may
//! take snapshots concurrently. Status, ordinal and log are guarded by a
//! single short-held mutex so a reader never sees an ordinal advance without
//! its log entry, or a terminal status without its closing entry.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::deployment::{DeploymentId, DeploymentStatus};

/// Status of one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    /// Steps are still being driven.
    Running,
    /// Every step succeeded.
    Completed,
    /// A step failed, or the task faulted.
    Failed,
    /// Stopped on request at a checkpoint.
    Cancelled,
}

impl SimulationStatus {
    /// Returns true once no further transition can occur.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Status written to the deployment record for this simulation status.
    #[must_use]
    pub const fn record_status(self) -> DeploymentStatus {
        match self {
            Self::Running => DeploymentStatus::InProgress,
            Self::Completed => DeploymentStatus::Success,
            Self::Failed => DeploymentStatus::Failed,
            Self::Cancelled => DeploymentStatus::Cancelled,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Progress message.
    Info,
    /// Failure message.
    Error,
}

/// One line of a simulation's progress trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was emitted.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
}

impl LogEntry {
    /// Creates an info entry.
    #[must_use]
    pub fn info(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    /// Creates an error entry.
    #[must_use]
    pub fn error(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            level: LogLevel::Error,
            message: message.into(),
        }
    }
}

/// Consistent copy of a simulation's progress, taken under one lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    /// Current status.
    pub status: SimulationStatus,
    /// Zero-based ordinal of the step in progress.
    pub ordinal: usize,
    /// Full ordered log.
    pub logs: Vec<LogEntry>,
}

#[derive(Debug)]
struct Progress {
    status: SimulationStatus,
    ordinal: usize,
    logs: Vec<LogEntry>,
}

/// State of one in-flight or finished simulation.
#[derive(Debug)]
pub struct SimulationState {
    id: DeploymentId,
    started_at: DateTime<Utc>,
    cancel_requested: AtomicBool,
    progress: Mutex<Progress>,
    status_tx: watch::Sender<SimulationStatus>,
}

impl SimulationState {
    /// Creates a fresh running state with an empty log.
    #[must_use]
    pub fn new(id: DeploymentId, started_at: DateTime<Utc>) -> Self {
        let (status_tx, _) = watch::channel(SimulationStatus::Running);
        Self {
            id,
            started_at,
            cancel_requested: AtomicBool::new(false),
            progress: Mutex::new(Progress {
                status: SimulationStatus::Running,
                ordinal: 0,
                logs: Vec::new(),
            }),
            status_tx,
        }
    }

    /// Simulation identifier.
    #[must_use]
    pub fn id(&self) -> &DeploymentId {
        &self.id
    }

    /// When the simulation was accepted.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    // Critical sections never panic, so a poisoned lock still holds
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a consistent snapshot of status, ordinal and log.
    #[must_use]
    pub fn view(&self) -> ProgressView {
        let progress = self.lock();
        ProgressView {
            status: progress.status,
            ordinal: progress.ordinal,
            logs: progress.logs.clone(),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SimulationStatus {
        self.lock().status
    }

    /// Copy of the ordered log.
    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.lock().logs.clone()
    }

    /// Asks the owning task to stop at its next checkpoint.
    ///
    /// Returns false, and leaves the flag untouched, if the simulation is
    /// already terminal.
    pub fn request_cancel(&self) -> bool {
        let progress = self.lock();
        if progress.status.is_terminal() {
            return false;
        }
        self.cancel_requested.store(true, Ordering::SeqCst);
        true
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Appends an entry while running. Returns false if already terminal.
    pub fn append(&self, entry: LogEntry) -> bool {
        let mut progress = self.lock();
        if progress.status.is_terminal() {
            return false;
        }
        progress.logs.push(entry);
        true
    }

    /// Records the success of step `index`: appends `entry` and advances the
    /// ordinal to `index + 1` in one critical section.
    ///
    /// Returns false if already terminal. The ordinal never moves backward.
    pub fn complete_step(&self, index: usize, entry: LogEntry) -> bool {
        let mut progress = self.lock();
        if progress.status.is_terminal() {
            return false;
        }
        progress.logs.push(entry);
        progress.ordinal = progress.ordinal.max(index + 1);
        true
    }

    /// Atomically moves a running simulation into `status`.
    ///
    /// The status check, the optional ordinal override and the optional
    /// closing entry are applied under one lock. Returns true only for the
    /// single caller that performed the transition; every later call is a
    /// no-op returning false. Subscribers are not woken until
    /// [`SimulationState::notify_finished`] is called.
    pub fn try_finish(&self, status: SimulationStatus, ordinal: Option<usize>, closing: Option<LogEntry>) -> bool {
        if !status.is_terminal() {
            return false;
        }
        let mut progress = self.lock();
        if progress.status.is_terminal() {
            return false;
        }
        if let Some(ordinal) = ordinal {
            progress.ordinal = progress.ordinal.max(ordinal);
        }
        if let Some(entry) = closing {
            progress.logs.push(entry);
        }
        progress.status = status;
        true
    }

    /// Publishes the current status to subscribers. The engine calls this
    /// once the deployment record has been finalized.
    pub fn notify_finished(&self) {
        let status = self.status();
        self.status_tx.send_replace(status);
    }

    /// Subscribes to status notifications.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SimulationStatus> {
        self.status_tx.subscribe()
    }
}
