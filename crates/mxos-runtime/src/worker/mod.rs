//! Worker side of the bus: the loop that runs inside every worker.
//!
//! The same harness drives an application whether it lives on a thread of
//! the orchestrator process or in a child process. Only the link differs:
//!
//! | Isolation | Link | Transport |
//! |-----------|------|-----------|
//! | THREAD | [`WorkerPort`] | in-memory mailboxes |
//! | PROCESS | [`stdio::StdioLink`] | JSON lines on stdin/stdout |
//!
//! # Loop
//!
//! ```text
//! create app ─► on_start ─► APP_READY ─► wait APP_START
//!                                             │
//!        ┌────────────────────────────────────┘
//!        ▼
//!   ┌─► drain control (PAUSE / RESUME / STOP)
//!   │   paused? ── yes ──► idle wait ──┐
//!   │   update + render ─► FRAME_READY │
//!   └── wait until next frame ◄────────┘
//! ```
//!
//! `on_stop` runs on every exit path. Application errors and panics are
//! reported as `APP_ERROR` before the worker ends.

mod harness;
pub mod stdio;

pub use harness::{run_app, IDLE_WAIT};

use crate::bus::{BusError, WorkerPort};
use mxos_event::{ControlMessage, WorkerMessage};
use std::time::Duration;

/// Worker-side transport.
pub trait WorkerLink {
    /// Sends a message to the orchestrator.
    ///
    /// # Errors
    ///
    /// Any error ends the worker loop.
    fn send(&mut self, message: WorkerMessage) -> Result<(), BusError>;

    /// Waits up to `wait` for a control message.
    ///
    /// # Errors
    ///
    /// Returns an error once the orchestrator side is gone.
    fn recv(&mut self, wait: Duration) -> Result<Option<ControlMessage>, BusError>;
}

impl WorkerLink for WorkerPort {
    fn send(&mut self, message: WorkerMessage) -> Result<(), BusError> {
        WorkerPort::send(self, message)
    }

    fn recv(&mut self, wait: Duration) -> Result<Option<ControlMessage>, BusError> {
        WorkerPort::recv(self, wait)
    }
}

/// Exit code of a worker process whose application failed after reporting
/// `APP_ERROR` itself.
pub const EXIT_APP_FAILED: i32 = 3;

/// Why a worker loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Received `APP_STOP`.
    Stopped,
    /// The link closed underneath the worker.
    Disconnected,
    /// The application failed; `APP_ERROR` was sent (best effort).
    Failed(String),
}

impl WorkerExit {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Process exit code for a worker child.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Stopped | Self::Disconnected => 0,
            Self::Failed(_) => EXIT_APP_FAILED,
        }
    }
}
