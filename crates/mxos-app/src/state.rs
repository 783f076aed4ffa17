//! Worker lifecycle state.
//!
//! ```text
//!             APP_READY          APP_START / APP_RESUME
//! Starting ─────────────► Ready ───────────────────────► Running
//!    │                                                   │    ▲
//!    │                                         APP_PAUSE │    │ APP_RESUME
//!    │                                                   ▼    │
//!    │                                                  Paused
//!    │
//!    └─── any state ── APP_ERROR / fault ──► Errored
//!         any state ── APP_STOP ──► Stopping ──► Stopped
//! ```
//!
//! `Stopped` and `Errored` are terminal for a worker instance. An errored
//! registration may be started again, which creates a new instance.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Spawned, waiting for `APP_READY`.
    Starting,
    /// `on_start` done, not yet producing frames.
    Ready,
    /// Producing frames. At most one worker is in this state.
    Running,
    /// Alive but not producing frames.
    Paused,
    /// `APP_STOP` sent, waiting for exit.
    Stopping,
    /// Exited, or never started.
    #[default]
    Stopped,
    /// Failed: crashed, timed out, or reported `APP_ERROR`.
    Errored,
}

impl WorkerState {
    /// Returns `true` if a worker instance exists and has not exited.
    ///
    /// ```
    /// use mxos_app::WorkerState;
    ///
    /// assert!(WorkerState::Paused.is_alive());
    /// assert!(!WorkerState::Errored.is_alive());
    /// ```
    #[must_use]
    pub fn is_alive(&self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Ready | Self::Running | Self::Paused | Self::Stopping
        )
    }

    /// Returns `true` for `Stopped` and `Errored`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Errored)
    }

    /// Returns `true` if the worker has reported `APP_READY` and can be
    /// told to render without being spawned again.
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Ready | Self::Running | Self::Paused)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}
