//! Bus messages.
//!
//! Two directions, two enums:
//!
//! ```text
//!             ControlMessage
//! Kernel ────────────────────────► Worker
//!   ▲   APP_START / APP_STOP /       │
//!   │   APP_PAUSE / APP_RESUME       │
//!   │                                │
//!   └────────────────────────────────┘
//!             WorkerMessage
//!   FRAME_READY(frame, seq) / APP_READY / APP_ERROR(reason)
//! ```
//!
//! Both serialize as internally tagged JSON objects, which is also the
//! process wire format (see [`codec`](crate::codec)):
//!
//! ```
//! use mxos_event::ControlMessage;
//!
//! let json = serde_json::to_string(&ControlMessage::Pause).unwrap();
//! assert_eq!(json, r#"{"type":"pause"}"#);
//! ```

use mxos_types::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message sent by a worker to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// A freshly rendered frame. `sequence` strictly increases per worker
    /// instance, starting at 1.
    FrameReady { frame: Frame, sequence: u64 },
    /// `on_start` completed; the worker is waiting for `APP_START`.
    Ready,
    /// The worker failed and is exiting.
    Error { reason: String },
}

impl WorkerMessage {
    /// Returns `true` for frames.
    ///
    /// Frames are the only messages the bus may evict under pressure.
    #[must_use]
    pub fn is_frame(&self) -> bool {
        matches!(self, Self::FrameReady { .. })
    }

    /// Wire-level name, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FrameReady { .. } => "FRAME_READY",
            Self::Ready => "APP_READY",
            Self::Error { .. } => "APP_ERROR",
        }
    }

    /// Convenience constructor for [`WorkerMessage::Error`].
    #[must_use]
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for WorkerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameReady { sequence, .. } => write!(f, "FRAME_READY(#{sequence})"),
            Self::Ready => f.write_str("APP_READY"),
            Self::Error { reason } => write!(f, "APP_ERROR({reason})"),
        }
    }
}

/// Lifecycle command sent by the orchestrator to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Begin producing frames (first activation).
    Start,
    /// Finish the current frame, run `on_stop`, exit.
    Stop,
    /// Stop producing frames until resumed.
    Pause,
    /// Resume producing frames.
    Resume,
}

impl ControlMessage {
    /// Wire-level name, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start => "APP_START",
            Self::Stop => "APP_STOP",
            Self::Pause => "APP_PAUSE",
            Self::Resume => "APP_RESUME",
        }
    }

    /// Returns `true` if the worker should be producing frames after
    /// handling this message.
    #[must_use]
    pub fn enables_rendering(&self) -> bool {
        matches!(self, Self::Start | Self::Resume)
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}
