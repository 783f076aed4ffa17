//! Display errors.
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`DisplayError::Timeout`] | `DISPLAY_TIMEOUT` | Yes |
//! | [`DisplayError::Busy`] | `DISPLAY_BUSY` | Yes |
//! | [`DisplayError::Failed`] | `DISPLAY_FAILED` | Yes |
//! | [`DisplayError::Disconnected`] | `DISPLAY_DISCONNECTED` | No |

use mxos_types::ErrorCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    /// The sink did not acknowledge within the budget.
    #[error("sink did not finish within {budget:?}")]
    Timeout { budget: Duration },

    /// The sink is still working on an earlier frame.
    #[error("sink busy with a previous frame")]
    Busy,

    #[error("sink failed: {0}")]
    Failed(String),

    /// The sink thread is gone.
    #[error("sink disconnected")]
    Disconnected,
}

impl ErrorCode for DisplayError {
    fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "DISPLAY_TIMEOUT",
            Self::Busy => "DISPLAY_BUSY",
            Self::Failed(_) => "DISPLAY_FAILED",
            Self::Disconnected => "DISPLAY_DISCONNECTED",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

impl From<std::io::Error> for DisplayError {
    fn from(e: std::io::Error) -> Self {
        Self::Failed(e.to_string())
    }
}
