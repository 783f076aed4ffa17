//! Message bus errors.
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`BusError::UnknownWorker`] | `BUS_UNKNOWN_WORKER` | No |
//! | [`BusError::WorkerClosed`] | `BUS_WORKER_CLOSED` | No |
//! | [`BusError::Saturated`] | `BUS_SATURATED` | Yes |

use mxos_types::{ErrorCode, RegistrationId};
use std::time::Duration;
use thiserror::Error;

/// Message bus error.
///
/// ```
/// use mxos_runtime::bus::BusError;
/// use mxos_types::{ErrorCode, RegistrationId};
///
/// let err = BusError::UnknownWorker(RegistrationId::new(7));
/// assert_eq!(err.code(), "BUS_UNKNOWN_WORKER");
/// assert_eq!(err.to_string(), "unknown worker: reg-7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// No route was ever opened for this id.
    #[error("unknown worker: {0}")]
    UnknownWorker(RegistrationId),

    /// The route exists but has been closed (worker stopped).
    #[error("worker closed: {0}")]
    WorkerClosed(RegistrationId),

    /// A control message could not be queued within the bounded timeout.
    #[error("channel to {id} saturated for {timeout:?}")]
    Saturated {
        id: RegistrationId,
        timeout: Duration,
    },
}

impl ErrorCode for BusError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownWorker(_) => "BUS_UNKNOWN_WORKER",
            Self::WorkerClosed(_) => "BUS_WORKER_CLOSED",
            Self::Saturated { .. } => "BUS_SATURATED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Saturated { .. })
    }
}
