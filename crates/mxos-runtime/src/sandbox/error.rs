//! Sandbox errors.
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`SandboxError::UnknownRegistration`] | `SANDBOX_UNKNOWN_REGISTRATION` | No |
//! | [`SandboxError::InvalidManifest`] | `SANDBOX_INVALID_MANIFEST` | No |
//! | [`SandboxError::InvalidDuration`] | `SANDBOX_INVALID_DURATION` | No |
//! | [`SandboxError::Abandoned`] | `SANDBOX_ABANDONED` | No |
//! | [`SandboxError::Spawn`] | `SANDBOX_SPAWN` | Yes |
//! | [`SandboxError::Bus`] | `SANDBOX_BUS` | if the bus error is |
//! | [`SandboxError::InvalidState`] | `SANDBOX_INVALID_STATE` | Yes |

use crate::bus::BusError;
use mxos_app::{AppError, WorkerState};
use mxos_types::{ErrorCode, RegistrationId};
use thiserror::Error;

/// Error returned by [`Sandbox`](super::Sandbox) operations.
///
/// Worker failures are not errors: they surface as faults and `APP_ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    #[error("unknown registration: {0}")]
    UnknownRegistration(RegistrationId),

    #[error(transparent)]
    InvalidManifest(AppError),

    #[error("rotation duration must be positive")]
    InvalidDuration,

    /// A previous instance could not be stopped; the registration is out.
    #[error("{0} was abandoned and cannot be started")]
    Abandoned(RegistrationId),

    #[error("failed to spawn worker for {id}: {reason}")]
    Spawn { id: RegistrationId, reason: String },

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("cannot {op} {id} while {state}")]
    InvalidState {
        id: RegistrationId,
        state: WorkerState,
        op: &'static str,
    },
}

impl ErrorCode for SandboxError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownRegistration(_) => "SANDBOX_UNKNOWN_REGISTRATION",
            Self::InvalidManifest(_) => "SANDBOX_INVALID_MANIFEST",
            Self::InvalidDuration => "SANDBOX_INVALID_DURATION",
            Self::Abandoned(_) => "SANDBOX_ABANDONED",
            Self::Spawn { .. } => "SANDBOX_SPAWN",
            Self::Bus(_) => "SANDBOX_BUS",
            Self::InvalidState { .. } => "SANDBOX_INVALID_STATE",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Spawn { .. } | Self::InvalidState { .. } => true,
            Self::Bus(e) => e.is_recoverable(),
            _ => false,
        }
    }
}
