//! Kernel errors.
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`KernelError::NotRunning`] | `KERNEL_NOT_RUNNING` | No |
//! | [`KernelError::InvalidConfig`] | `KERNEL_INVALID_CONFIG` | No |
//! | [`KernelError::SinkSpawn`] | `KERNEL_SINK_SPAWN` | No |
//! | [`KernelError::Sandbox`] | `KERNEL_SANDBOX` | as wrapped |
//! | [`KernelError::App`] | `KERNEL_APP` | as wrapped |
//!
//! Worker misbehavior never shows up here. It is contained as a
//! [`Fault`](crate::fault::Fault) and reported in the tick report.

use crate::sandbox::SandboxError;
use mxos_app::AppError;
use mxos_types::ErrorCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// The kernel has been shut down.
    #[error("kernel is not running")]
    NotRunning,

    #[error("invalid kernel configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start display sink: {0}")]
    SinkSpawn(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    App(#[from] AppError),
}

impl ErrorCode for KernelError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotRunning => "KERNEL_NOT_RUNNING",
            Self::InvalidConfig(_) => "KERNEL_INVALID_CONFIG",
            Self::SinkSpawn(_) => "KERNEL_SINK_SPAWN",
            Self::Sandbox(_) => "KERNEL_SANDBOX",
            Self::App(_) => "KERNEL_APP",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Sandbox(e) => e.is_recoverable(),
            Self::App(e) => e.is_recoverable(),
            _ => false,
        }
    }
}
