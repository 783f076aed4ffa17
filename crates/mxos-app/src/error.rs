//! Application layer errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`InvalidManifest`](AppError::InvalidManifest) | `APP_INVALID_MANIFEST` | No |
//! | [`UnknownApp`](AppError::UnknownApp) | `APP_UNKNOWN` | No |
//! | [`DuplicateApp`](AppError::DuplicateApp) | `APP_DUPLICATE` | No |
//! | [`StartFailed`](AppError::StartFailed) | `APP_START_FAILED` | Yes |
//! | [`UpdateFailed`](AppError::UpdateFailed) | `APP_UPDATE_FAILED` | Yes |
//! | [`RenderFailed`](AppError::RenderFailed) | `APP_RENDER_FAILED` | Yes |
//!
//! Lifecycle failures are recoverable: the kernel's default policy restarts
//! the application the next time its slot comes around.
//!
//! ```
//! use mxos_app::AppError;
//! use mxos_types::ErrorCode;
//!
//! let err = AppError::RenderFailed("font missing".into());
//! assert_eq!(err.code(), "APP_RENDER_FAILED");
//! assert!(err.is_recoverable());
//! ```

use mxos_types::ErrorCode;
use thiserror::Error;

/// Error raised by an application or by registry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Manifest failed validation.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// No application registered under this kind.
    #[error("unknown app: {0}")]
    UnknownApp(String),

    /// An application kind was registered twice.
    #[error("app already registered: {0}")]
    DuplicateApp(String),

    /// `on_start` failed.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// `update` failed.
    #[error("update failed: {0}")]
    UpdateFailed(String),

    /// `render` failed.
    #[error("render failed: {0}")]
    RenderFailed(String),
}

impl ErrorCode for AppError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidManifest(_) => "APP_INVALID_MANIFEST",
            Self::UnknownApp(_) => "APP_UNKNOWN",
            Self::DuplicateApp(_) => "APP_DUPLICATE",
            Self::StartFailed(_) => "APP_START_FAILED",
            Self::UpdateFailed(_) => "APP_UPDATE_FAILED",
            Self::RenderFailed(_) => "APP_RENDER_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StartFailed(_) | Self::UpdateFailed(_) | Self::RenderFailed(_)
        )
    }
}
