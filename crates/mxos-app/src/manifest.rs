//! Application manifest.
//!
//! The static descriptor of an application kind: produced once, read-only
//! thereafter. The sandbox validates it at registration and reads the
//! capability set at start.

use crate::{AppError, Capability};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static descriptor of an application.
///
/// # Example
///
/// ```
/// use mxos_app::{Capability, Manifest};
/// use std::time::Duration;
///
/// let manifest = Manifest::new("weather")
///     .with_version("1.2.0")
///     .with_description("Current conditions")
///     .with_frame_rate(2)
///     .with_capabilities(Capability::NETWORK);
///
/// assert!(manifest.validate().is_ok());
/// assert_eq!(manifest.frame_interval(), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Target frames per second. Must be positive.
    pub frame_rate: u32,
    pub capabilities: Capability,
}

impl Manifest {
    /// Creates a manifest with version `0.1.0`, 10 fps and no capabilities.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "0.1.0".into(),
            description: String::new(),
            frame_rate: 10,
            capabilities: Capability::empty(),
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capability) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Checks that the name is non-empty and the frame rate positive.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidManifest`] describing the first problem.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidManifest("name must not be empty".into()));
        }
        if self.frame_rate == 0 {
            return Err(AppError::InvalidManifest(format!(
                "{}: frame rate must be positive",
                self.name
            )));
        }
        Ok(())
    }

    /// Time between two frames, `1s / max(1, frame_rate)`.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }
}
