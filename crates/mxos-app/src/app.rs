//! Application lifecycle contract.
//!
//! Every application implements [`App`]. Its methods are called only by the
//! worker harness running inside the application's own thread or process,
//! never by the kernel:
//!
//! ```text
//! harness                        App
//!   │ ── on_start(ctx) ─────────► │
//!   │ ◄──────────── Ok ────────── │   → APP_READY
//!   │      ... APP_START ...      │
//!   │ ── update() ──────────────► │ ┐
//!   │ ── render(&mut canvas) ───► │ ├ every 1/frame_rate
//!   │      canvas copied out      │ ┘ → FRAME_READY
//!   │      ... APP_STOP ...       │
//!   │ ── on_stop() ─────────────► │
//! ```
//!
//! `render` draws into a canvas owned by the harness. The harness copies the
//! canvas into the outgoing message, so a submitted frame is never touched
//! again by the application.

use crate::{AppError, Manifest};
use mxos_types::{Dimensions, Frame, RegistrationId};

/// Per-instance information handed to an application at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppContext {
    /// Display resolution for the whole run.
    pub dimensions: Dimensions,
    /// Registration this instance belongs to.
    pub registration: RegistrationId,
}

impl AppContext {
    #[must_use]
    pub const fn new(dimensions: Dimensions, registration: RegistrationId) -> Self {
        Self {
            dimensions,
            registration,
        }
    }
}

/// A mini-application producing frames at its own pace.
///
/// Implementations must return promptly from `update` and `render`. A
/// thread-isolated application that blocks here delays its own frames and
/// competes with the render loop for CPU; anything that can block on
/// external I/O must declare the matching capability so it runs in its own
/// process.
///
/// # Example
///
/// ```
/// use mxos_app::{App, AppError, Manifest};
/// use mxos_types::{Frame, Rgb};
///
/// struct Solid {
///     manifest: Manifest,
///     color: Rgb,
/// }
///
/// impl App for Solid {
///     fn manifest(&self) -> &Manifest {
///         &self.manifest
///     }
///
///     fn update(&mut self) -> Result<(), AppError> {
///         Ok(())
///     }
///
///     fn render(&mut self, canvas: &mut Frame) -> Result<(), AppError> {
///         canvas.fill(self.color);
///         Ok(())
///     }
/// }
/// ```
pub trait App: Send {
    /// Static descriptor of this application kind.
    fn manifest(&self) -> &Manifest;

    /// Called once in the worker context before the first frame.
    ///
    /// # Errors
    ///
    /// An error aborts the worker and is reported as `APP_ERROR`.
    fn on_start(&mut self, ctx: &AppContext) -> Result<(), AppError> {
        let _ = ctx;
        Ok(())
    }

    /// Advances application state by one frame.
    ///
    /// # Errors
    ///
    /// An error aborts the worker and is reported as `APP_ERROR`.
    fn update(&mut self) -> Result<(), AppError>;

    /// Draws the current state. The canvas still holds the previous frame.
    ///
    /// # Errors
    ///
    /// An error aborts the worker and is reported as `APP_ERROR`.
    fn render(&mut self, canvas: &mut Frame) -> Result<(), AppError>;

    /// Called once when the worker exits, including after a failure.
    fn on_stop(&mut self) {}
}
