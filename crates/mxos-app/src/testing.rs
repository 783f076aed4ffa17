//! Test harness for [`App`] implementations.
//!
//! Drives an application's lifecycle synchronously, without a kernel, bus or
//! worker thread, and records every frame it renders.
//!
//! # Features
//!
//! - Deterministic: one `step` is exactly one `update` + `render`
//! - Frame log for asserting animation over several steps
//! - Lifecycle tracking (`on_stop` runs at most once)
//!
//! # Example
//!
//! ```
//! use mxos_app::testing::AppTestHarness;
//! use mxos_app::{App, AppError, Manifest};
//! use mxos_types::{Dimensions, Frame, Rgb};
//!
//! struct Blinker {
//!     manifest: Manifest,
//!     on: bool,
//! }
//!
//! impl App for Blinker {
//!     fn manifest(&self) -> &Manifest { &self.manifest }
//!     fn update(&mut self) -> Result<(), AppError> {
//!         self.on = !self.on;
//!         Ok(())
//!     }
//!     fn render(&mut self, canvas: &mut Frame) -> Result<(), AppError> {
//!         canvas.fill(if self.on { Rgb::WHITE } else { Rgb::BLACK });
//!         Ok(())
//!     }
//! }
//!
//! let app = Blinker { manifest: Manifest::new("blinker"), on: false };
//! let mut harness = AppTestHarness::new(app, Dimensions::new(4, 4));
//! harness.start().unwrap();
//! harness.run(3).unwrap();
//!
//! assert_eq!(harness.frames().len(), 3);
//! assert!(!harness.frames()[0].is_blank());
//! assert!(harness.frames()[1].is_blank());
//! ```

use crate::{App, AppContext, AppError};
use mxos_types::{Dimensions, Frame, RegistrationId};

/// Synchronous lifecycle driver for one application instance.
pub struct AppTestHarness<A: App> {
    app: A,
    ctx: AppContext,
    canvas: Frame,
    frames: Vec<Frame>,
    started: bool,
    stopped: bool,
}

impl<A: App> AppTestHarness<A> {
    /// Wraps an application rendering at `dimensions`.
    #[must_use]
    pub fn new(app: A, dimensions: Dimensions) -> Self {
        Self {
            app,
            ctx: AppContext::new(dimensions, RegistrationId::new(0)),
            canvas: Frame::blank(dimensions),
            frames: Vec::new(),
            started: false,
            stopped: false,
        }
    }

    /// Runs `on_start`.
    ///
    /// # Errors
    ///
    /// Propagates the application's error.
    pub fn start(&mut self) -> Result<(), AppError> {
        self.app.on_start(&self.ctx)?;
        self.started = true;
        Ok(())
    }

    /// Runs one `update` + `render` and records the frame.
    ///
    /// # Errors
    ///
    /// Propagates the application's error; nothing is recorded then.
    pub fn step(&mut self) -> Result<&Frame, AppError> {
        self.app.update()?;
        self.app.render(&mut self.canvas)?;
        self.frames.push(self.canvas.clone());
        Ok(&self.canvas)
    }

    /// Runs `n` steps, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first application error.
    pub fn run(&mut self, n: usize) -> Result<(), AppError> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    /// Runs `on_stop` (once).
    pub fn stop(&mut self) {
        if !self.stopped {
            self.app.on_stop();
            self.stopped = true;
        }
    }

    /// Every frame rendered so far, oldest first.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The most recent frame, if any.
    #[must_use]
    pub fn last_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    #[must_use]
    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Manifest;
    use mxos_types::Rgb;

    struct Faulty {
        manifest: Manifest,
        fail_after: usize,
        updates: usize,
        stops: usize,
    }

    impl App for Faulty {
        fn manifest(&self) -> &Manifest {
            &self.manifest
        }

        fn update(&mut self) -> Result<(), AppError> {
            self.updates += 1;
            if self.updates > self.fail_after {
                return Err(AppError::UpdateFailed("tired".into()));
            }
            Ok(())
        }

        fn render(&mut self, canvas: &mut Frame) -> Result<(), AppError> {
            canvas.set_pixel(self.updates as i64 - 1, 0, Rgb::RED);
            Ok(())
        }

        fn on_stop(&mut self) {
            self.stops += 1;
        }
    }

    fn faulty(fail_after: usize) -> AppTestHarness<Faulty> {
        let app = Faulty {
            manifest: Manifest::new("faulty"),
            fail_after,
            updates: 0,
            stops: 0,
        };
        AppTestHarness::new(app, Dimensions::new(8, 1))
    }

    #[test]
    fn run_stops_at_first_error() {
        let mut harness = faulty(2);
        harness.start().expect("start");
        let err = harness.run(5).unwrap_err();
        assert_eq!(err, AppError::UpdateFailed("tired".into()));
        assert_eq!(harness.frames().len(), 2);
    }

    #[test]
    fn canvas_accumulates_between_frames() {
        let mut harness = faulty(10);
        harness.run(3).expect("run");
        let last = harness.last_frame().expect("frame");
        for x in 0..3 {
            assert_eq!(last.pixel(x, 0), Some(Rgb::RED));
        }
        assert_eq!(harness.frames()[0].pixel(1, 0), Some(Rgb::BLACK));
    }

    #[test]
    fn stop_runs_once() {
        let mut harness = faulty(1);
        harness.stop();
        harness.stop();
        assert!(harness.is_stopped());
        assert_eq!(harness.app().stops, 1);
        assert!(!harness.is_started());
    }
}
