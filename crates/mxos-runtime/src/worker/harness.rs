//! The application loop shared by THREAD and PROCESS workers.
//!
//! [`run_app`] owns the app instance for its whole life and talks to the
//! orchestrator only through a [`WorkerLink`]. Panics in app code are
//! caught here and reported as `APP_ERROR`.

use super::{WorkerExit, WorkerLink};
use mxos_app::{App, AppContext, AppImpl};
use mxos_event::{ControlMessage, WorkerMessage};
use mxos_types::Frame;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn};

/// How long a paused (or not yet started) worker waits for control
/// messages per loop iteration.
pub const IDLE_WAIT: Duration = Duration::from_millis(20);

/// Runs one application instance until it is stopped, fails or loses its
/// link.
///
/// The application is constructed here, inside the worker context, so a
/// panicking constructor is contained like any other failure.
pub fn run_app(implementation: &AppImpl, ctx: &AppContext, link: &mut dyn WorkerLink) -> WorkerExit {
    let span = info_span!("worker", id = %ctx.registration, kind = %implementation.kind);
    let _guard = span.enter();

    let mut app = match panic::catch_unwind(AssertUnwindSafe(|| implementation.create(ctx))) {
        Ok(app) => app,
        Err(payload) => {
            let reason = format!("panicked in constructor: {}", panic_message(&*payload));
            return fail(link, reason);
        }
    };

    let exit = match panic::catch_unwind(AssertUnwindSafe(|| drive(app.as_mut(), ctx, link))) {
        Ok(exit) => exit,
        Err(payload) => fail(link, format!("panicked: {}", panic_message(&*payload))),
    };

    if panic::catch_unwind(AssertUnwindSafe(|| app.on_stop())).is_err() {
        warn!("on_stop panicked");
    }
    info!(?exit, "worker exited");
    exit
}

fn drive(app: &mut dyn App, ctx: &AppContext, link: &mut dyn WorkerLink) -> WorkerExit {
    let interval = app.manifest().frame_interval();

    if let Err(e) = app.on_start(ctx) {
        return fail(link, format!("on_start: {e}"));
    }
    if link.send(WorkerMessage::Ready).is_err() {
        return WorkerExit::Disconnected;
    }
    debug!("ready");

    let mut canvas = Frame::blank(ctx.dimensions);
    let mut sequence = 0u64;
    let mut rendering = false;
    let mut next_frame = Instant::now();

    loop {
        let wait = if rendering {
            next_frame.saturating_duration_since(Instant::now())
        } else {
            IDLE_WAIT
        };
        match link.recv(wait) {
            Ok(Some(ControlMessage::Stop)) => return WorkerExit::Stopped,
            Ok(Some(ControlMessage::Pause)) => {
                debug!("paused");
                rendering = false;
                continue;
            }
            Ok(Some(msg)) => {
                if msg.enables_rendering() && !rendering {
                    debug!(kind = msg.kind(), "rendering");
                    rendering = true;
                    next_frame = Instant::now();
                }
                continue;
            }
            Ok(None) => {}
            Err(_) => return WorkerExit::Disconnected,
        }

        if !rendering || Instant::now() < next_frame {
            continue;
        }

        if let Err(e) = app.update() {
            return fail(link, format!("update: {e}"));
        }
        if let Err(e) = app.render(&mut canvas) {
            return fail(link, format!("render: {e}"));
        }
        sequence += 1;
        let message = WorkerMessage::FrameReady {
            frame: canvas.clone(),
            sequence,
        };
        if link.send(message).is_err() {
            return WorkerExit::Disconnected;
        }

        // A slow frame moves the schedule instead of causing a burst.
        next_frame += interval;
        let now = Instant::now();
        if next_frame < now {
            next_frame = now;
        }
    }
}

fn fail(link: &mut dyn WorkerLink, reason: String) -> WorkerExit {
    error!(%reason, "application failed");
    if let Err(e) = link.send(WorkerMessage::error(reason.clone())) {
        warn!(error = %e, "could not report failure");
    }
    WorkerExit::Failed(reason)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
