//! THREAD isolation: the worker harness on a named OS thread.
//!
//! A thread cannot be killed. Cancellation is cooperative: closing the bus
//! route makes the harness exit at its next `send` or `recv`. A thread stuck
//! inside application code is detached ("abandoned") after the grace
//! period and its registration is never started again.

use crate::bus::WorkerPort;
use crate::worker::{run_app, WorkerExit};
use mxos_app::{AppContext, AppImpl};
use std::io;
use std::thread::{self, JoinHandle};
use tracing::warn;

#[derive(Debug)]
pub(crate) struct ThreadWorker {
    name: String,
    handle: JoinHandle<WorkerExit>,
}

impl ThreadWorker {
    pub(crate) fn spawn(implementation: AppImpl, ctx: AppContext, mut port: WorkerPort) -> io::Result<Self> {
        let name = format!("mxos-{}-{}", implementation.kind, ctx.registration);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_app(&implementation, &ctx, &mut port))?;
        Ok(Self { name, handle })
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Joins the thread. Call only once [`is_finished`](Self::is_finished).
    pub(crate) fn join(self) -> WorkerExit {
        self.handle
            .join()
            .unwrap_or_else(|_| WorkerExit::Failed("worker thread panicked".into()))
    }

    /// Detaches the thread.
    pub(crate) fn abandon(self) {
        warn!(thread = %self.name, "abandoning worker thread that did not stop");
        drop(self.handle);
    }
}
