//! The render loop.
//!
//! The [`Kernel`] owns the bus, the sandbox, the scheduler and the display
//! sink, and ties them together one iteration at a time:
//!
//! ```text
//! ┌─► 1. sandbox.tick_liveness()      faults → APP_ERROR on the bus
//! │   2. bus.poll()                   frames, APP_READY, APP_ERROR
//! │   3. scheduler.tick(now)          pause outgoing, start/resume incoming
//! │   4. select frame                 active latest │ previous │ blank
//! │   5. present (bounded)            retry, then blank + fault
//! └── 6. sleep the rest of the frame interval (overrun: no sleep, counted)
//! ```
//!
//! Nothing in an iteration waits on a worker. The only blocking step is
//! [`Kernel::shutdown`], bounded by the shutdown grace.
//!
//! # States
//!
//! `Ready` → `Running` (first tick) → `ShuttingDown` → `Stopped`.

mod builder;
mod context;
mod error;
mod stats;

pub use builder::KernelBuilder;
pub use context::RunContext;
pub use error::KernelError;
pub use stats::KernelStats;

use crate::bus::MessageBus;
use crate::clock::Clock;
use crate::display::{BoundedSink, DisplayError, FrameObserver};
use crate::fault::Fault;
use crate::sandbox::{FrameOutcome, Sandbox, SandboxError, ShutdownReport};
use crate::scheduler::{Scheduler, Transition};
use mxos_app::{AppImpl, AppRegistry, Manifest, WorkerState};
use mxos_event::WorkerMessage;
use mxos_types::{ErrorCode, Frame, RegistrationId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What happens to a registration whose worker errored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Start a fresh instance the next time its slot comes around.
    #[default]
    Retry,
    /// Drop it from the rotation at the next boundary.
    Skip,
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Retry => "retry",
            Self::Skip => "skip",
        })
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retry" => Ok(Self::Retry),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown error policy '{other}' (expected retry or skip)")),
        }
    }
}

/// Render loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Iterations per second.
    pub target_fps: u32,
    /// Longest the loop waits for the sink per present.
    pub sink_budget: Duration,
    /// Extra present attempts after a failed one, within the same iteration.
    pub sink_retries: u32,
    pub error_policy: ErrorPolicy,
    /// Time workers get to stop cooperatively at shutdown.
    pub shutdown_grace: Duration,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            sink_budget: Duration::from_millis(10),
            sink_retries: 2,
            error_policy: ErrorPolicy::Retry,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl KernelConfig {
    /// `1 / target_fps`.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelState {
    Ready,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for KernelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        })
    }
}

/// Where the presented frame of an iteration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    /// The active worker's cached frame.
    Worker(RegistrationId),
    /// The last frame shown, repeated.
    Previous,
    Blank,
}

/// Outcome of one [`Kernel::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub transition: Option<Transition>,
    pub source: FrameSource,
    pub faults: Vec<Fault>,
    /// The sink acknowledged this iteration's frame.
    pub presented: bool,
    /// Bus messages handled.
    pub messages: usize,
}

/// Final accounting of [`Kernel::run`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stats: KernelStats,
    pub shutdown: ShutdownReport,
}

/// Thread-safe stop request for a running kernel.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the loop to stop after the current iteration.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The orchestrator. Build one with [`KernelBuilder`].
pub struct Kernel {
    ctx: RunContext,
    config: KernelConfig,
    state: KernelState,
    bus: MessageBus,
    sandbox: Sandbox,
    scheduler: Scheduler,
    sink: BoundedSink,
    clock: Arc<dyn Clock>,
    registry: AppRegistry,
    observer: FrameObserver,
    shutdown: ShutdownHandle,
    /// Last frame the sink acknowledged.
    previous: Option<Frame>,
    /// Unregistered while active; forgotten when the slot ends.
    unregistering: BTreeSet<RegistrationId>,
    stats: KernelStats,
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("run_id", &self.ctx.run_id)
            .field("state", &self.state)
            .field("active", &self.scheduler.active())
            .field("registrations", &self.sandbox.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Kernel {
    /// Adds an application to the rotation.
    ///
    /// Takes effect at the next switch boundary when something is already
    /// active.
    ///
    /// # Errors
    ///
    /// - [`KernelError::NotRunning`] after shutdown
    /// - [`KernelError::Sandbox`] for an invalid manifest or duration
    pub fn register(
        &mut self,
        implementation: AppImpl,
        manifest: Manifest,
        duration: Duration,
    ) -> Result<RegistrationId, KernelError> {
        self.ensure_open()?;
        let id = self.sandbox.register(implementation, manifest, duration)?;
        self.scheduler.add(id, duration);
        Ok(id)
    }

    /// Registers an application kind from the kernel's registry.
    ///
    /// # Errors
    ///
    /// [`KernelError::App`] for an unknown kind, otherwise as
    /// [`register`](Self::register).
    pub fn register_kind(&mut self, kind: &str, duration: Duration) -> Result<RegistrationId, KernelError> {
        let (implementation, manifest) = self.registry.resolve(kind)?;
        self.register(implementation, manifest, duration)
    }

    /// Removes a registration from the rotation.
    ///
    /// An active registration keeps its slot until the boundary, then its
    /// worker is stopped and forgotten.
    ///
    /// # Errors
    ///
    /// [`KernelError::Sandbox`] for an unknown id.
    pub fn unregister(&mut self, id: RegistrationId) -> Result<(), KernelError> {
        if !self.sandbox.contains(id) {
            return Err(SandboxError::UnknownRegistration(id).into());
        }
        self.scheduler.remove(id);
        if self.scheduler.contains(id) {
            debug!(%id, "unregister deferred to slot boundary");
            self.unregistering.insert(id);
        } else {
            self.sandbox.unregister(&mut self.bus, id)?;
        }
        Ok(())
    }

    /// Jumps to `id` now, cutting the active slot short.
    ///
    /// # Errors
    ///
    /// [`KernelError::NotRunning`] after shutdown.
    pub fn switch_to(&mut self, id: RegistrationId) -> Result<bool, KernelError> {
        self.ensure_open()?;
        let now = self.clock.now();
        let Some(transition) = self.scheduler.force(id, now) else {
            return Ok(false);
        };
        info!(%id, "operator switch");
        let mut faults = Vec::new();
        self.apply_transition(&transition, &mut faults);
        for fault in faults {
            self.absorb(fault);
        }
        Ok(true)
    }

    /// Runs one iteration without sleeping.
    ///
    /// # Errors
    ///
    /// [`KernelError::NotRunning`] once shutdown has begun.
    pub fn tick(&mut self) -> Result<TickReport, KernelError> {
        match self.state {
            KernelState::Ready => {
                info!(run_id = %self.ctx.run_id, "kernel running");
                self.state = KernelState::Running;
            }
            KernelState::Running => {}
            KernelState::ShuttingDown | KernelState::Stopped => return Err(KernelError::NotRunning),
        }

        let now = self.clock.now();
        let mut faults = self.sandbox.tick_liveness(&mut self.bus);

        let batch = self.bus.poll();
        let messages = batch.messages.len();
        for (id, evicted) in batch.evicted {
            self.stats.evicted_frames += evicted;
            faults.push(Fault::BusSaturated { id, evicted });
        }
        for envelope in batch.messages {
            self.dispatch(envelope.from, envelope.message, &mut faults);
        }

        let slot_began = self.scheduler.switched_at();
        let transition = self.scheduler.tick(now);
        if let Some(t) = &transition {
            self.apply_transition(t, &mut faults);
        }
        let activated = transition.as_ref().is_some_and(|t| t.activate.is_some());
        if !activated && self.scheduler.switched_at() != slot_began {
            self.reactivate_errored(&mut faults);
        }

        let (frame, source, sequence) = self.select_frame();
        let presented = self.present(&frame, &mut faults);
        if presented {
            self.stats.frames_presented += 1;
            if let (FrameSource::Worker(id), Some(seq)) = (source, sequence) {
                self.sandbox.mark_rendered(id, seq);
            }
            let origin = match source {
                FrameSource::Worker(id) => Some(id),
                FrameSource::Previous | FrameSource::Blank => None,
            };
            self.observer.publish(frame.clone(), origin);
            self.previous = Some(frame);
        }

        for fault in &faults {
            self.absorb(fault.clone());
        }
        self.stats.ticks += 1;

        Ok(TickReport {
            transition,
            source,
            faults,
            presented,
            messages,
        })
    }

    /// Runs until a shutdown request, then shuts down.
    ///
    /// # Errors
    ///
    /// [`KernelError::NotRunning`] if called after shutdown.
    pub fn run(&mut self) -> Result<RunSummary, KernelError> {
        self.run_for(None)
    }

    /// Runs at most `max_ticks` iterations (unbounded for `None`), paced to
    /// the target frame rate, then shuts down.
    ///
    /// # Errors
    ///
    /// [`KernelError::NotRunning`] if called after shutdown.
    pub fn run_for(&mut self, max_ticks: Option<u64>) -> Result<RunSummary, KernelError> {
        self.ensure_open()?;
        let interval = self.config.frame_interval();
        let mut ticks = 0_u64;
        info!(?interval, ?max_ticks, "render loop started");

        while !self.shutdown.is_requested() && max_ticks.map_or(true, |max| ticks < max) {
            let started = self.clock.now();
            self.tick()?;
            ticks += 1;

            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed >= interval {
                self.stats.overruns += 1;
                debug!(?elapsed, ?interval, "iteration overran");
            } else {
                self.clock.sleep(interval - elapsed);
            }
        }

        let shutdown = self.shutdown()?;
        Ok(RunSummary {
            stats: self.stats,
            shutdown,
        })
    }

    /// Stops every worker within the shutdown grace and clears the display.
    ///
    /// # Errors
    ///
    /// [`KernelError::NotRunning`] if already stopped.
    pub fn shutdown(&mut self) -> Result<ShutdownReport, KernelError> {
        if matches!(self.state, KernelState::ShuttingDown | KernelState::Stopped) {
            return Err(KernelError::NotRunning);
        }
        self.state = KernelState::ShuttingDown;
        info!(grace = ?self.config.shutdown_grace, "kernel shutting down");

        let report = self.sandbox.stop_all(&mut self.bus, self.config.shutdown_grace);
        if let Err(e) = self.sink.present(&Frame::blank(self.ctx.dimensions)) {
            debug!(error = %e, "could not clear display");
        }

        self.state = KernelState::Stopped;
        info!(stats = %self.stats, "kernel stopped");
        Ok(report)
    }

    /// A handle that stops [`run`](Self::run) from another thread.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Live view of presented frames.
    #[must_use]
    pub fn observer(&self) -> FrameObserver {
        self.observer.clone()
    }

    #[must_use]
    pub fn stats(&self) -> KernelStats {
        self.stats
    }

    #[must_use]
    pub fn state(&self) -> KernelState {
        self.state
    }

    #[must_use]
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    #[must_use]
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    #[must_use]
    pub fn active(&self) -> Option<RegistrationId> {
        self.scheduler.active()
    }

    fn ensure_open(&self) -> Result<(), KernelError> {
        match self.state {
            KernelState::Ready | KernelState::Running => Ok(()),
            KernelState::ShuttingDown | KernelState::Stopped => Err(KernelError::NotRunning),
        }
    }

    fn dispatch(&mut self, id: RegistrationId, message: WorkerMessage, faults: &mut Vec<Fault>) {
        match message {
            WorkerMessage::FrameReady { frame, sequence } => {
                if !frame.matches(self.ctx.dimensions) {
                    let reason = format!(
                        "frame is {}x{}, display is {}",
                        frame.width(),
                        frame.height(),
                        self.ctx.dimensions
                    );
                    self.worker_failed(id, &reason);
                    return;
                }
                if self.sandbox.record_frame(id, frame, sequence) == FrameOutcome::Stale {
                    self.stats.stale_frames += 1;
                    debug!(%id, sequence, "stale frame");
                }
            }
            WorkerMessage::Ready => {
                if self.sandbox.mark_ready(id) && self.scheduler.active() == Some(id) {
                    self.resume(id, faults);
                }
            }
            WorkerMessage::Error { reason } => self.worker_failed(id, &reason),
        }
    }

    /// Handles `APP_ERROR`, whether sent by the worker or synthesized.
    fn worker_failed(&mut self, id: RegistrationId, reason: &str) {
        if !self.sandbox.mark_errored(&mut self.bus, id, reason) {
            return;
        }
        self.stats.worker_errors += 1;
        error!(%id, %reason, policy = %self.config.error_policy, "worker error");
        if self.config.error_policy == ErrorPolicy::Skip && self.scheduler.remove(id) {
            info!(%id, "removed from rotation");
        }
    }

    fn absorb(&mut self, fault: Fault) {
        if fault.is_worker_fatal() {
            self.stats.worker_faults += 1;
        }
        match &fault {
            Fault::DisplaySinkFault { .. } => {}
            Fault::BusSaturated { id, evicted } => debug!(%id, evicted, "bus saturated"),
            _ => warn!(code = fault.code(), "{fault}"),
        }
        if let Some(id) = fault.registration() {
            if self.sandbox.handle(id).is_some_and(|h| h.is_abandoned()) && self.scheduler.remove(id) {
                warn!(%id, "abandoned worker removed from rotation");
            }
        }
    }

    fn apply_transition(&mut self, transition: &Transition, faults: &mut Vec<Fault>) {
        for &id in &transition.retired {
            let result = if self.unregistering.remove(&id) {
                self.sandbox.unregister(&mut self.bus, id)
            } else {
                self.sandbox.stop(&mut self.bus, id)
            };
            if let Err(e) = result {
                debug!(%id, error = %e, "retire");
            }
        }
        if let Some(id) = transition.deactivate {
            if let Err(e) = self.sandbox.pause(&self.bus, id) {
                self.control_failed(id, e, faults);
            }
        }
        if let Some(id) = transition.activate {
            self.activate(id, faults);
        }
    }

    /// Brings the incoming registration to `Running`, starting it lazily.
    fn activate(&mut self, id: RegistrationId, faults: &mut Vec<Fault>) {
        let Some(handle) = self.sandbox.handle(id) else {
            return;
        };
        if handle.is_abandoned() {
            self.scheduler.remove(id);
            return;
        }
        match handle.state() {
            WorkerState::Stopped | WorkerState::Errored => {
                let restart = handle.starts() > 0;
                match self.sandbox.start(&self.ctx, &mut self.bus, id) {
                    Ok(isolation) => {
                        if restart {
                            self.stats.restarts += 1;
                        }
                        debug!(%id, %isolation, restart, "started on activation");
                    }
                    Err(e) => {
                        self.stats.worker_errors += 1;
                        error!(%id, code = e.code(), error = %e, "start failed");
                    }
                }
            }
            WorkerState::Ready | WorkerState::Paused => self.resume(id, faults),
            WorkerState::Starting | WorkerState::Running | WorkerState::Stopping => {}
        }
    }

    /// A new slot went to the registration that already held the display.
    /// If it errored during the previous slot, that slot boundary is its
    /// next activation.
    fn reactivate_errored(&mut self, faults: &mut Vec<Fault>) {
        let Some(id) = self.scheduler.active() else {
            return;
        };
        if self.sandbox.handle(id).map(|h| h.state()) == Some(WorkerState::Errored) {
            debug!(%id, "slot renewed for errored worker");
            self.activate(id, faults);
        }
    }

    fn resume(&mut self, id: RegistrationId, faults: &mut Vec<Fault>) {
        if let Err(e) = self.sandbox.resume(&self.bus, id) {
            self.control_failed(id, e, faults);
        }
    }

    fn control_failed(&mut self, id: RegistrationId, e: SandboxError, faults: &mut Vec<Fault>) {
        match e {
            SandboxError::Bus(bus) => {
                let fault = Fault::from(bus);
                self.worker_failed(id, &fault.to_string());
                faults.push(fault);
            }
            other => debug!(%id, error = %other, "control skipped"),
        }
    }

    fn select_frame(&self) -> (Frame, FrameSource, Option<u64>) {
        if let Some(id) = self.scheduler.active() {
            let cached = self
                .sandbox
                .handle(id)
                .filter(|h| h.state() == WorkerState::Running)
                .and_then(|h| h.latest());
            if let Some(cached) = cached {
                return (cached.frame.clone(), FrameSource::Worker(id), Some(cached.sequence));
            }
        }
        match &self.previous {
            Some(frame) => (frame.clone(), FrameSource::Previous, None),
            None => (Frame::blank(self.ctx.dimensions), FrameSource::Blank, None),
        }
    }

    /// Presents with bounded retries. Returns `true` once acknowledged.
    fn present(&mut self, frame: &Frame, faults: &mut Vec<Fault>) -> bool {
        let mut last = None;
        for attempt in 0..=self.config.sink_retries {
            match self.sink.present(frame) {
                Ok(()) => return true,
                Err(DisplayError::Busy) => {
                    self.stats.frames_dropped += 1;
                    return false;
                }
                Err(e @ DisplayError::Failed(_)) => {
                    debug!(attempt, error = %e, "present failed");
                    last = Some(e);
                }
                Err(e) => {
                    last = Some(e);
                    break;
                }
            }
        }

        self.stats.sink_faults += 1;
        let detail = last.map_or_else(|| "present failed".to_string(), |e| e.to_string());
        warn!(sink = self.sink.name(), %detail, "display sink fault, showing blank");
        if matches!(self.sink.present(&Frame::blank(self.ctx.dimensions)), Ok(())) {
            self.previous = None;
        }
        faults.push(Fault::DisplaySinkFault { detail });
        false
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        if matches!(self.state, KernelState::Ready | KernelState::Running) && !self.sandbox.is_empty() {
            let _ = self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::display::MemorySink;
    use mxos_app::{App, AppContext, AppError};
    use mxos_types::{Dimensions, Rgb};
    use std::thread;
    use std::time::Instant;

    struct Solid {
        manifest: Manifest,
        color: Rgb,
    }

    impl App for Solid {
        fn manifest(&self) -> &Manifest {
            &self.manifest
        }
        fn update(&mut self) -> Result<(), AppError> {
            Ok(())
        }
        fn render(&mut self, canvas: &mut Frame) -> Result<(), AppError> {
            canvas.fill(self.color);
            Ok(())
        }
    }

    fn manifest() -> Manifest {
        Manifest::new("solid").with_frame_rate(100)
    }

    fn red(_: &AppContext) -> Box<dyn App> {
        Box::new(Solid {
            manifest: manifest(),
            color: Rgb::RED,
        })
    }

    fn kernel(clock: &ManualClock) -> Kernel {
        KernelBuilder::new()
            .with_dimensions(Dimensions::new(4, 2))
            .with_clock(Arc::new(clock.clone()))
            .with_config(KernelConfig {
                sink_budget: Duration::from_millis(200),
                ..KernelConfig::default()
            })
            .build()
            .expect("build")
    }

    /// Ticks (with real sleeps) until `cond` holds.
    fn tick_until(kernel: &mut Kernel, mut cond: impl FnMut(&Kernel, &TickReport) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let report = kernel.tick().expect("tick");
            if cond(kernel, &report) {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("condition not reached: {kernel:?}");
    }

    #[test]
    fn build_rejects_bad_config() {
        let err = KernelBuilder::new()
            .with_dimensions(Dimensions::new(0, 4))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "KERNEL_INVALID_CONFIG");

        let err = KernelBuilder::new()
            .with_config(KernelConfig {
                target_fps: 0,
                ..KernelConfig::default()
            })
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "KERNEL_INVALID_CONFIG");
    }

    #[test]
    fn empty_rotation_shows_blank() {
        let clock = ManualClock::new();
        let mut kernel = kernel(&clock);
        let report = kernel.tick().expect("tick");
        assert_eq!(kernel.state(), KernelState::Running);
        assert_eq!(report.source, FrameSource::Blank);
        assert!(report.presented);
        assert!(report.transition.is_none());
    }

    #[test]
    fn active_worker_frame_is_presented() {
        let clock = ManualClock::new();
        let mut kernel = kernel(&clock);
        let id = kernel
            .register(AppImpl::new("red", red), manifest(), Duration::from_secs(10))
            .expect("register");

        let first = kernel.tick().expect("tick");
        assert_eq!(
            first.transition.as_ref().and_then(|t| t.activate),
            Some(id)
        );
        tick_until(&mut kernel, |_, r| r.source == FrameSource::Worker(id));

        let seen = kernel.observer().latest().expect("published");
        assert_eq!(seen.source, Some(id));
        assert_eq!(seen.frame.pixel(3, 1), Some(Rgb::RED));
        assert_eq!(kernel.sandbox().running_count(), 1);

        let report = kernel.shutdown().expect("shutdown");
        assert!(report.is_clean());
        assert_eq!(kernel.state(), KernelState::Stopped);
        assert_eq!(kernel.tick().unwrap_err(), KernelError::NotRunning);
    }

    #[test]
    fn unknown_kind_is_an_app_error() {
        let clock = ManualClock::new();
        let mut kernel = kernel(&clock);
        let err = kernel
            .register_kind("nope", Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err, KernelError::App(AppError::UnknownApp("nope".into())));
    }

    #[test]
    fn shutdown_handle_stops_run() {
        let clock = ManualClock::new();
        let mut kernel = kernel(&clock);
        let handle = kernel.shutdown_handle();
        handle.request();
        let summary = kernel.run().expect("run");
        assert_eq!(summary.stats.ticks, 0);
        assert_eq!(kernel.state(), KernelState::Stopped);
    }

    #[test]
    fn run_for_paces_with_the_clock() {
        let clock = ManualClock::new();
        let start = clock.now();
        let mut kernel = kernel(&clock);
        let summary = kernel.run_for(Some(60)).expect("run");
        assert_eq!(summary.stats.ticks, 60);
        assert_eq!(summary.stats.overruns, 0);
        let elapsed = clock.elapsed_since(start);
        assert!(elapsed >= Duration::from_millis(990), "{elapsed:?}");
    }

    #[test]
    fn sink_failures_fall_back_to_blank() {
        let clock = ManualClock::new();
        let sink = MemorySink::new().with_failures(3);
        let frames = sink.handle();
        let mut kernel = KernelBuilder::new()
            .with_dimensions(Dimensions::new(2, 2))
            .with_clock(Arc::new(clock))
            .with_sink(Box::new(sink))
            .with_config(KernelConfig {
                sink_budget: Duration::from_millis(200),
                sink_retries: 2,
                ..KernelConfig::default()
            })
            .build()
            .expect("build");

        let report = kernel.tick().expect("tick");
        assert!(!report.presented);
        assert!(matches!(report.faults.as_slice(), [Fault::DisplaySinkFault { .. }]));
        assert_eq!(kernel.stats().sink_faults, 1);
        // The fallback blank frame got through.
        assert_eq!(frames.len(), 1);
        assert!(frames.last().expect("frame").is_blank());

        assert!(kernel.tick().expect("tick").presented);
    }

    #[test]
    fn error_policy_parses() {
        assert_eq!("skip".parse::<ErrorPolicy>(), Ok(ErrorPolicy::Skip));
        assert_eq!(" Retry ".parse::<ErrorPolicy>(), Ok(ErrorPolicy::Retry));
        assert!("ignore".parse::<ErrorPolicy>().is_err());
        assert_eq!(KernelConfig::default().frame_interval(), Duration::from_secs(1) / 60);
    }
}
