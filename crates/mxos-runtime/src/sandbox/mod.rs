//! Worker lifecycle and isolation.
//!
//! The sandbox owns every [`WorkerHandle`]: it registers applications,
//! spawns their workers, wires them to the bus, watches their liveness and
//! stops them. Nothing here blocks the render loop except
//! [`Sandbox::stop_all`], which is bounded and only used at shutdown.
//!
//! # Isolation
//!
//! | Capabilities | Isolation |
//! |--------------|-----------|
//! | none, `system_info` | THREAD |
//! | any of `network`, `filesystem` | PROCESS |
//!
//! [`IsolationPolicy::AlwaysProcess`] puts every worker in a process.
//!
//! # Failure containment
//!
//! [`Sandbox::tick_liveness`] turns every worker failure it can observe
//! (start timeout, unexpected exit, silence) into a [`Fault`] plus a
//! synthesized `APP_ERROR` on that worker's bus route. The kernel handles
//! that `APP_ERROR` exactly like one the worker sent itself, by calling
//! [`Sandbox::mark_errored`].
//!
//! # Stopping
//!
//! A stopped or failed worker is moved to a retiring list with a deadline.
//! Each `tick_liveness` reaps what has exited; at the deadline a process
//! gets SIGTERM, then SIGKILL after `kill_grace`; a thread is abandoned and
//! its registration is never started again.

mod error;
mod handle;
mod process;
mod thread;

pub use error::SandboxError;
pub use handle::{CachedFrame, WorkerHandle};

use crate::bus::{BusError, MessageBus};
use crate::fault::Fault;
use crate::kernel::RunContext;
use crate::worker::{WorkerExit, EXIT_APP_FAILED};
use handle::WorkerRuntime;
use mxos_app::{AppContext, AppImpl, Capability, Manifest, WorkerState};
use mxos_event::{ControlMessage, WorkerMessage};
use mxos_types::{ErrorCode, Frame, RegistrationId};
use process::ProcessWorker;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thread::ThreadWorker;
use tracing::{debug, info, warn};

/// Bound on reaping a child after SIGKILL.
const KILL_REAP: Duration = Duration::from_millis(100);

/// Polling interval of [`Sandbox::stop_all`].
const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

/// How isolation is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationPolicy {
    /// THREAD unless the manifest declares external I/O.
    #[default]
    Hybrid,
    /// PROCESS for every worker.
    #[serde(rename = "process")]
    AlwaysProcess,
}

impl IsolationPolicy {
    /// Isolation for a capability set under this policy.
    ///
    /// ```
    /// use mxos_app::Capability;
    /// use mxos_runtime::sandbox::{IsolationKind, IsolationPolicy};
    ///
    /// let policy = IsolationPolicy::Hybrid;
    /// assert_eq!(policy.isolation_for(Capability::SYSTEM_INFO), IsolationKind::Thread);
    /// assert_eq!(policy.isolation_for(Capability::NETWORK), IsolationKind::Process);
    /// ```
    #[must_use]
    pub fn isolation_for(self, capabilities: Capability) -> IsolationKind {
        match self {
            Self::AlwaysProcess => IsolationKind::Process,
            Self::Hybrid if capabilities.requires_process_isolation() => IsolationKind::Process,
            Self::Hybrid => IsolationKind::Thread,
        }
    }
}

impl fmt::Display for IsolationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hybrid => f.pad("hybrid"),
            Self::AlwaysProcess => f.pad("process"),
        }
    }
}

impl FromStr for IsolationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "process" | "always_process" => Ok(Self::AlwaysProcess),
            other => Err(format!("expected 'hybrid' or 'process', got '{other}'")),
        }
    }
}

/// Isolation strength of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationKind {
    Thread,
    Process,
}

impl fmt::Display for IsolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thread => f.pad("thread"),
            Self::Process => f.pad("process"),
        }
    }
}

/// Program and leading arguments used to launch a PROCESS worker.
///
/// The sandbox appends `--app <kind> --registration <n> --width <w>
/// --height <h> --run-id <uuid>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The running executable with the `worker` subcommand.
    ///
    /// # Errors
    ///
    /// Returns the error from [`std::env::current_exe`].
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).arg("worker"))
    }
}

/// Sandbox timeouts and isolation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Longest wait for `APP_READY` after a start.
    pub start_timeout: Duration,
    /// Time a worker gets to exit after `APP_STOP`.
    pub stop_grace: Duration,
    /// Time a process gets between SIGTERM and SIGKILL.
    pub kill_grace: Duration,
    /// Silence after which a running worker counts as unresponsive
    /// (never less than three frame intervals).
    pub unresponsive_timeout: Duration,
    pub isolation: IsolationPolicy,
    /// Command for PROCESS workers; `None` means the current executable.
    pub worker_command: Option<WorkerCommand>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            start_timeout: Duration::from_secs(2),
            stop_grace: Duration::from_secs(2),
            kill_grace: Duration::from_millis(500),
            unresponsive_timeout: Duration::from_secs(5),
            isolation: IsolationPolicy::Hybrid,
            worker_command: None,
        }
    }
}

/// What happened to a frame handed to [`Sandbox::record_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Newest frame of the instance; cached.
    Accepted,
    /// Sequence not above the cached or last rendered one; discarded.
    Stale,
    /// No live instance to attribute it to; discarded.
    Ignored,
}

/// Result of [`Sandbox::stop_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Exited on their own within the grace period.
    pub stopped: Vec<RegistrationId>,
    /// Processes that needed SIGTERM or SIGKILL.
    pub forced: Vec<RegistrationId>,
    /// Threads that never returned.
    pub abandoned: Vec<RegistrationId>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.forced.is_empty() && self.abandoned.is_empty()
    }
}

#[derive(Debug)]
struct Retiring {
    id: RegistrationId,
    /// `starts` of the instance, to tell it apart from a newer one.
    instance: u32,
    runtime: WorkerRuntime,
    deadline: Instant,
    terminated: bool,
}

/// Owner of all worker handles.
#[derive(Debug)]
pub struct Sandbox {
    config: SandboxConfig,
    handles: BTreeMap<RegistrationId, WorkerHandle>,
    retiring: Vec<Retiring>,
    next_id: RegistrationId,
}

impl Sandbox {
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            handles: BTreeMap::new(),
            retiring: Vec::new(),
            next_id: RegistrationId::new(1),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Records an application for rotation. Starts nothing.
    ///
    /// # Errors
    ///
    /// - [`SandboxError::InvalidManifest`] if the manifest fails validation
    /// - [`SandboxError::InvalidDuration`] for a zero duration
    pub fn register(
        &mut self,
        implementation: AppImpl,
        manifest: Manifest,
        duration: Duration,
    ) -> Result<RegistrationId, SandboxError> {
        manifest.validate().map_err(SandboxError::InvalidManifest)?;
        if duration.is_zero() {
            return Err(SandboxError::InvalidDuration);
        }

        let id = self.next_id;
        self.next_id = id.next();
        let isolation = self.config.isolation.isolation_for(manifest.capabilities);
        info!(
            %id,
            kind = %implementation.kind,
            %isolation,
            capabilities = %manifest.capabilities,
            "registered"
        );
        self.handles.insert(
            id,
            WorkerHandle::new(id, implementation, manifest, duration, isolation),
        );
        Ok(id)
    }

    /// Stops (if needed) and forgets a registration.
    ///
    /// # Errors
    ///
    /// [`SandboxError::UnknownRegistration`].
    pub fn unregister(&mut self, bus: &mut MessageBus, id: RegistrationId) -> Result<(), SandboxError> {
        self.stop(bus, id)?;
        self.handles.remove(&id);
        bus.remove(id);
        debug!(%id, "unregistered");
        Ok(())
    }

    /// Spawns a worker instance and returns immediately.
    ///
    /// The handle is `Starting` until `APP_READY` arrives; if it does not
    /// arrive within `start_timeout`, [`tick_liveness`](Self::tick_liveness)
    /// faults the worker.
    ///
    /// # Errors
    ///
    /// - [`SandboxError::UnknownRegistration`]
    /// - [`SandboxError::Abandoned`] if a previous instance was abandoned
    /// - [`SandboxError::InvalidState`] if an instance is alive
    /// - [`SandboxError::Spawn`] if the thread or process cannot be created;
    ///   the handle is then `Errored`
    pub fn start(
        &mut self,
        ctx: &RunContext,
        bus: &mut MessageBus,
        id: RegistrationId,
    ) -> Result<IsolationKind, SandboxError> {
        let handle = self
            .handles
            .get_mut(&id)
            .ok_or(SandboxError::UnknownRegistration(id))?;
        if handle.abandoned {
            return Err(SandboxError::Abandoned(id));
        }
        if handle.state.is_alive() {
            return Err(SandboxError::InvalidState {
                id,
                state: handle.state,
                op: "start",
            });
        }

        handle.begin_instance(Instant::now(), self.config.start_timeout);
        let port = bus.open(id);
        let spawned = match handle.isolation {
            IsolationKind::Thread => {
                let app_ctx = AppContext::new(ctx.dimensions, id);
                ThreadWorker::spawn(handle.implementation.clone(), app_ctx, port).map(WorkerRuntime::Thread)
            }
            IsolationKind::Process => {
                let command = match &self.config.worker_command {
                    Some(command) => Ok(command.clone()),
                    None => WorkerCommand::current_exe(),
                };
                command
                    .and_then(|command| ProcessWorker::spawn(&command, &handle.implementation.kind, ctx, port))
                    .map(WorkerRuntime::Process)
            }
        };

        match spawned {
            Ok(runtime) => {
                if let WorkerRuntime::Process(p) = &runtime {
                    debug!(%id, pid = p.pid(), "process worker");
                }
                handle.runtime = Some(runtime);
                info!(%id, kind = %handle.implementation.kind, isolation = %handle.isolation, instance = handle.starts, "worker starting");
                Ok(handle.isolation)
            }
            Err(e) => {
                bus.remove(id);
                let reason = e.to_string();
                warn!(%id, error = %reason, "spawn failed");
                handle.state = WorkerState::Errored;
                handle.ready_deadline = None;
                handle.last_error = Some(reason.clone());
                Err(SandboxError::Spawn { id, reason })
            }
        }
    }

    /// Records `APP_READY`. Returns `true` if the handle left `Starting`.
    pub fn mark_ready(&mut self, id: RegistrationId) -> bool {
        let Some(handle) = self.handles.get_mut(&id) else {
            return false;
        };
        if handle.state != WorkerState::Starting {
            debug!(%id, state = %handle.state, "ignoring APP_READY");
            return false;
        }
        handle.state = WorkerState::Ready;
        handle.ready_deadline = None;
        handle.last_activity = Instant::now();
        debug!(%id, "ready");
        true
    }

    /// Makes a started worker render: `APP_START` the first time, then
    /// `APP_RESUME`.
    ///
    /// # Errors
    ///
    /// - [`SandboxError::UnknownRegistration`]
    /// - [`SandboxError::InvalidState`] unless `Ready`, `Paused` or `Running`
    /// - [`SandboxError::Bus`] if the control message could not be queued
    pub fn resume(&mut self, bus: &MessageBus, id: RegistrationId) -> Result<(), SandboxError> {
        let handle = self
            .handles
            .get_mut(&id)
            .ok_or(SandboxError::UnknownRegistration(id))?;
        match handle.state {
            WorkerState::Running => return Ok(()),
            WorkerState::Ready | WorkerState::Paused => {}
            state => {
                return Err(SandboxError::InvalidState {
                    id,
                    state,
                    op: "resume",
                })
            }
        }
        let message = if handle.activated {
            ControlMessage::Resume
        } else {
            ControlMessage::Start
        };
        bus.send(id, message)?;
        handle.activated = true;
        handle.state = WorkerState::Running;
        handle.last_activity = Instant::now();
        debug!(%id, kind = message.kind(), "running");
        Ok(())
    }

    /// Stops a running worker from rendering. A no-op unless `Running`.
    ///
    /// # Errors
    ///
    /// [`SandboxError::UnknownRegistration`] or [`SandboxError::Bus`].
    pub fn pause(&mut self, bus: &MessageBus, id: RegistrationId) -> Result<(), SandboxError> {
        let handle = self
            .handles
            .get_mut(&id)
            .ok_or(SandboxError::UnknownRegistration(id))?;
        if handle.state != WorkerState::Running {
            return Ok(());
        }
        bus.send(id, ControlMessage::Pause)?;
        handle.state = WorkerState::Paused;
        debug!(%id, "paused");
        Ok(())
    }

    /// Sends `APP_STOP` and hands the worker to the retiring list.
    ///
    /// Returns immediately. The handle is `Stopping` until the worker has
    /// exited (or been forced), then `Stopped`.
    ///
    /// # Errors
    ///
    /// [`SandboxError::UnknownRegistration`].
    pub fn stop(&mut self, bus: &mut MessageBus, id: RegistrationId) -> Result<(), SandboxError> {
        let handle = self
            .handles
            .get_mut(&id)
            .ok_or(SandboxError::UnknownRegistration(id))?;
        if !handle.state.is_alive() || handle.state == WorkerState::Stopping {
            return Ok(());
        }
        if let Err(e) = bus.send(id, ControlMessage::Stop) {
            debug!(%id, error = %e, "APP_STOP not delivered");
        }
        handle.state = if handle.runtime.is_some() {
            WorkerState::Stopping
        } else {
            WorkerState::Stopped
        };
        handle.ready_deadline = None;
        info!(%id, "stopping");
        self.retire(bus, id);
        Ok(())
    }

    /// Records a worker failure reported over the bus, whether the worker
    /// sent it or [`tick_liveness`](Self::tick_liveness) synthesized it.
    ///
    /// Tears down the instance. Returns `true` the first time a failure of
    /// the current instance is recorded here.
    pub fn mark_errored(&mut self, bus: &mut MessageBus, id: RegistrationId, reason: &str) -> bool {
        let Some(handle) = self.handles.get_mut(&id) else {
            return false;
        };
        if matches!(handle.state, WorkerState::Stopped | WorkerState::Stopping) {
            return false;
        }
        if handle.state != WorkerState::Errored {
            handle.state = WorkerState::Errored;
            handle.last_error = Some(reason.to_string());
            warn!(%id, %reason, "worker errored");
        }
        let first = !handle.failure_reported;
        handle.failure_reported = true;
        handle.ready_deadline = None;
        self.retire(bus, id);
        first
    }

    /// Caches a frame if it is the newest of the current instance.
    pub fn record_frame(&mut self, id: RegistrationId, frame: Frame, sequence: u64) -> FrameOutcome {
        let Some(handle) = self.handles.get_mut(&id) else {
            return FrameOutcome::Ignored;
        };
        if !matches!(handle.state, WorkerState::Running | WorkerState::Paused) {
            return FrameOutcome::Ignored;
        }
        handle.last_activity = Instant::now();
        let cached = handle.latest.as_ref().map_or(0, |c| c.sequence);
        if sequence <= cached.max(handle.last_rendered) {
            return FrameOutcome::Stale;
        }
        handle.latest = Some(CachedFrame { frame, sequence });
        FrameOutcome::Accepted
    }

    /// Records that the frame with `sequence` reached the display.
    pub fn mark_rendered(&mut self, id: RegistrationId, sequence: u64) {
        if let Some(handle) = self.handles.get_mut(&id) {
            handle.last_rendered = handle.last_rendered.max(sequence);
        }
    }

    /// Once-per-iteration health check.
    ///
    /// Detects start timeouts, unexpected exits and silent running workers,
    /// synthesizes `APP_ERROR` for each, and reaps retiring workers.
    pub fn tick_liveness(&mut self, bus: &mut MessageBus) -> Vec<Fault> {
        let now = Instant::now();
        let mut faults = Vec::new();

        for handle in self.handles.values_mut() {
            let Some(fault) = detect(handle, now, &self.config) else {
                continue;
            };
            warn!(id = %handle.id, code = fault.code(), "{fault}");
            handle.state = WorkerState::Errored;
            handle.ready_deadline = None;
            handle.last_error = Some(fault.to_string());
            if let Err(e) = bus.inject(handle.id, WorkerMessage::error(fault.to_string())) {
                debug!(id = %handle.id, error = %e, "could not synthesize APP_ERROR");
            }
            faults.push(fault);
        }

        self.reap(now, &mut faults);
        faults
    }

    /// Stops every worker within `grace` (+ `kill_grace` for processes).
    ///
    /// Blocks. Used at shutdown only.
    pub fn stop_all(&mut self, bus: &mut MessageBus, grace: Duration) -> ShutdownReport {
        let started = Instant::now();
        let deadline = started + grace;
        let mut report = ShutdownReport::default();

        let live: Vec<RegistrationId> = self
            .handles
            .values()
            .filter(|h| h.runtime.is_some())
            .map(|h| h.id)
            .collect();
        for id in live {
            if let Err(e) = bus.send(id, ControlMessage::Stop) {
                debug!(%id, error = %e, "APP_STOP not delivered");
            }
            if let Some(handle) = self.handles.get_mut(&id) {
                if handle.state.is_alive() {
                    handle.state = WorkerState::Stopping;
                }
            }
            self.retire(bus, id);
        }
        for r in &mut self.retiring {
            r.deadline = r.deadline.min(deadline);
        }
        info!(workers = self.retiring.len(), ?grace, "stopping all workers");

        // Phase 1: cooperative exit.
        while !self.retiring.is_empty() && Instant::now() < deadline {
            let mut pending = Vec::new();
            for r in std::mem::take(&mut self.retiring) {
                match self.try_finish(r) {
                    Ok(id) => report.stopped.push(id),
                    Err(r) => pending.push(r),
                }
            }
            self.retiring = pending;
            if !self.retiring.is_empty() {
                std::thread::sleep(SHUTDOWN_POLL);
            }
        }

        // Phase 2: SIGTERM stragglers, abandon threads.
        let mut processes = Vec::new();
        for r in std::mem::take(&mut self.retiring) {
            let Retiring {
                id,
                instance,
                runtime,
                ..
            } = r;
            match runtime {
                WorkerRuntime::Thread(t) if t.is_finished() => {
                    t.join();
                    self.finish(id, instance);
                    report.stopped.push(id);
                }
                WorkerRuntime::Thread(t) => {
                    t.abandon();
                    self.abandon(id);
                    report.abandoned.push(id);
                }
                WorkerRuntime::Process(mut p) => {
                    p.terminate();
                    processes.push((id, instance, p));
                }
            }
        }

        // Phase 3: SIGKILL whatever ignored SIGTERM.
        report.forced = processes.iter().map(|(id, _, _)| *id).collect();
        let kill_deadline = Instant::now() + self.config.kill_grace;
        loop {
            let mut running = Vec::new();
            for (id, instance, mut p) in processes {
                if matches!(p.try_wait(), Ok(None)) {
                    running.push((id, instance, p));
                } else {
                    p.release();
                    self.finish(id, instance);
                }
            }
            processes = running;
            if processes.is_empty() || Instant::now() >= kill_deadline {
                break;
            }
            std::thread::sleep(SHUTDOWN_POLL);
        }
        for (id, instance, mut p) in processes {
            warn!(%id, pid = p.pid(), "killing worker process");
            p.kill(KILL_REAP);
            p.release();
            self.finish(id, instance);
        }
        for handle in self.handles.values_mut() {
            if handle.state.is_alive() {
                handle.state = WorkerState::Stopped;
            }
        }

        report.elapsed = started.elapsed();
        if report.is_clean() {
            info!(elapsed = ?report.elapsed, "all workers stopped");
        } else {
            warn!(
                forced = ?report.forced,
                abandoned = ?report.abandoned,
                elapsed = ?report.elapsed,
                "shutdown needed force"
            );
        }
        report
    }

    #[must_use]
    pub fn handle(&self, id: RegistrationId) -> Option<&WorkerHandle> {
        self.handles.get(&id)
    }

    pub fn handles(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.handles.values()
    }

    #[must_use]
    pub fn contains(&self, id: RegistrationId) -> bool {
        self.handles.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Number of handles in `Running`. Never more than one under the kernel.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.handles
            .values()
            .filter(|h| h.state == WorkerState::Running)
            .count()
    }

    /// Workers exited or not yet reaped.
    #[must_use]
    pub fn retiring_count(&self) -> usize {
        self.retiring.len()
    }

    /// Closes the route and moves the runtime to the retiring list.
    fn retire(&mut self, bus: &mut MessageBus, id: RegistrationId) {
        bus.remove(id);
        let Some(handle) = self.handles.get_mut(&id) else {
            return;
        };
        if let Some(runtime) = handle.runtime.take() {
            self.retiring.push(Retiring {
                id,
                instance: handle.starts,
                runtime,
                deadline: Instant::now() + self.config.stop_grace,
                terminated: false,
            });
        } else if handle.state == WorkerState::Stopping {
            handle.state = WorkerState::Stopped;
        }
    }

    fn reap(&mut self, now: Instant, faults: &mut Vec<Fault>) {
        let mut pending = Vec::new();
        for r in std::mem::take(&mut self.retiring) {
            let r = match self.try_finish(r) {
                Ok(_) => continue,
                Err(r) => r,
            };
            if now < r.deadline {
                pending.push(r);
                continue;
            }

            let Retiring {
                id,
                instance,
                runtime,
                terminated,
                ..
            } = r;
            match runtime {
                WorkerRuntime::Thread(t) => {
                    t.abandon();
                    self.abandon(id);
                    faults.push(Fault::ShutdownTimeout {
                        id,
                        grace: self.config.stop_grace,
                    });
                }
                WorkerRuntime::Process(mut p) if !terminated => {
                    debug!(%id, pid = p.pid(), "SIGTERM");
                    p.terminate();
                    pending.push(Retiring {
                        id,
                        instance,
                        runtime: WorkerRuntime::Process(p),
                        deadline: now + self.config.kill_grace,
                        terminated: true,
                    });
                }
                WorkerRuntime::Process(mut p) => {
                    warn!(%id, pid = p.pid(), "killing worker process");
                    p.kill(KILL_REAP);
                    p.release();
                    self.finish(id, instance);
                    faults.push(Fault::ShutdownTimeout {
                        id,
                        grace: self.config.stop_grace + self.config.kill_grace,
                    });
                }
            }
        }
        self.retiring = pending;
    }

    /// Reaps `r` if its worker has exited.
    fn try_finish(&mut self, r: Retiring) -> Result<RegistrationId, Retiring> {
        let Retiring {
            id,
            instance,
            runtime,
            deadline,
            terminated,
        } = r;
        match runtime {
            WorkerRuntime::Thread(t) if t.is_finished() => {
                let exit = t.join();
                debug!(%id, ?exit, "worker thread reaped");
            }
            WorkerRuntime::Process(mut p) => {
                if matches!(p.try_wait(), Ok(None)) {
                    return Err(Retiring {
                        id,
                        instance,
                        runtime: WorkerRuntime::Process(p),
                        deadline,
                        terminated,
                    });
                }
                debug!(%id, "worker process reaped");
                p.release();
            }
            runtime @ WorkerRuntime::Thread(_) => {
                return Err(Retiring {
                    id,
                    instance,
                    runtime,
                    deadline,
                    terminated,
                })
            }
        }
        self.finish(id, instance);
        Ok(id)
    }

    fn finish(&mut self, id: RegistrationId, instance: u32) {
        if let Some(handle) = self.handles.get_mut(&id) {
            if handle.starts == instance && handle.state == WorkerState::Stopping {
                handle.state = WorkerState::Stopped;
            }
        }
    }

    fn abandon(&mut self, id: RegistrationId) {
        if let Some(handle) = self.handles.get_mut(&id) {
            handle.abandoned = true;
            if handle.state == WorkerState::Stopping {
                handle.state = WorkerState::Stopped;
            }
            warn!(%id, "registration abandoned");
        }
    }
}

/// Checks one handle for a fault. Reaps a worker that exited on its own.
fn detect(handle: &mut WorkerHandle, now: Instant, config: &SandboxConfig) -> Option<Fault> {
    let id = handle.id;
    if !handle.state.is_alive() || handle.state == WorkerState::Stopping {
        return None;
    }

    if let Some(detail) = exited(handle) {
        return detail.map(|detail| Fault::WorkerCrashed { id, detail });
    }

    if handle.state == WorkerState::Starting {
        if let Some(deadline) = handle.ready_deadline {
            if now >= deadline {
                return Some(Fault::WorkerStartTimeout {
                    id,
                    timeout: config.start_timeout,
                });
            }
        }
    }

    if handle.state == WorkerState::Running {
        let limit = handle.silence_limit(config.unresponsive_timeout);
        let silent = now.saturating_duration_since(handle.last_activity);
        if silent >= limit {
            return Some(Fault::WorkerUnresponsive {
                id,
                detail: format!("no message for {silent:?}"),
            });
        }
    }
    None
}

/// `None`: still running. `Some(None)`: exited after reporting its own
/// failure. `Some(Some(detail))`: exited unexpectedly.
fn exited(handle: &mut WorkerHandle) -> Option<Option<String>> {
    let detail = match handle.runtime.as_mut()? {
        WorkerRuntime::Thread(t) => {
            if !t.is_finished() {
                return None;
            }
            let Some(WorkerRuntime::Thread(t)) = handle.runtime.take() else {
                return None;
            };
            match t.join() {
                WorkerExit::Failed(_) => None,
                exit => Some(format!("worker thread exited unexpectedly ({exit:?})")),
            }
        }
        WorkerRuntime::Process(p) => {
            let status = match p.try_wait() {
                Ok(None) => return None,
                Ok(Some(status)) => status,
                Err(e) => {
                    warn!(id = %handle.id, error = %e, "cannot query worker process");
                    return None;
                }
            };
            if let Some(WorkerRuntime::Process(p)) = handle.runtime.take() {
                p.release();
            }
            match status.code() {
                Some(EXIT_APP_FAILED) => None,
                _ => Some(format!("worker process exited: {status}")),
            }
        }
    };
    Some(detail)
}

impl From<BusError> for Fault {
    fn from(e: BusError) -> Self {
        match e {
            BusError::Saturated { id, timeout } => Fault::WorkerUnresponsive {
                id,
                detail: format!("control channel saturated for {timeout:?}"),
            },
            BusError::WorkerClosed(id) | BusError::UnknownWorker(id) => Fault::WorkerCrashed {
                id,
                detail: e.to_string(),
            },
        }
    }
}
