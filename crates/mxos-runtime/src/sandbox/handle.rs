//! Per-registration worker handle.

use super::process::ProcessWorker;
use super::thread::ThreadWorker;
use super::IsolationKind;
use mxos_app::{AppImpl, Manifest, WorkerState};
use mxos_types::{Frame, RegistrationId};
use std::time::{Duration, Instant};

/// The newest frame received from a worker instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFrame {
    pub frame: Frame,
    pub sequence: u64,
}

/// A live worker, tagged by isolation kind.
#[derive(Debug)]
pub(crate) enum WorkerRuntime {
    Thread(ThreadWorker),
    Process(ProcessWorker),
}

/// Sandbox-side record of one registration.
///
/// Outlives its worker instances: a retried registration gets a fresh
/// instance (and a fresh sequence space) on the same handle.
#[derive(Debug)]
pub struct WorkerHandle {
    pub(crate) id: RegistrationId,
    pub(crate) implementation: AppImpl,
    pub(crate) manifest: Manifest,
    pub(crate) duration: Duration,
    pub(crate) isolation: IsolationKind,
    pub(crate) state: WorkerState,
    pub(crate) latest: Option<CachedFrame>,
    pub(crate) last_rendered: u64,
    /// `APP_START` already sent to the current instance.
    pub(crate) activated: bool,
    pub(crate) abandoned: bool,
    /// The current instance's failure has been handed to the kernel.
    pub(crate) failure_reported: bool,
    pub(crate) last_error: Option<String>,
    pub(crate) starts: u32,
    pub(crate) ready_deadline: Option<Instant>,
    pub(crate) last_activity: Instant,
    pub(crate) runtime: Option<WorkerRuntime>,
}

impl WorkerHandle {
    pub(crate) fn new(
        id: RegistrationId,
        implementation: AppImpl,
        manifest: Manifest,
        duration: Duration,
        isolation: IsolationKind,
    ) -> Self {
        Self {
            id,
            implementation,
            manifest,
            duration,
            isolation,
            state: WorkerState::Stopped,
            latest: None,
            last_rendered: 0,
            activated: false,
            abandoned: false,
            failure_reported: false,
            last_error: None,
            starts: 0,
            ready_deadline: None,
            last_activity: Instant::now(),
            runtime: None,
        }
    }

    /// Resets per-instance fields for a new start.
    pub(crate) fn begin_instance(&mut self, now: Instant, start_timeout: Duration) {
        self.state = WorkerState::Starting;
        self.latest = None;
        self.last_rendered = 0;
        self.activated = false;
        self.failure_reported = false;
        self.last_error = None;
        self.starts += 1;
        self.ready_deadline = Some(now + start_timeout);
        self.last_activity = now;
    }

    #[must_use]
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.implementation.kind
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn isolation(&self) -> IsolationKind {
        self.isolation
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    #[must_use]
    pub fn latest(&self) -> Option<&CachedFrame> {
        self.latest.as_ref()
    }

    /// Sequence of the last frame handed to the display.
    #[must_use]
    pub fn last_rendered(&self) -> u64 {
        self.last_rendered
    }

    /// The cached frame, if it has not been rendered yet.
    #[must_use]
    pub fn fresh_frame(&self) -> Option<&CachedFrame> {
        self.latest
            .as_ref()
            .filter(|cached| cached.sequence > self.last_rendered)
    }

    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Number of instances started so far.
    #[must_use]
    pub fn starts(&self) -> u32 {
        self.starts
    }

    /// How long a running worker may stay silent before it counts as
    /// unresponsive.
    pub(crate) fn silence_limit(&self, unresponsive_timeout: Duration) -> Duration {
        unresponsive_timeout.max(self.manifest.frame_interval() * 3)
    }
}
