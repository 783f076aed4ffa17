//! PROCESS isolation: the worker harness in a child process.
//!
//! ```text
//!  parent                                   child (`mxos worker ...`)
//!  ┌──────────────┐  stdin (JSON lines)   ┌───────────────┐
//!  │ writer pump  │ ────────────────────► │ stdin reader  │
//!  │  (downlink)  │                       │      │        │
//!  │              │                       │   harness     │
//!  │ reader pump  │ ◄──────────────────── │      │        │
//!  │  (uplink)    │  stdout (JSON lines)  │ stdout writer │
//!  └──────────────┘                       └───────────────┘
//!        stderr is inherited: child logs go to the parent's stderr
//! ```
//!
//! Closing the bus route stops the writer pump, which closes the child's
//! stdin; the child treats EOF as `APP_STOP`.

use super::WorkerCommand;
use crate::bus::{BusError, Downlink, Uplink, WorkerPort};
use crate::kernel::RunContext;
use mxos_event::codec::{write_message, LineReader};
use mxos_event::WorkerMessage;
use mxos_types::RegistrationId;
use std::io::{self, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often the writer pump re-checks for route closure.
const PUMP_POLL: Duration = Duration::from_millis(100);

/// Interval between `try_wait` calls while reaping.
const REAP_POLL: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub(crate) struct ProcessWorker {
    id: RegistrationId,
    child: Child,
    pumps: Vec<JoinHandle<()>>,
}

impl ProcessWorker {
    pub(crate) fn spawn(
        command: &WorkerCommand,
        kind: &str,
        ctx: &RunContext,
        port: WorkerPort,
    ) -> io::Result<Self> {
        let id = port.id();
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .arg("--app")
            .arg(kind)
            .arg("--registration")
            .arg(id.get().to_string())
            .arg("--width")
            .arg(ctx.dimensions.width.to_string())
            .arg("--height")
            .arg(ctx.dimensions.height.to_string())
            .arg("--run-id")
            .arg(ctx.run_id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        match Self::start_pumps(&mut child, id, port) {
            Ok(pumps) => {
                debug!(%id, pid = child.id(), "worker process spawned");
                Ok(Self { id, child, pumps })
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(e)
            }
        }
    }

    fn start_pumps(child: &mut Child, id: RegistrationId, port: WorkerPort) -> io::Result<Vec<JoinHandle<()>>> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("child stdin not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout not piped"))?;
        let (uplink, downlink) = port.split();

        let reader = thread::Builder::new()
            .name(format!("mxos-{id}-out"))
            .spawn(move || pump_stdout(stdout, &uplink))?;
        let writer = thread::Builder::new()
            .name(format!("mxos-{id}-in"))
            .spawn(move || pump_stdin(stdin, &downlink))?;
        Ok(vec![reader, writer])
    }

    pub(crate) fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Non-blocking exit check.
    pub(crate) fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Asks the child to exit (SIGTERM on unix).
    pub(crate) fn terminate(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let Ok(raw) = i32::try_from(self.child.id()) else {
                return;
            };
            if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
                debug!(id = %self.id, error = %e, "SIGTERM failed");
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.kill();
        }
    }

    /// Kills the child and waits (bounded) for it to be reaped.
    pub(crate) fn kill(&mut self, bound: Duration) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        let _ = self.child.kill();
        let deadline = Instant::now() + bound;
        loop {
            match self.child.try_wait() {
                Ok(None) => {}
                Ok(Some(_)) | Err(_) => return,
            }
            if Instant::now() >= deadline {
                warn!(id = %self.id, pid = self.child.id(), "worker process not reaped after kill");
                return;
            }
            thread::sleep(REAP_POLL);
        }
    }

    /// Joins pump threads that have already finished.
    pub(crate) fn release(self) {
        for pump in self.pumps {
            if pump.is_finished() {
                let _ = pump.join();
            }
        }
    }
}

fn pump_stdout(stdout: impl Read, uplink: &Uplink) {
    let mut reader = LineReader::new(BufReader::new(stdout));
    loop {
        match reader.read::<WorkerMessage>() {
            Ok(Some(Ok(message))) => match uplink.send(message) {
                Ok(()) => {}
                Err(BusError::Saturated { id, .. }) => warn!(%id, "uplink saturated, message dropped"),
                Err(_) => return,
            },
            Ok(Some(Err(e))) => warn!(error = %e, "skipping bad worker line"),
            Ok(None) => return,
            Err(e) => {
                debug!(error = %e, "worker stdout failed");
                return;
            }
        }
    }
}

fn pump_stdin(mut stdin: impl Write, downlink: &Downlink) {
    loop {
        match downlink.recv(PUMP_POLL) {
            Ok(Some(message)) => {
                if let Err(e) = write_message(&mut stdin, &message) {
                    debug!(error = %e, "worker stdin closed");
                    return;
                }
            }
            Ok(None) => {}
            Err(_) => return,
        }
    }
}
