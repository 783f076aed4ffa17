//! Child-process side of a PROCESS worker.
//!
//! Control messages arrive on stdin and worker messages leave on stdout,
//! one JSON object per line. A reader thread decodes stdin into a local
//! mailbox so the harness can wait on it with a timeout.
//!
//! Stdin reaching EOF means the parent is gone or wants the worker to stop;
//! both are handled as `APP_STOP`.

use super::{run_app, WorkerExit, WorkerLink};
use crate::bus::{BusError, Mailbox, MailboxClosed, PushError};
use mxos_app::{AppContext, AppImpl};
use mxos_event::codec::{write_message, LineReader};
use mxos_event::{ControlMessage, WorkerMessage};
use mxos_types::RegistrationId;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const INBOX_SLOTS: usize = 16;
const INBOX_PUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// [`WorkerLink`] over a byte stream and a decoded control inbox.
#[derive(Debug)]
pub struct StdioLink<W> {
    id: RegistrationId,
    output: W,
    inbox: Arc<Mailbox<ControlMessage>>,
}

impl<W: Write> StdioLink<W> {
    #[must_use]
    pub fn new(id: RegistrationId, output: W, inbox: Arc<Mailbox<ControlMessage>>) -> Self {
        Self { id, output, inbox }
    }
}

impl<W: Write> WorkerLink for StdioLink<W> {
    fn send(&mut self, message: WorkerMessage) -> Result<(), BusError> {
        write_message(&mut self.output, &message).map_err(|e| {
            debug!(id = %self.id, error = %e, "stdout write failed");
            BusError::WorkerClosed(self.id)
        })
    }

    fn recv(&mut self, wait: Duration) -> Result<Option<ControlMessage>, BusError> {
        self.inbox
            .pop_timeout(wait)
            .map_err(|MailboxClosed| BusError::WorkerClosed(self.id))
    }
}

/// Runs an application as a child-process worker.
///
/// Blocks until the worker loop ends. The stdin reader thread is left
/// behind if it is still blocked on a read; the process is about to exit.
pub fn serve_stdio<R, W>(implementation: &AppImpl, ctx: &AppContext, input: R, output: W) -> WorkerExit
where
    R: BufRead + Send + 'static,
    W: Write,
{
    let inbox = Arc::new(Mailbox::new(INBOX_SLOTS));
    let reader = {
        let inbox = Arc::clone(&inbox);
        thread::Builder::new()
            .name("mxos-stdin".into())
            .spawn(move || pump_input(input, &inbox))
    };
    if let Err(e) = reader {
        return WorkerExit::Failed(format!("stdin reader: {e}"));
    }

    let mut link = StdioLink::new(ctx.registration, output, Arc::clone(&inbox));
    let exit = run_app(implementation, ctx, &mut link);
    inbox.close();
    exit
}

fn pump_input<R: BufRead>(input: R, inbox: &Mailbox<ControlMessage>) {
    let mut reader = LineReader::new(input);
    loop {
        match reader.read::<ControlMessage>() {
            Ok(Some(Ok(message))) => {
                match inbox.push_control(message, INBOX_PUSH_TIMEOUT, |_| false) {
                    Ok(_) => {}
                    Err(PushError::Closed(_)) => return,
                    Err(PushError::Timeout(m)) => warn!(kind = m.kind(), "control inbox full, dropped"),
                }
            }
            Ok(Some(Err(e))) => warn!(error = %e, "skipping bad control line"),
            Ok(None) => {
                debug!("stdin closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        }
    }
    let _ = inbox.push_control(ControlMessage::Stop, INBOX_PUSH_TIMEOUT, |_| false);
    inbox.close();
}
