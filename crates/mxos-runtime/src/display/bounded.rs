//! Time-bounded wrapper around any [`DisplaySink`].
//!
//! One slot, one sink thread:
//!
//! - `present` puts the frame in the slot (replacing a frame the thread has
//!   not picked up yet) and waits for the acknowledgement up to the budget.
//! - While the thread is still inside `present` of an earlier frame, new
//!   frames are refused with [`DisplayError::Busy`] without waiting.
//! - A panic in the sink is caught and reported as [`DisplayError::Failed`].

use super::{DisplayError, DisplaySink};
use mxos_types::Frame;
use parking_lot::{Condvar, Mutex};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Slot {
    job: Option<(u64, Frame)>,
    busy: bool,
    done: Option<(u64, Result<(), DisplayError>)>,
    shutdown: bool,
    exited: bool,
}

#[derive(Debug, Default)]
struct Shared {
    slot: Mutex<Slot>,
    work: Condvar,
    done: Condvar,
}

/// Runs a sink on its own thread with a per-frame time budget.
#[derive(Debug)]
pub struct BoundedSink {
    name: String,
    budget: Duration,
    shared: Arc<Shared>,
    ticket: u64,
    thread: Option<JoinHandle<()>>,
}

impl BoundedSink {
    /// Starts the sink thread.
    ///
    /// # Errors
    ///
    /// Returns the error from spawning the thread.
    pub fn spawn(mut sink: Box<dyn DisplaySink>, budget: Duration) -> io::Result<Self> {
        let name = sink.name().to_string();
        let shared = Arc::new(Shared::default());
        let thread = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(format!("mxos-sink-{name}"))
                .spawn(move || serve(sink.as_mut(), &shared))?
        };
        debug!(sink = %name, ?budget, "sink thread started");
        Ok(Self {
            name,
            budget,
            shared,
            ticket: 0,
            thread: Some(thread),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Hands `frame` to the sink and waits at most the budget.
    ///
    /// # Errors
    ///
    /// - [`DisplayError::Busy`] if an earlier frame is still being shown
    /// - [`DisplayError::Timeout`] if this frame was not shown in time
    /// - [`DisplayError::Failed`] if the sink reported an error or panicked
    /// - [`DisplayError::Disconnected`] if the sink thread is gone
    pub fn present(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let mut slot = self.shared.slot.lock();
        if slot.exited {
            return Err(DisplayError::Disconnected);
        }
        if slot.busy {
            return Err(DisplayError::Busy);
        }

        self.ticket += 1;
        let ticket = self.ticket;
        slot.job = Some((ticket, frame.clone()));
        self.shared.work.notify_one();

        let deadline = Instant::now() + self.budget;
        loop {
            if let Some((done, result)) = slot.done.take() {
                if done == ticket {
                    return result;
                }
            }
            if slot.exited {
                return Err(DisplayError::Disconnected);
            }
            if Instant::now() >= deadline {
                return Err(DisplayError::Timeout {
                    budget: self.budget,
                });
            }
            self.shared.done.wait_until(&mut slot, deadline);
        }
    }
}

impl Drop for BoundedSink {
    fn drop(&mut self) {
        let busy = {
            let mut slot = self.shared.slot.lock();
            slot.shutdown = true;
            slot.busy
        };
        self.shared.work.notify_all();
        if let Some(thread) = self.thread.take() {
            if busy {
                warn!(sink = %self.name, "sink stuck at shutdown, detaching its thread");
            } else {
                let _ = thread.join();
            }
        }
    }
}

fn serve(sink: &mut dyn DisplaySink, shared: &Shared) {
    loop {
        let (ticket, frame) = {
            let mut slot = shared.slot.lock();
            loop {
                if slot.shutdown {
                    slot.exited = true;
                    shared.done.notify_all();
                    return;
                }
                if let Some(job) = slot.job.take() {
                    slot.busy = true;
                    break job;
                }
                shared.work.wait(&mut slot);
            }
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| sink.present(&frame)))
            .unwrap_or_else(|_| Err(DisplayError::Failed("sink panicked".into())));

        let mut slot = shared.slot.lock();
        slot.busy = false;
        slot.done = Some((ticket, result));
        shared.done.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MemorySink;
    use mxos_types::{Dimensions, Rgb};

    fn frame() -> Frame {
        let mut f = Frame::blank(Dimensions::new(2, 2));
        f.fill(Rgb::RED);
        f
    }

    #[test]
    fn fast_sink_acknowledges() {
        let sink = MemorySink::new();
        let handle = sink.handle();
        let mut bounded = BoundedSink::spawn(Box::new(sink), Duration::from_secs(1)).expect("spawn");
        bounded.present(&frame()).expect("present");
        bounded.present(&frame()).expect("present");
        assert_eq!(handle.len(), 2);
    }

    #[test]
    fn slow_sink_times_out_then_reports_busy() {
        let sink = MemorySink::new().with_delay(Duration::from_millis(200));
        let mut bounded = BoundedSink::spawn(Box::new(sink), Duration::from_millis(10)).expect("spawn");

        let started = Instant::now();
        let err = bounded.present(&frame()).unwrap_err();
        assert_eq!(
            err,
            DisplayError::Timeout {
                budget: Duration::from_millis(10)
            }
        );
        assert!(started.elapsed() < Duration::from_millis(150));

        thread::sleep(Duration::from_millis(20));
        assert_eq!(bounded.present(&frame()), Err(DisplayError::Busy));
    }

    #[test]
    fn sink_errors_pass_through() {
        let sink = MemorySink::new().with_failures(1);
        let handle = sink.handle();
        let mut bounded = BoundedSink::spawn(Box::new(sink), Duration::from_secs(1)).expect("spawn");
        assert!(matches!(bounded.present(&frame()), Err(DisplayError::Failed(_))));
        bounded.present(&frame()).expect("second succeeds");
        assert_eq!(handle.len(), 1);
    }

    struct Exploding;

    impl DisplaySink for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }
        fn present(&mut self, _: &Frame) -> Result<(), DisplayError> {
            panic!("led driver fault");
        }
    }

    #[test]
    fn panicking_sink_is_contained() {
        let mut bounded = BoundedSink::spawn(Box::new(Exploding), Duration::from_secs(1)).expect("spawn");
        assert_eq!(
            bounded.present(&frame()),
            Err(DisplayError::Failed("sink panicked".into()))
        );
        assert_eq!(
            bounded.present(&frame()),
            Err(DisplayError::Failed("sink panicked".into()))
        );
    }
}
