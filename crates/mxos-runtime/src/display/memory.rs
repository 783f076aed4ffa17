//! In-memory sink for tests and headless runs.

use super::{DisplayError, DisplaySink};
use mxos_types::Frame;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Records every presented frame.
///
/// Can simulate a slow or flaky device with [`with_delay`](Self::with_delay)
/// and [`with_failures`](Self::with_failures).
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<Frame>>>,
    delay: Duration,
    failures: usize,
}

/// Read side of a [`MemorySink`] that stays usable after the sink moved
/// onto its thread.
#[derive(Debug, Clone)]
pub struct MemorySinkHandle {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps this long inside every `present`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fails the next `n` presents.
    #[must_use]
    pub fn with_failures(mut self, n: usize) -> Self {
        self.failures = n;
        self
    }

    #[must_use]
    pub fn handle(&self) -> MemorySinkHandle {
        MemorySinkHandle {
            frames: Arc::clone(&self.frames),
        }
    }
}

impl DisplaySink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn present(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.failures > 0 {
            self.failures -= 1;
            return Err(DisplayError::Failed("simulated failure".into()));
        }
        self.frames.lock().push(frame.clone());
        Ok(())
    }
}

impl MemorySinkHandle {
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<Frame> {
        self.frames.lock().last().cloned()
    }
}
