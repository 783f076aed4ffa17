//! Display output.
//!
//! ```text
//! Kernel ── present(frame) ──► BoundedSink ──(own thread)──► dyn DisplaySink
//!    │          ≤ budget            │                        (terminal, LED
//!    │                              └── ack / timeout          panel, memory)
//!    └── publish(frame) ──► FrameObserver ──► live-view consumers
//! ```
//!
//! A concrete sink may block for as long as it likes: [`BoundedSink`] runs
//! it on a dedicated thread and stops waiting after the budget, so the
//! render loop never waits on hardware.

mod bounded;
mod error;
mod memory;
mod observer;
mod terminal;

pub use bounded::BoundedSink;
pub use error::DisplayError;
pub use memory::{MemorySink, MemorySinkHandle};
pub use observer::{FrameObserver, ObservedFrame};
pub use terminal::TerminalSink;

use mxos_types::Frame;

/// Something that shows frames.
///
/// `present` is called from a single dedicated thread, one frame at a time.
pub trait DisplaySink: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Shows `frame`.
    ///
    /// # Errors
    ///
    /// [`DisplayError::Failed`] if the device rejected the frame.
    fn present(&mut self, frame: &Frame) -> Result<(), DisplayError>;
}

/// Discards frames. Used for simulation runs without output.
#[derive(Debug, Default)]
pub struct NullSink {
    presented: u64,
}

impl NullSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl DisplaySink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    fn present(&mut self, _frame: &Frame) -> Result<(), DisplayError> {
        self.presented += 1;
        Ok(())
    }
}
