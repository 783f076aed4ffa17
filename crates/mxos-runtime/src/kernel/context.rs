use mxos_types::{Dimensions, RunId};
use std::time::Instant;

/// Facts fixed for one run, passed by reference to whoever needs them.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    /// Every frame of the run must have exactly these dimensions.
    pub dimensions: Dimensions,
    pub started_at: Instant,
}

impl RunContext {
    #[must_use]
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            run_id: RunId::new(),
            dimensions,
            started_at: Instant::now(),
        }
    }
}
