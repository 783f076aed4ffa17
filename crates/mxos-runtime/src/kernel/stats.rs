use serde::Serialize;
use std::fmt;

/// Counters over the lifetime of a kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KernelStats {
    pub ticks: u64,
    /// Iterations that took longer than the frame interval.
    pub overruns: u64,
    pub frames_presented: u64,
    /// Frames not presented because the sink was still busy.
    pub frames_dropped: u64,
    /// Worker frames discarded for a sequence at or below the cached one.
    pub stale_frames: u64,
    /// Worker frames evicted from full bus channels.
    pub evicted_frames: u64,
    pub sink_faults: u64,
    /// Faults that ended a worker instance.
    pub worker_faults: u64,
    /// `APP_ERROR`s reported by workers themselves.
    pub worker_errors: u64,
    pub restarts: u64,
}

impl fmt::Display for KernelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} overruns={} presented={} dropped={} stale={} evicted={} sink_faults={} worker_faults={} worker_errors={} restarts={}",
            self.ticks,
            self.overruns,
            self.frames_presented,
            self.frames_dropped,
            self.stale_frames,
            self.evicted_frames,
            self.sink_faults,
            self.worker_faults,
            self.worker_errors,
            self.restarts,
        )
    }
}
