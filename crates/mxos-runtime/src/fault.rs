//! Fault taxonomy.
//!
//! Faults are contained conditions, not errors returned to a caller: the
//! sandbox and kernel detect them, log them, count them and keep the
//! display running.
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`Fault::WorkerStartTimeout`] | `FAULT_WORKER_START_TIMEOUT` | Yes |
//! | [`Fault::WorkerCrashed`] | `FAULT_WORKER_CRASHED` | Yes |
//! | [`Fault::WorkerUnresponsive`] | `FAULT_WORKER_UNRESPONSIVE` | Yes |
//! | [`Fault::BusSaturated`] | `FAULT_BUS_SATURATED` | Yes |
//! | [`Fault::ShutdownTimeout`] | `FAULT_SHUTDOWN_TIMEOUT` | No |
//! | [`Fault::DisplaySinkFault`] | `FAULT_DISPLAY_SINK` | Yes |
//!
//! "Recoverable" means the registration may be started again under the
//! retry policy.

use mxos_types::{ErrorCode, RegistrationId};
use std::time::Duration;
use thiserror::Error;

/// A contained failure observed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("{id}: no APP_READY within {timeout:?}")]
    WorkerStartTimeout { id: RegistrationId, timeout: Duration },

    #[error("{id}: worker crashed: {detail}")]
    WorkerCrashed { id: RegistrationId, detail: String },

    #[error("{id}: worker unresponsive: {detail}")]
    WorkerUnresponsive { id: RegistrationId, detail: String },

    /// Frames were evicted because the kernel fell behind this worker.
    #[error("{id}: {evicted} frame(s) evicted")]
    BusSaturated { id: RegistrationId, evicted: u64 },

    #[error("{id}: did not stop within {grace:?}")]
    ShutdownTimeout { id: RegistrationId, grace: Duration },

    #[error("display sink: {detail}")]
    DisplaySinkFault { detail: String },
}

impl Fault {
    /// The registration the fault belongs to, if any.
    #[must_use]
    pub fn registration(&self) -> Option<RegistrationId> {
        match self {
            Self::WorkerStartTimeout { id, .. }
            | Self::WorkerCrashed { id, .. }
            | Self::WorkerUnresponsive { id, .. }
            | Self::BusSaturated { id, .. }
            | Self::ShutdownTimeout { id, .. } => Some(*id),
            Self::DisplaySinkFault { .. } => None,
        }
    }

    /// Returns `true` for faults that end the worker instance.
    #[must_use]
    pub fn is_worker_fatal(&self) -> bool {
        matches!(
            self,
            Self::WorkerStartTimeout { .. }
                | Self::WorkerCrashed { .. }
                | Self::WorkerUnresponsive { .. }
                | Self::ShutdownTimeout { .. }
        )
    }
}

impl ErrorCode for Fault {
    fn code(&self) -> &'static str {
        match self {
            Self::WorkerStartTimeout { .. } => "FAULT_WORKER_START_TIMEOUT",
            Self::WorkerCrashed { .. } => "FAULT_WORKER_CRASHED",
            Self::WorkerUnresponsive { .. } => "FAULT_WORKER_UNRESPONSIVE",
            Self::BusSaturated { .. } => "FAULT_BUS_SATURATED",
            Self::ShutdownTimeout { .. } => "FAULT_SHUTDOWN_TIMEOUT",
            Self::DisplaySinkFault { .. } => "FAULT_DISPLAY_SINK",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ShutdownTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxos_types::assert_error_codes;

    fn all_variants() -> Vec<Fault> {
        let id = RegistrationId::new(1);
        vec![
            Fault::WorkerStartTimeout {
                id,
                timeout: Duration::from_secs(2),
            },
            Fault::WorkerCrashed {
                id,
                detail: "exit status 3".into(),
            },
            Fault::WorkerUnresponsive {
                id,
                detail: "silent".into(),
            },
            Fault::BusSaturated { id, evicted: 4 },
            Fault::ShutdownTimeout {
                id,
                grace: Duration::from_secs(2),
            },
            Fault::DisplaySinkFault {
                detail: "timeout".into(),
            },
        ]
    }

    #[test]
    fn codes_follow_convention() {
        assert_error_codes(&all_variants(), "FAULT_");
    }

    #[test]
    fn only_sink_faults_are_unowned() {
        for fault in all_variants() {
            let owned = fault.registration().is_some();
            assert_eq!(owned, !matches!(fault, Fault::DisplaySinkFault { .. }), "{fault}");
        }
    }

    #[test]
    fn message_names_registration() {
        let fault = Fault::WorkerCrashed {
            id: RegistrationId::new(4),
            detail: "signal 9".into(),
        };
        assert_eq!(fault.to_string(), "reg-4: worker crashed: signal 9");
    }
}
