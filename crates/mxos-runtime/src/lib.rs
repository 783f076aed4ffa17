//! MXOS runtime: the orchestrator behind a small LED-matrix display.
//!
//! Applications produce frames; the runtime decides which one is shown,
//! keeps each one contained, and drives the display at a steady rate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Kernel (render loop, one thread)                            │
//! │   liveness ─► poll bus ─► scheduler ─► select ─► present     │
//! └──────┬───────────────┬──────────────────┬───────────────┬────┘
//!        │               │                  │               │
//!   ┌────▼────┐    ┌─────▼─────┐     ┌──────▼─────┐   ┌─────▼──────┐
//!   │ Sandbox │    │ MessageBus│     │ Scheduler  │   │ BoundedSink│
//!   │ handles │    │ mailboxes │     │ pure state │   │ sink thread│
//!   └────┬────┘    └─────▲─────┘     └────────────┘   └────────────┘
//!        │ spawn         │ FRAME_READY / APP_READY / APP_ERROR
//!   ┌────▼───────────────┴──┐
//!   │ Workers               │
//!   │  THREAD : run_app     │
//!   │  PROCESS: serve_stdio │
//!   └───────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`bus`] | Bounded per-worker mailboxes; latest-wins frame slots |
//! | [`sandbox`] | Worker lifecycle, THREAD vs PROCESS isolation, liveness |
//! | [`scheduler`] | Rotation order and slot durations; no side effects |
//! | [`kernel`] | The non-blocking render loop |
//! | [`display`] | Sinks and the time-bounded sink wrapper |
//! | [`worker`] | Worker-side loop, shared by both isolation kinds |
//! | [`config`] | Layered TOML + environment configuration |
//! | [`apps`] | Built-in applications |
//! | [`fault`] | Faults the kernel survives |
//! | [`clock`] | Real and manual time sources |

pub mod apps;
pub mod bus;
pub mod clock;
pub mod config;
pub mod display;
pub mod fault;
pub mod kernel;
pub mod sandbox;
pub mod scheduler;
pub mod worker;

pub use apps::builtin_registry;
pub use bus::{BusConfig, BusError, MessageBus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    default_config_dir, default_config_path, ConfigError, ConfigLoader, ConfigResolver, MxosConfig,
    NoOpResolver,
};
pub use display::{DisplayError, DisplaySink, FrameObserver, MemorySink, NullSink, TerminalSink};
pub use fault::Fault;
pub use kernel::{
    ErrorPolicy, Kernel, KernelBuilder, KernelConfig, KernelError, KernelState, KernelStats,
    RunContext, RunSummary, ShutdownHandle,
};
pub use sandbox::{
    IsolationKind, IsolationPolicy, Sandbox, SandboxConfig, SandboxError, ShutdownReport,
    WorkerCommand,
};
pub use scheduler::{Scheduler, Transition};
pub use worker::{run_app, WorkerExit};
