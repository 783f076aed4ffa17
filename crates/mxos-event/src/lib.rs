//! Messages exchanged between the MXOS kernel and its workers.
//!
//! The message bus (in `mxos-runtime`) is pure transport; this crate defines
//! what travels over it and how it is framed when a worker lives in a
//! separate process.
//!
//! # Message Flow
//!
//! ```text
//! ┌────────┐  ControlMessage (APP_START/STOP/PAUSE/RESUME)  ┌────────┐
//! │ Kernel │ ─────────────────────────────────────────────► │ Worker │
//! │        │ ◄───────────────────────────────────────────── │        │
//! └────────┘  WorkerMessage (FRAME_READY/APP_READY/APP_ERROR) └────────┘
//! ```
//!
//! | Message | Direction | Evictable |
//! |---------|-----------|-----------|
//! | `FRAME_READY` | worker → kernel | Yes (latest wins) |
//! | `APP_READY` | worker → kernel | No |
//! | `APP_ERROR` | worker → kernel | No |
//! | `APP_START` / `APP_STOP` / `APP_PAUSE` / `APP_RESUME` | kernel → worker | No |

pub mod codec;
mod error;
mod message;

pub use error::EventError;
pub use message::{ControlMessage, WorkerMessage};
