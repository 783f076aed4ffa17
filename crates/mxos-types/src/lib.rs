//! Core types for MXOS.
//!
//! MXOS multiplexes one LED matrix (or a simulated one) among a rotating set
//! of isolated mini-applications. This crate holds the vocabulary every
//! other crate shares.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ mxos-types   : ids, Frame, ErrorCode          ◄── HERE   │
//! │ mxos-event   : bus messages, line codec                  │
//! │ mxos-app     : App trait, Manifest, Capability, registry │
//! ├──────────────────────────────────────────────────────────┤
//! │ mxos-runtime : bus, sandbox, scheduler, kernel, sinks    │
//! ├──────────────────────────────────────────────────────────┤
//! │ mxos-cli     : `mxos` binary                             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use mxos_types::{Dimensions, Frame, RegistrationId};
//!
//! let id = RegistrationId::new(1);
//! let frame = Frame::blank(Dimensions::default());
//! assert_eq!(frame.width(), 64);
//! assert_eq!(id.to_string(), "reg-1");
//! ```

mod error;
mod frame;
mod id;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use frame::{Dimensions, Frame, Rgb};
pub use id::{ParseIdError, RegistrationId, RunId};
