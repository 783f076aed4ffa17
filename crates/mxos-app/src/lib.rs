//! Application contract for MXOS.
//!
//! An MXOS application is a small frame producer: a clock, a ticker, a
//! bouncing logo. This crate defines what every application provides and
//! what the runtime needs to know about it before running it.
//!
//! | Item | Role |
//! |------|------|
//! | [`App`] | Lifecycle: `on_start`, `update`, `render`, `on_stop` |
//! | [`Manifest`] | Name, version, description, frame rate, capabilities |
//! | [`Capability`] | Declared needs; decides thread vs process isolation |
//! | [`AppRegistry`] | Static kind → (manifest, constructor) table |
//! | [`WorkerState`] | Lifecycle state of a running instance |
//! | [`testing::AppTestHarness`] | Drives an app without a runtime |
//!
//! Applications never see the bus, the scheduler or other applications.

mod app;
mod capability;
mod error;
mod manifest;
mod registry;
mod state;
pub mod testing;

pub use app::{App, AppContext};
pub use capability::Capability;
pub use error::AppError;
pub use manifest::Manifest;
pub use registry::{AppFactory, AppImpl, AppRegistry};
pub use state::WorkerState;
