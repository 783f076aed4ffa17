//! Built-in applications.
//!
//! | Kind | Frame rate | Capabilities | Isolation |
//! |------|-----------|--------------|-----------|
//! | `bounce` | 10 | none | thread |
//! | `binary_clock` | 1 | `system_info` | thread |
//! | `loadmeter` | 2 | `filesystem` | process |
//!
//! A process worker rebuilds this registry and looks its kind up by name,
//! so the same table must be used by the kernel and the worker binary.

mod binary_clock;
mod bounce;
mod loadmeter;

pub use binary_clock::BinaryClock;
pub use bounce::Bounce;
pub use loadmeter::LoadMeter;

use mxos_app::{AppFactory, AppRegistry, Manifest};
use tracing::error;

fn builtins() -> [(&'static str, Manifest, AppFactory); 3] {
    [
        ("bounce", bounce::manifest(), bounce::create),
        ("binary_clock", binary_clock::manifest(), binary_clock::create),
        ("loadmeter", loadmeter::manifest(), loadmeter::create),
    ]
}

/// Registry with every built-in application.
#[must_use]
pub fn builtin_registry() -> AppRegistry {
    let mut registry = AppRegistry::new();
    for (kind, manifest, factory) in builtins() {
        if let Err(e) = registry.register(kind, manifest, factory) {
            error!(kind, error = %e, "failed to register builtin app");
        }
    }
    registry
}
