//! Layered configuration.
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌─────────────────────────────────────────┐
//! │  1. CLI flags (ConfigResolver)          │
//! ├─────────────────────────────────────────┤
//! │  2. Environment variables (MXOS_*)      │
//! ├─────────────────────────────────────────┤
//! │  3. Explicit file (--config PATH)       │
//! ├─────────────────────────────────────────┤
//! │  4. Project config (.mxos/config.toml)  │
//! ├─────────────────────────────────────────┤
//! │  5. Global config (~/.mxos/config.toml) │
//! ├─────────────────────────────────────────┤
//! │  6. Defaults                            │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `MXOS_WIDTH` | `display.width` | u32 |
//! | `MXOS_HEIGHT` | `display.height` | u32 |
//! | `MXOS_BRIGHTNESS` | `display.brightness` | u8 (0..=100) |
//! | `MXOS_SIMULATE` | `display.simulate` | bool |
//! | `MXOS_FPS` | `kernel.fps` | u32 |
//! | `MXOS_ERROR_POLICY` | `kernel.error_policy` | `retry` \| `skip` |
//! | `MXOS_ISOLATION` | `sandbox.isolation` | `hybrid` \| `process` |
//! | `MXOS_DEFAULT_DURATION` | `scheduler.default_duration_secs` | u64 |
//!
//! # Example Configuration
//!
//! ```toml
//! [display]
//! width = 64
//! height = 32
//! brightness = 80
//! sink = "terminal"
//!
//! [kernel]
//! fps = 60
//! error_policy = "retry"
//!
//! [sandbox]
//! isolation = "hybrid"
//! start_timeout_ms = 2000
//!
//! [[apps]]
//! kind = "bounce"
//! duration_secs = 20
//!
//! [[apps]]
//! kind = "binary_clock"
//! ```

mod error;
mod loader;
mod resolver;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use resolver::{ConfigResolver, NoOpResolver};
pub use types::{
    AppEntry, BusSection, DisplaySection, KernelSection, MxosConfig, SandboxSection, SchedulerSection,
    SinkKind,
};

/// Global config directory, `~/.mxos`.
#[must_use]
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".mxos")
}

/// Global config file path.
#[must_use]
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

pub const PROJECT_CONFIG_DIR: &str = ".mxos";

pub const PROJECT_CONFIG_FILE: &str = "config.toml";
