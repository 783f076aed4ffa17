//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values
//! 2. Global config (`~/.mxos/config.toml`)
//! 3. Project config (`<root>/.mxos/config.toml`)
//! 4. Explicit config file
//! 5. Environment variables (`MXOS_*`)
//!
//! Each layer overrides the previous. The result is validated once, after
//! the last layer.

use super::{default_config_path, ConfigError, MxosConfig, PROJECT_CONFIG_DIR, PROJECT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Parses a boolean environment variable into `$field`.
macro_rules! parse_env_bool {
    ($lookup:expr, $field:expr, $var:literal) => {
        if let Some(val) = $lookup($var) {
            $field = parse_bool(&val).ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

/// Parses any `FromStr` environment variable into `$field`.
macro_rules! parse_env {
    ($lookup:expr, $field:expr, $var:literal) => {
        if let Some(val) = $lookup($var) {
            $field = parse_value(&val).map_err(|message| ConfigError::invalid_env_var($var, message))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// ```no_run
/// use mxos_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_project_root(".")
///     .with_config_path("demo.toml")
///     .load()?;
/// # Ok::<(), mxos_runtime::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    global_config_path: Option<PathBuf>,
    project_root: Option<PathBuf>,
    /// Must exist when set.
    config_path: Option<PathBuf>,
    skip_env: bool,
    skip_global: bool,
    skip_project: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the global config location (`~/.mxos/config.toml`).
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Project config will be loaded from `<path>/.mxos/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// An explicit config file, layered above the project config. Unlike
    /// the other files it must exist.
    #[must_use]
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Loads, merges and validates configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a file exists but cannot be read or
    /// parsed, the explicit file is missing, an environment variable does
    /// not parse, or the merged values are out of range.
    pub fn load(&self) -> Result<MxosConfig, ConfigError> {
        let mut config = MxosConfig::default();

        if !self.skip_global {
            let path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);
            if let Some(global) = load_file(&path)? {
                debug!(path = %path.display(), "loaded global config");
                config.merge(&global);
            }
        }

        if !self.skip_project {
            if let Some(root) = &self.project_root {
                let path = root.join(PROJECT_CONFIG_DIR).join(PROJECT_CONFIG_FILE);
                if let Some(project) = load_file(&path)? {
                    debug!(path = %path.display(), "loaded project config");
                    config.merge(&project);
                }
            }
        }

        if let Some(path) = &self.config_path {
            let explicit = load_file(path)?.ok_or_else(|| {
                ConfigError::read_file(path, std::io::Error::from(std::io::ErrorKind::NotFound))
            })?;
            debug!(path = %path.display(), "loaded config file");
            config.merge(&explicit);
        }

        if !self.skip_env {
            apply_env_vars(&mut config, |name| std::env::var(name).ok())?;
        }

        validate(&config)?;
        Ok(config)
    }
}

/// Loads a config file, `None` if it does not exist.
fn load_file(path: &Path) -> Result<Option<MxosConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let config = MxosConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
    Ok(Some(config))
}

fn apply_env_vars(
    config: &mut MxosConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    parse_env!(lookup, config.display.width, "MXOS_WIDTH");
    parse_env!(lookup, config.display.height, "MXOS_HEIGHT");
    parse_env!(lookup, config.display.brightness, "MXOS_BRIGHTNESS");
    parse_env_bool!(lookup, config.display.simulate, "MXOS_SIMULATE");
    parse_env!(lookup, config.kernel.fps, "MXOS_FPS");
    parse_env!(lookup, config.kernel.error_policy, "MXOS_ERROR_POLICY");
    parse_env!(lookup, config.sandbox.isolation, "MXOS_ISOLATION");
    parse_env!(lookup, config.scheduler.default_duration_secs, "MXOS_DEFAULT_DURATION");
    Ok(())
}

/// Range checks that the types cannot express.
fn validate(config: &MxosConfig) -> Result<(), ConfigError> {
    if config.display.width == 0 || config.display.height == 0 {
        return Err(ConfigError::invalid(
            "display",
            format!("dimensions must be positive, got {}", config.dimensions()),
        ));
    }
    if config.display.brightness > 100 {
        return Err(ConfigError::invalid(
            "display.brightness",
            format!("{} is above 100", config.display.brightness),
        ));
    }
    if config.kernel.fps == 0 {
        return Err(ConfigError::invalid("kernel.fps", "must be positive"));
    }
    if config.kernel.sink_budget_ms == 0 {
        return Err(ConfigError::invalid("kernel.sink_budget_ms", "must be positive"));
    }
    if config.scheduler.default_duration_secs == 0 {
        return Err(ConfigError::invalid(
            "scheduler.default_duration_secs",
            "must be positive",
        ));
    }
    if config.bus.frame_slots == 0 || config.bus.control_slots == 0 {
        return Err(ConfigError::invalid("bus", "mailbox capacities must be positive"));
    }
    if let Some(entry) = config.apps.iter().find(|e| e.duration_secs == Some(0)) {
        return Err(ConfigError::invalid(
            "apps",
            format!("duration of '{}' must be positive", entry.kind),
        ));
    }
    Ok(())
}

/// Accepts true/false, 1/0, yes/no, on/off (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_value<T>(s: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    s.trim().parse().map_err(|e: T::Err| e.to_string())
}
