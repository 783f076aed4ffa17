//! Configuration errors.
//!
//! | Variant | Code |
//! |---------|------|
//! | [`ConfigError::ReadFile`] | `CONFIG_READ_FILE` |
//! | [`ConfigError::ParseToml`] | `CONFIG_PARSE_TOML` |
//! | [`ConfigError::Serialize`] | `CONFIG_SERIALIZE` |
//! | [`ConfigError::InvalidEnvVar`] | `CONFIG_INVALID_ENV_VAR` |
//! | [`ConfigError::Invalid`] | `CONFIG_INVALID` |
//!
//! None are recoverable: the configuration has to be fixed.

use mxos_types::ErrorCode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value for environment variable '{name}': {message}")]
    InvalidEnvVar { name: String, message: String },

    /// A value parsed but is out of range.
    #[error("invalid config value '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "CONFIG_READ_FILE",
            Self::ParseToml { .. } => "CONFIG_PARSE_TOML",
            Self::Serialize(_) => "CONFIG_SERIALIZE",
            Self::InvalidEnvVar { .. } => "CONFIG_INVALID_ENV_VAR",
            Self::Invalid { .. } => "CONFIG_INVALID",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
