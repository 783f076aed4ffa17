//! Wire codec errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`EventError::Encode`] | `EVENT_ENCODE` | No |
//! | [`EventError::Decode`] | `EVENT_DECODE` | Yes |
//! | [`EventError::LineTooLong`] | `EVENT_LINE_TOO_LONG` | Yes |
//! | [`EventError::Io`] | `EVENT_IO` | No |
//!
//! Decode errors are recoverable: the reader skips the offending line and
//! keeps reading the stream.

use mxos_types::ErrorCode;
use thiserror::Error;

/// Error raised while framing messages on a byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// A message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// A line was not a valid message.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// A line exceeded the maximum frame size.
    #[error("line of {len} bytes exceeds limit of {max}")]
    LineTooLong { len: usize, max: usize },

    /// The underlying stream failed (usually a closed pipe).
    #[error("stream error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EventError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl ErrorCode for EventError {
    fn code(&self) -> &'static str {
        match self {
            Self::Encode(_) => "EVENT_ENCODE",
            Self::Decode(_) => "EVENT_DECODE",
            Self::LineTooLong { .. } => "EVENT_LINE_TOO_LONG",
            Self::Io(_) => "EVENT_IO",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::LineTooLong { .. })
    }
}
