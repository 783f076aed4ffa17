//! Shared error-code contract.
//!
//! Every error enum in the MXOS workspace implements [`ErrorCode`] so the
//! kernel can log, count and classify failures without matching on
//! crate-specific types.
//!
//! # Prefixes
//!
//! | Layer | Prefix |
//! |-------|--------|
//! | Wire codec | `EVENT_` |
//! | Applications | `APP_` |
//! | Message bus | `BUS_` |
//! | Sandbox | `SANDBOX_` |
//! | Display sinks | `DISPLAY_` |
//! | Kernel | `KERNEL_` |
//! | Configuration | `CONFIG_` |
//! | Runtime faults | `FAULT_` |
//!
//! # Example
//!
//! ```
//! use mxos_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum SinkError {
//!     Stalled,
//!     Unplugged,
//! }
//!
//! impl ErrorCode for SinkError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Stalled => "SINK_STALLED",
//!             Self::Unplugged => "SINK_UNPLUGGED",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Stalled)
//!     }
//! }
//!
//! assert_eq!(SinkError::Stalled.code(), "SINK_STALLED");
//! assert!(!SinkError::Unplugged.is_recoverable());
//! ```

/// Machine-readable classification of an error.
///
/// Codes are UPPER_SNAKE_CASE, prefixed by the layer that raised them, and
/// stable once published: log filters and dashboards match on them.
///
/// An error is *recoverable* when doing the same thing again later can
/// succeed (a timeout, a saturated channel, a crashed worker that may be
/// restarted on its next slot). Invalid input and programming errors are
/// not recoverable.
pub trait ErrorCode {
    /// Returns the stable error code, e.g. `"BUS_UNKNOWN_WORKER"`.
    fn code(&self) -> &'static str;

    /// Returns whether retrying later may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error's code is non-empty, UPPER_SNAKE_CASE and carries
/// the expected prefix.
///
/// Intended for tests.
///
/// # Panics
///
/// Panics with a descriptive message when any check fails.
///
/// # Example
///
/// ```
/// use mxos_types::{assert_error_code, ErrorCode};
///
/// struct Timeout;
///
/// impl ErrorCode for Timeout {
///     fn code(&self) -> &'static str { "BUS_TIMEOUT" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&Timeout, "BUS_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "error code '{code}' must start with '{expected_prefix}'"
    );
    assert!(
        is_upper_snake_case(code),
        "error code '{code}' must be UPPER_SNAKE_CASE"
    );
}

/// Runs [`assert_error_code`] over every variant and checks that no two
/// variants share a code.
///
/// # Panics
///
/// Panics on the first invalid or duplicated code.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    let mut seen: Vec<&'static str> = Vec::with_capacity(errors.len());
    for err in errors {
        assert_error_code(err, expected_prefix);
        let code = err.code();
        assert!(!seen.contains(&code), "error code '{code}' is used twice");
        seen.push(code);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    !s.starts_with('_')
        && !s.ends_with('_')
        && !s.contains("__")
        && s.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
