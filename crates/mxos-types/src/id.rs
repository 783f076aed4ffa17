//! Identifiers.
//!
//! - [`RegistrationId`]: one application bound into the rotation. Allocated
//!   sequentially by the sandbox, so ordering follows registration order.
//! - [`RunId`]: one orchestrator run. Random, passed to process workers so
//!   their logs can be correlated with the parent's.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a registration (and of its worker handle and bus route).
///
/// # Example
///
/// ```
/// use mxos_types::RegistrationId;
///
/// let id = RegistrationId::new(3);
/// assert_eq!(id.get(), 3);
/// assert_eq!(id.to_string(), "reg-3");
/// assert_eq!("reg-3".parse::<RegistrationId>(), Ok(id));
/// assert_eq!("3".parse::<RegistrationId>(), Ok(id));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(u32);

impl RegistrationId {
    /// Wraps a raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns the identifier following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reg-{}", self.0)
    }
}

/// Error returned when parsing a [`RegistrationId`] fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError(String);

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid registration id: {}", self.0)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for RegistrationId {
    type Err = ParseIdError;

    /// Accepts both the display form (`reg-7`) and the bare number (`7`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("reg-").unwrap_or(s);
        digits
            .parse::<u32>()
            .map(Self)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

/// Identifier of one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a random run id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID (used by process workers receiving the id
    /// from their parent).
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
