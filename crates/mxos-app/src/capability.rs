//! Declared application capabilities.
//!
//! A capability is something an application needs from the outside world.
//! The sandbox reads the declared set once, at start, to decide how strongly
//! to isolate the worker:
//!
//! | Capability | Meaning | Forces process isolation |
//! |------------|---------|--------------------------|
//! | [`NETWORK`](Capability::NETWORK) | Talks to remote services | Yes |
//! | [`FILESYSTEM`](Capability::FILESYSTEM) | Reads or writes files | Yes |
//! | [`SYSTEM_INFO`](Capability::SYSTEM_INFO) | Reads host clock or counters | No |
//!
//! External I/O can block for arbitrary lengths of time. Workers that may
//! block go to a separate process so they cannot stall the render loop.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Set of capabilities declared by a [`Manifest`](crate::Manifest).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Capability: u8 {
        /// Remote network access.
        const NETWORK     = 0b0000_0001;
        /// Local file access.
        const FILESYSTEM  = 0b0000_0010;
        /// Host clock, load, temperature and similar read-only counters.
        const SYSTEM_INFO = 0b0000_0100;
    }
}

impl Capability {
    /// Capabilities implying external I/O.
    pub const EXTERNAL_IO: Self = Self::NETWORK.union(Self::FILESYSTEM);

    /// Returns `true` if a worker declaring this set must run in its own
    /// process.
    ///
    /// # Example
    ///
    /// ```
    /// use mxos_app::Capability;
    ///
    /// assert!(Capability::NETWORK.requires_process_isolation());
    /// assert!((Capability::SYSTEM_INFO | Capability::FILESYSTEM).requires_process_isolation());
    /// assert!(!Capability::SYSTEM_INFO.requires_process_isolation());
    /// assert!(!Capability::empty().requires_process_isolation());
    /// ```
    #[must_use]
    pub fn requires_process_isolation(self) -> bool {
        self.intersects(Self::EXTERNAL_IO)
    }

    /// Lowercase names of the capabilities in the set.
    #[must_use]
    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(Self::NETWORK) {
            names.push("network");
        }
        if self.contains(Self::FILESYSTEM) {
            names.push("filesystem");
        }
        if self.contains(Self::SYSTEM_INFO) {
            names.push("system_info");
        }
        names
    }

    /// Parses one capability name (case-insensitive). `net`, `fs` and
    /// `sysinfo` are accepted as short forms.
    ///
    /// ```
    /// use mxos_app::Capability;
    ///
    /// assert_eq!(Capability::parse("Network"), Some(Capability::NETWORK));
    /// assert_eq!(Capability::parse("fs"), Some(Capability::FILESYSTEM));
    /// assert_eq!(Capability::parse("gpu"), None);
    /// ```
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "network" | "net" => Some(Self::NETWORK),
            "filesystem" | "fs" => Some(Self::FILESYSTEM),
            "system_info" | "sysinfo" => Some(Self::SYSTEM_INFO),
            _ => None,
        }
    }

    /// Parses a list of names, returning the combined set and the names
    /// that were not recognized.
    #[must_use]
    pub fn parse_list<'a>(names: &[&'a str]) -> (Self, Vec<&'a str>) {
        let mut caps = Self::empty();
        let mut unknown = Vec::new();
        for name in names {
            match Self::parse(name) {
                Some(c) => caps |= c,
                None => unknown.push(*name),
            }
        }
        (caps, unknown)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.names();
        if names.is_empty() {
            f.pad("none")
        } else {
            f.pad(&names.join(","))
        }
    }
}
