//! Store version value objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed snapshot version of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub const fn new(number: u64) -> Self {
        Self(number)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which source version a deployment should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionRequest {
    /// Snapshot the source store first and deploy the new version
    #[default]
    NewSnapshot,
    /// Deploy an existing snapshot
    At(Version),
}

impl From<Version> for VersionRequest {
    fn from(version: Version) -> Self {
        VersionRequest::At(version)
    }
}
