//! Lock name and token value objects

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Cluster-wide name of a deployment lock.
///
/// Derived from the destination identity, so two deployments to the same
/// host, port and target always contend for the same lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockName(String);

impl LockName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Lock name for a deployment destination
    pub fn for_destination(host: &str, port: u16, target: &str) -> Self {
        Self(format!(
            "treeship:{}:{}:{}",
            host.to_ascii_lowercase(),
            port,
            target
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-system safe stem for this name.
    ///
    /// Non-alphanumeric characters are replaced and a short digest of the
    /// full name is appended, so distinct names never share a stem.
    pub fn file_stem(&self) -> String {
        let readable: String = self
            .0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(48)
            .collect();
        let digest = format!("{:x}", Sha256::digest(self.0.as_bytes()));
        format!("{}-{}", readable, &digest[..12])
    }
}

impl fmt::Display for LockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque token assigned to the holder when a lock is granted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockToken(String);

impl LockToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
