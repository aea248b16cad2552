//! Deploy Options
//!
//! Request and engine settings for deploy operations.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::ports::{Credentials, NameMatcher};
use crate::domain::value_objects::{normalize_path, DeployMode, LockName, StorePath, VersionRequest};
use crate::lease::LeaseConfig;

/// Identity of a deployment destination: a receiver endpoint, a target on
/// it, and the root path inside the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
    pub target: String,
    pub path: String,
}

impl Destination {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        target: impl Into<String>,
        path: &str,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            target: target.into(),
            path: normalize_path(path),
        }
    }

    /// Deployments to the same host, port and target exclude each other
    pub fn lock_name(&self) -> LockName {
        LockName::for_destination(&self.host, self.port, &self.target)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}:{}", self.host, self.port, self.target, self.path)
    }
}

/// What to deploy and where
#[derive(Clone)]
pub struct DeploymentRequest {
    pub source: StorePath,
    pub version: VersionRequest,
    pub destination: Destination,
    pub credentials: Credentials,
    /// Paths vetoed from every create, update and delete decision
    pub matcher: Option<Arc<dyn NameMatcher>>,
    pub mode: DeployMode,
    /// Create missing ancestors of the destination root
    pub create_destination: bool,
    /// Keep destination-only entries
    pub dont_delete: bool,
    /// Compute and report the differences without changing the destination
    pub dry_run: bool,
}

impl DeploymentRequest {
    pub fn new(source: StorePath, destination: Destination) -> Self {
        Self {
            source,
            version: VersionRequest::default(),
            destination,
            credentials: Credentials::default(),
            matcher: None,
            mode: DeployMode::default(),
            create_destination: false,
            dont_delete: false,
            dry_run: false,
        }
    }

    pub fn with_version(mut self, version: impl Into<VersionRequest>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn NameMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn with_mode(mut self, mode: DeployMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_create_destination(mut self, create: bool) -> Self {
        self.create_destination = create;
        self
    }

    pub fn with_dont_delete(mut self, dont_delete: bool) -> Self {
        self.dont_delete = dont_delete;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl fmt::Debug for DeploymentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentRequest")
            .field("source", &self.source)
            .field("version", &self.version)
            .field("destination", &self.destination)
            .field("credentials", &self.credentials)
            .field("matcher", &self.matcher.as_ref().map(|_| "<matcher>"))
            .field("mode", &self.mode)
            .field("create_destination", &self.create_destination)
            .field("dont_delete", &self.dont_delete)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Tuning shared by every deployment a use case runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub lease: LeaseConfig,
    pub workers: usize,
    pub buffer_size: usize,
    /// How long queue consumers wait before re-checking for shutdown
    pub poll_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lease: LeaseConfig::default(),
            workers: 4,
            buffer_size: 8192,
            poll_interval: Duration::from_millis(500),
        }
    }
}
