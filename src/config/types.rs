//! Configuration type definitions

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::deploy::EngineSettings;
use crate::domain::value_objects::DeployMode;
use crate::error::{DeployError, DeployResult};
use crate::lease::LeaseConfig;

use super::loader::{self, ConfigWarning};

/// Lock lease timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    #[serde(default = "default_retry_wait_ms")]
    pub retry_wait_ms: u64,

    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            retry_wait_ms: default_retry_wait_ms(),
            retry_count: default_retry_count(),
        }
    }
}

fn default_ttl_ms() -> u64 {
    30_000
}

fn default_refresh_interval_ms() -> u64 {
    5_000
}

fn default_retry_wait_ms() -> u64 {
    1_000
}

fn default_retry_count() -> u32 {
    10
}

/// Transfer pipeline tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub mode: DeployMode,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            buffer_size: default_buffer_size(),
            poll_interval_ms: default_poll_interval_ms(),
            mode: DeployMode::default(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_buffer_size() -> usize {
    8192
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Defaults for deployment requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeployConfig {
    #[serde(default)]
    pub create_destination: bool,

    #[serde(default)]
    pub dont_delete: bool,

    /// Gitignore-style patterns excluded from every deployment
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub deploy: DeployConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> DeployResult<Self> {
        let (config, _warnings) = Self::load_with_warnings(path)?;
        config.validate(path)?;
        Ok(config)
    }

    /// Load configuration and collect non-fatal warnings (e.g. unknown keys).
    pub fn load_with_warnings(path: &Path) -> DeployResult<(Self, Vec<ConfigWarning>)> {
        loader::load_with_warnings(path)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self, file: &Path) -> DeployResult<()> {
        let invalid = |message: &str| DeployError::Config {
            file: file.to_path_buf(),
            message: message.to_string(),
        };
        if self.lock.ttl_ms == 0 {
            return Err(invalid("lock.ttl_ms must be greater than zero"));
        }
        if self.lock.refresh_interval_ms == 0 || self.lock.refresh_interval_ms >= self.lock.ttl_ms
        {
            return Err(invalid(
                "lock.refresh_interval_ms must be between zero and lock.ttl_ms",
            ));
        }
        if self.transfer.workers == 0 {
            return Err(invalid("transfer.workers must be at least 1"));
        }
        if self.transfer.buffer_size == 0 {
            return Err(invalid("transfer.buffer_size must be at least 1"));
        }
        if self.transfer.poll_interval_ms == 0 {
            return Err(invalid("transfer.poll_interval_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn lease_config(&self) -> LeaseConfig {
        LeaseConfig {
            ttl: Duration::from_millis(self.lock.ttl_ms),
            refresh_interval: Duration::from_millis(self.lock.refresh_interval_ms),
            retry_wait: Duration::from_millis(self.lock.retry_wait_ms),
            retry_count: self.lock.retry_count,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            lease: self.lease_config(),
            workers: self.transfer.workers,
            buffer_size: self.transfer.buffer_size,
            poll_interval: Duration::from_millis(self.transfer.poll_interval_ms),
        }
    }

    /// Render as TOML, as `treeship config` prints it
    pub fn to_toml(&self) -> DeployResult<String> {
        toml::to_string_pretty(self).map_err(|e| DeployError::Config {
            file: Path::new("<effective>").to_path_buf(),
            message: e.to_string(),
        })
    }
}
