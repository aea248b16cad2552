//! Configuration module for treeship
//!
//! Configuration hierarchy:
//! 1. CLI flags (highest priority)
//! 2. Environment variables (TREESHIP_*)
//! 3. Project config (./treeship.toml)
//! 4. User config ($XDG_CONFIG_HOME/treeship/config.toml)
//! 5. Built-in defaults (lowest priority)

mod loader;
mod types;

pub use loader::{
    apply_env_overrides, load_or_default, load_with_warnings, resolve, user_config_path,
    ConfigWarning, PROJECT_CONFIG_FILE,
};
pub use types::{Config, DeployConfig, LockConfig, TransferConfig};
