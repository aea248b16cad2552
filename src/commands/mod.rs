//! Subcommand implementations for the treeship binary

pub mod config;
pub mod deploy;

use std::path::Path;

use anyhow::{Context, Result};
use treeship::config::{self as settings, ConfigWarning};
use treeship::Config;

/// Load the configuration for this invocation: `--config` if given, else
/// the project and user files, then `TREESHIP_*` overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<(Config, Vec<ConfigWarning>)> {
    match explicit {
        Some(path) => {
            let (config, warnings) = settings::load_with_warnings(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            let config = settings::resolve(config, path, |key| std::env::var(key).ok())
                .with_context(|| format!("invalid configuration in {}", path.display()))?;
            Ok((config, warnings))
        }
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            Ok(settings::load_or_default(Some(&cwd))?)
        }
    }
}

pub fn print_config_warnings(warnings: &[ConfigWarning]) {
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
}
