//! Configuration loading

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{DeployError, DeployResult};

use super::types::Config;

/// Project configuration file, looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "treeship.toml";

/// Non-fatal configuration warning surfaced to CLI users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
    pub line: Option<usize>,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown key '{}' in {}", self.key, self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{}'?)", suggestion)?;
        }
        Ok(())
    }
}

/// Load configuration and collect non-fatal warnings (e.g. unknown keys).
///
/// The result is not validated; [`resolve`] does that once overrides are in.
pub fn load_with_warnings(path: &Path) -> DeployResult<(Config, Vec<ConfigWarning>)> {
    let content = fs::read_to_string(path)?;

    let mut unknown_paths: Vec<String> = Vec::new();
    let deserializer = toml::de::Deserializer::new(&content);

    let config: Config = serde_ignored::deserialize(deserializer, |p| {
        unknown_paths.push(p.to_string());
    })
    .map_err(|e| DeployError::Config {
        file: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let warnings = unknown_paths
        .iter()
        .map(|dotted| unknown_key_warning(path, &content, dotted))
        .collect();

    Ok((config, warnings))
}

/// Load from project config, user config, or defaults, then apply
/// `TREESHIP_*` environment overrides.
pub fn load_or_default(project_root: Option<&Path>) -> DeployResult<(Config, Vec<ConfigWarning>)> {
    let project = project_root.map(|root| root.join(PROJECT_CONFIG_FILE));
    let candidates = project.into_iter().chain(user_config_path());

    for path in candidates {
        if path.exists() {
            debug!(path = %path.display(), "loading configuration");
            let (config, warnings) = load_with_warnings(&path)?;
            return Ok((resolve(config, &path, env_var)?, warnings));
        }
    }

    let config = resolve(Config::default(), Path::new(DEFAULTS_SOURCE), env_var)?;
    Ok((config, Vec::new()))
}

/// Source named in validation errors when no configuration file was found
const DEFAULTS_SOURCE: &str = "<defaults>";

/// Apply `TREESHIP_*` overrides from `lookup`, then validate the result.
///
/// `source` is the file the base configuration came from.
pub fn resolve(
    config: Config,
    source: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> DeployResult<Config> {
    let config = apply_env_overrides(config, lookup);
    config.validate(source)?;
    Ok(config)
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Apply `TREESHIP_*` overrides read through `lookup`.
///
/// Values that do not parse are ignored with a warning.
pub fn apply_env_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
    fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
        let parsed = value.trim().parse().ok();
        if parsed.is_none() {
            warn!(key, value, "ignoring invalid environment override");
        }
        parsed
    }
    fn flag(value: &str) -> bool {
        let value = value.trim().to_lowercase();
        value != "false" && value != "0" && !value.is_empty()
    }

    if let Some(v) = lookup("TREESHIP_LOCK_TTL_MS").and_then(|v| parse("TREESHIP_LOCK_TTL_MS", &v)) {
        config.lock.ttl_ms = v;
    }
    if let Some(v) = lookup("TREESHIP_LOCK_REFRESH_MS")
        .and_then(|v| parse("TREESHIP_LOCK_REFRESH_MS", &v))
    {
        config.lock.refresh_interval_ms = v;
    }
    if let Some(v) = lookup("TREESHIP_LOCK_RETRY_WAIT_MS")
        .and_then(|v| parse("TREESHIP_LOCK_RETRY_WAIT_MS", &v))
    {
        config.lock.retry_wait_ms = v;
    }
    if let Some(v) = lookup("TREESHIP_LOCK_RETRY_COUNT")
        .and_then(|v| parse("TREESHIP_LOCK_RETRY_COUNT", &v))
    {
        config.lock.retry_count = v;
    }
    if let Some(v) = lookup("TREESHIP_WORKERS").and_then(|v| parse("TREESHIP_WORKERS", &v)) {
        config.transfer.workers = v;
    }
    if let Some(v) = lookup("TREESHIP_BUFFER_SIZE").and_then(|v| parse("TREESHIP_BUFFER_SIZE", &v))
    {
        config.transfer.buffer_size = v;
    }
    if let Some(v) = lookup("TREESHIP_POLL_INTERVAL_MS")
        .and_then(|v| parse("TREESHIP_POLL_INTERVAL_MS", &v))
    {
        config.transfer.poll_interval_ms = v;
    }
    if let Some(v) = lookup("TREESHIP_MODE").and_then(|v| parse("TREESHIP_MODE", &v)) {
        config.transfer.mode = v;
    }
    if let Some(v) = lookup("TREESHIP_DONT_DELETE") {
        config.deploy.dont_delete = flag(&v);
    }
    if let Some(v) = lookup("TREESHIP_CREATE_DESTINATION") {
        config.deploy.create_destination = flag(&v);
    }

    config
}

/// `$XDG_CONFIG_HOME/treeship/config.toml`, falling back to the platform
/// config directory.
pub fn user_config_path() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("treeship").join("config.toml"))
}

/// Known keys per section; the unnamed section lists the tables
const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("", &["lock", "transfer", "deploy"]),
    (
        "lock",
        &["ttl_ms", "refresh_interval_ms", "retry_wait_ms", "retry_count"],
    ),
    (
        "transfer",
        &["workers", "buffer_size", "poll_interval_ms", "mode"],
    ),
    ("deploy", &["create_destination", "dont_delete", "exclude"]),
];

fn unknown_key_warning(file: &Path, content: &str, dotted: &str) -> ConfigWarning {
    let (section, key) = dotted.rsplit_once('.').unwrap_or(("", dotted));
    ConfigWarning {
        key: key.to_string(),
        file: file.to_path_buf(),
        line: line_of(content, section, key),
        suggestion: closest_key(section, key),
    }
}

/// 1-based line where `key` is set inside `[section]`, or where the
/// `[key]` table starts for a top-level key.
fn line_of(content: &str, section: &str, key: &str) -> Option<usize> {
    let mut current = "";
    content.lines().enumerate().find_map(|(i, line)| {
        let line = line.trim();
        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = header.trim();
            return (section.is_empty() && current == key).then_some(i + 1);
        }
        let name = line.split('=').next()?.trim();
        (current == section && name == key).then_some(i + 1)
    })
}

/// Nearest known key in the same section, within two edits
fn closest_key(section: &str, key: &str) -> Option<String> {
    let (_, candidates) = KNOWN_KEYS.iter().find(|(name, _)| *name == section)?;
    candidates
        .iter()
        .map(|candidate| (edit_distance(key, candidate), *candidate))
        .filter(|(distance, _)| *distance <= 2)
        .min()
        .map(|(_, candidate)| candidate.to_string())
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = (above + 1)
                .min(row[j] + 1)
                .min(diagonal + usize::from(ca != *cb));
            diagonal = above;
        }
    }
    row[b.len()]
}
