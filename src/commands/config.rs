use anyhow::Result;
use treeship::config::{user_config_path, ConfigWarning};
use treeship::Config;

use super::print_config_warnings;

pub fn cmd_config(config: &Config, warnings: &[ConfigWarning], json: bool) -> Result<()> {
    if json {
        let warnings: Vec<_> = warnings.iter().map(|w| w.to_string()).collect();
        println!(
            "{}",
            serde_json::json!({
                "event": "config",
                "command": "config",
                "config": config,
                "warnings": warnings,
            })
        );
        return Ok(());
    }

    print_config_warnings(warnings);
    if let Some(path) = user_config_path() {
        println!("# user config: {}", path.display());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
