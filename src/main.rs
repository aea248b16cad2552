//! treeship CLI - deploy a directory tree onto a receiver
//!
//! Usage: treeship <COMMAND>
//!
//! Commands:
//!   deploy  Deploy a local directory into a receiver target
//!   diff    Show what a deployment would change
//!   config  Print the effective configuration

use std::io;

use anyhow::Result;
use clap::Parser;
use is_terminal::IsTerminal;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (config, warnings) = commands::load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Deploy(args) => {
            commands::print_config_warnings(&warnings);
            commands::deploy::cmd_deploy(args, &config, cli.json)
        }
        Commands::Diff(tree) => {
            commands::print_config_warnings(&warnings);
            commands::deploy::cmd_diff(tree, &config, cli.json)
        }
        Commands::Config => commands::config::cmd_config(&config, &warnings, cli.json),
    }
}

/// `RUST_LOG` wins; otherwise `-v` selects debug and `-vv` trace.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "treeship=info",
        1 => "treeship=debug",
        _ => "treeship=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}
