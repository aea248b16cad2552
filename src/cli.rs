use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use treeship::DeployMode;

/// treeship - deploy a directory tree onto a receiver, transferring only what changed
#[derive(Parser, Debug)]
#[command(name = "treeship")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output events as NDJSON for CI
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to ./treeship.toml, then the user config)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a local directory into a receiver target
    Deploy(DeployArgs),

    /// Show what a deployment would change without touching the receiver
    Diff(TreeArgs),

    /// Print the effective configuration
    Config,
}

/// Source and destination of a deployment
#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    /// Directory to deploy
    pub source_dir: PathBuf,

    /// Root directory of the receiver
    pub receiver_root: PathBuf,

    /// Target name under the receiver root
    pub target: String,

    /// Path inside the target to deploy into
    #[arg(long, default_value = "/")]
    pub dest_path: String,

    /// Exclude paths matching a gitignore-style pattern (repeatable)
    #[arg(short, long = "exclude", value_name = "PATTERN")]
    pub excludes: Vec<String>,

    /// Keep destination entries that are missing from the source
    #[arg(long)]
    pub no_delete: bool,

    /// Create the destination path if it does not exist
    #[arg(long)]
    pub create: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    #[command(flatten)]
    pub tree: TreeArgs,

    /// Transfer mode (direct or queued)
    #[arg(long)]
    pub mode: Option<DeployMode>,

    /// Number of transfer workers in queued mode
    #[arg(long)]
    pub workers: Option<usize>,

    /// Compute and report changes without applying them
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_deploy() {
        let cli = Cli::try_parse_from([
            "treeship", "deploy", "site", "/srv/recv", "live", "--mode", "direct", "-e", "*.bak",
            "-e", "drafts/", "--no-delete",
        ])
        .unwrap();

        match cli.command {
            Commands::Deploy(args) => {
                assert_eq!(args.tree.source_dir, PathBuf::from("site"));
                assert_eq!(args.tree.receiver_root, PathBuf::from("/srv/recv"));
                assert_eq!(args.tree.target, "live");
                assert_eq!(args.tree.dest_path, "/");
                assert_eq!(args.tree.excludes, vec!["*.bak", "drafts/"]);
                assert!(args.tree.no_delete);
                assert!(!args.tree.create);
                assert_eq!(args.mode, Some(DeployMode::Direct));
                assert!(args.workers.is_none());
                assert!(!args.dry_run);
            }
            other => panic!("expected deploy, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_diff_with_globals() {
        let cli = Cli::try_parse_from([
            "treeship", "diff", "site", "recv", "live", "--json", "-vv", "--dest-path", "/www",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Diff(tree) => assert_eq!(tree.dest_path, "/www"),
            other => panic!("expected diff, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_config() {
        let cli = Cli::try_parse_from(["treeship", "config", "--config", "ci.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Config));
        assert_eq!(cli.config, Some(PathBuf::from("ci.toml")));
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        let result = Cli::try_parse_from(["treeship", "deploy", "a", "b", "c", "--mode", "bulk"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_requires_target() {
        assert!(Cli::try_parse_from(["treeship", "deploy", "a", "b"]).is_err());
    }
}
