use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use treeship::domain::ports::{DeploymentCallback, NameMatcher};
use treeship::infrastructure::{
    ConsoleEventCallback, FileLockProvider, FsReceiver, FsSourceStore, GlobMatcher,
    JsonEventCallback,
};
use treeship::{
    Config, DeployMode, DeployUseCase, DeploymentReport, DeploymentRequest, Destination, StorePath,
};

use crate::cli::{DeployArgs, TreeArgs};

/// Name of the store a local source directory is exposed as
const LOCAL_STORE: &str = "local";

/// Lock files live under the receiver's state directory
const LOCK_DIR: &str = ".treeship/locks";

pub fn cmd_deploy(args: &DeployArgs, config: &Config, json: bool) -> Result<()> {
    let mode = args.mode.unwrap_or(config.transfer.mode);
    let report = run(&args.tree, config, mode, args.workers, args.dry_run, json)?;
    if !json {
        print_summary(&report, args.dry_run);
    }
    Ok(())
}

pub fn cmd_diff(tree: &TreeArgs, config: &Config, json: bool) -> Result<()> {
    let report = run(tree, config, DeployMode::Direct, None, true, json)?;
    if !json {
        print_summary(&report, true);
    }
    Ok(())
}

fn run(
    tree: &TreeArgs,
    config: &Config,
    mode: DeployMode,
    workers: Option<usize>,
    dry_run: bool,
    json: bool,
) -> Result<DeploymentReport> {
    if !tree.source_dir.is_dir() {
        bail!("source directory not found: {}", tree.source_dir.display());
    }

    let mut settings = config.engine_settings();
    if let Some(workers) = workers {
        if workers == 0 {
            bail!("--workers must be at least 1");
        }
        settings.workers = workers;
    }

    let store = Arc::new(FsSourceStore::new(LOCAL_STORE, &tree.source_dir));
    let receiver = Arc::new(FsReceiver::new(&tree.receiver_root));
    let locks = Arc::new(FileLockProvider::new(lock_dir(&tree.receiver_root)));
    let use_case = DeployUseCase::new(store, receiver, locks).with_settings(settings);

    let source = StorePath::new(LOCAL_STORE, "/").context("invalid source path")?;
    let destination = Destination::new("localhost", 0, &tree.target, &tree.dest_path);
    let mut request = DeploymentRequest::new(source, destination)
        .with_mode(mode)
        .with_create_destination(tree.create || config.deploy.create_destination)
        .with_dont_delete(tree.no_delete || config.deploy.dont_delete)
        .with_dry_run(dry_run);
    if let Some(matcher) = build_matcher(&config.deploy.exclude, &tree.excludes)? {
        request = request.with_matcher(matcher);
    }

    let callback: Arc<dyn DeploymentCallback> = if json {
        Arc::new(JsonEventCallback::stdout())
    } else {
        Arc::new(ConsoleEventCallback::stderr())
    };

    let report = use_case
        .execute_with_callback(&request, callback)
        .with_context(|| format!("deployment to {} failed", request.destination))?;
    Ok(report)
}

fn lock_dir(receiver_root: &Path) -> std::path::PathBuf {
    receiver_root.join(LOCK_DIR)
}

fn build_matcher(
    configured: &[String],
    flags: &[String],
) -> Result<Option<Arc<dyn NameMatcher>>> {
    let matcher = GlobMatcher::new(configured.iter().chain(flags))?;
    if matcher.is_empty() {
        return Ok(None);
    }
    Ok(Some(Arc::new(matcher)))
}

fn print_summary(report: &DeploymentReport, dry_run: bool) {
    let version = report
        .version()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    if !report.has_changes() {
        eprintln!("Already up to date (version {}).", version);
        return;
    }
    let verb = if dry_run { "Would apply" } else { "Applied" };
    eprintln!(
        "{} {} created, {} updated, {} deleted (version {}).",
        verb,
        report.created(),
        report.updated(),
        report.deleted(),
        version
    );
}
