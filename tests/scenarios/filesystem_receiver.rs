//! Scenario: a local directory is deployed into a file-system receiver.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use treeship::infrastructure::{FileLockProvider, FsReceiver, FsSourceStore, GlobMatcher};
use treeship::{
    DeployMode, DeployUseCase, DeploymentReport, DeploymentRequest, Destination, EventKind,
};

use crate::common::*;

struct Sites {
    source: TempDir,
    receiver: TempDir,
}

impl Sites {
    fn new() -> Self {
        let sites = Self {
            source: TempDir::new().unwrap(),
            receiver: TempDir::new().unwrap(),
        };
        sites.write("index.html", "<h1>home</h1>");
        sites.write("css/site.css", "body {}");
        sites.write("blog/2024/hello.md", "# hello");
        sites
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.source.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn live(&self) -> std::path::PathBuf {
        self.receiver.path().join("live")
    }

    fn use_case(&self) -> DeployUseCase {
        DeployUseCase::new(
            Arc::new(FsSourceStore::new("local", self.source.path())),
            Arc::new(FsReceiver::new(self.receiver.path())),
            Arc::new(FileLockProvider::new(
                self.receiver.path().join(".treeship/locks"),
            )),
        )
        .with_settings(fast_settings())
    }

    fn request(&self, mode: DeployMode) -> DeploymentRequest {
        DeploymentRequest::new(
            "local:/".parse().unwrap(),
            Destination::new("localhost", 0, "live", "/"),
        )
        .with_mode(mode)
    }

    fn deploy(&self, request: &DeploymentRequest) -> (DeploymentReport, Arc<Recorder>) {
        let recorder = Recorder::new();
        let report = self
            .use_case()
            .execute_with_callback(request, recorder.clone())
            .unwrap();
        (report, recorder)
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn deploys_and_converges() {
    for mode in BOTH_MODES {
        let sites = Sites::new();

        let (first, _) = sites.deploy(&sites.request(mode));
        assert_eq!(first.created(), 6, "{mode}");
        assert_eq!(read(&sites.live().join("blog/2024/hello.md")), "# hello");
        assert_eq!(read(&sites.live().join("css/site.css")), "body {}");

        let (second, recorder) = sites.deploy(&sites.request(mode));
        assert!(!second.has_changes(), "{mode}: {:?}", recorder.structural());
    }
}

#[test]
fn changes_on_disk_are_replicated() {
    for mode in BOTH_MODES {
        let sites = Sites::new();
        sites.deploy(&sites.request(mode));

        sites.write("index.html", "<h1>home v2</h1>");
        fs::remove_dir_all(sites.source.path().join("blog")).unwrap();
        sites.write("contact.html", "mail us");

        let (_, recorder) = sites.deploy(&sites.request(mode));
        let mut changes = recorder.structural();
        changes.sort_by(|a, b| a.1.cmp(&b.1));
        assert_eq!(
            changes,
            vec![
                (EventKind::Deleted, "/blog".to_string()),
                (EventKind::Created, "/contact.html".to_string()),
                (EventKind::Updated, "/index.html".to_string()),
            ],
            "{mode}"
        );
        assert_eq!(read(&sites.live().join("index.html")), "<h1>home v2</h1>");
        assert!(!sites.live().join("blog").exists());
    }
}

#[test]
fn excluded_paths_stay_home() {
    let sites = Sites::new();
    sites.write("notes.tmp", "scratch");
    sites.write("drafts/next.html", "soon");
    let matcher = GlobMatcher::new(["*.tmp", "/drafts"]).unwrap();

    let request = sites
        .request(DeployMode::Queued)
        .with_matcher(Arc::new(matcher));
    sites.deploy(&request);

    assert!(sites.live().join("index.html").exists());
    assert!(!sites.live().join("notes.tmp").exists());
    assert!(!sites.live().join("drafts").exists());
}

#[test]
fn dry_run_leaves_the_target_empty() {
    let sites = Sites::new();

    let (report, _) = sites.deploy(&sites.request(DeployMode::Direct).with_dry_run(true));

    assert_eq!(report.created(), 6);
    assert!(!sites.live().join("index.html").exists());
}

#[test]
fn missing_destination_path_is_created_on_request() {
    let sites = Sites::new();
    let mut request = sites.request(DeployMode::Direct).with_create_destination(true);
    request.destination = Destination::new("localhost", 0, "live", "/releases/current");

    sites.deploy(&request);

    assert_eq!(
        read(&sites.live().join("releases/current/index.html")),
        "<h1>home</h1>"
    );
}
