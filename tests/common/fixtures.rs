use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use treeship::domain::entities::{DeploymentEvent, EventKind, NodeKind};
use treeship::domain::ports::DeploymentCallback;
use treeship::domain::value_objects::Guid;
use treeship::infrastructure::{InMemoryLockProvider, MemoryReceiver, MemoryStore};
use treeship::{
    DeployMode, DeployUseCase, DeploymentRequest, Destination, EngineSettings, LeaseConfig,
};

pub type Manifest = BTreeMap<String, (NodeKind, Guid)>;

/// Callback that keeps every event, in delivery order
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<DeploymentEvent>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<DeploymentEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|e| e.kind()).collect()
    }

    /// CREATED, UPDATED and DELETED events as (kind, destination path)
    pub fn structural(&self) -> Vec<(EventKind, String)> {
        self.events()
            .iter()
            .filter(|e| e.kind().is_structural())
            .map(|e| (e.kind(), e.destination().to_string()))
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl DeploymentCallback for Recorder {
    fn on_event(&self, event: &DeploymentEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        lease: LeaseConfig {
            ttl: Duration::from_secs(5),
            refresh_interval: Duration::from_millis(50),
            retry_wait: Duration::from_millis(10),
            retry_count: 2,
        },
        workers: 3,
        buffer_size: 5,
        poll_interval: Duration::from_millis(10),
    }
}

/// In-memory deployment setup: store "site" deployed to target "live"
pub struct Harness {
    pub store: MemoryStore,
    pub receiver: MemoryReceiver,
    pub locks: InMemoryLockProvider,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new("site"),
            receiver: MemoryReceiver::new(),
            locks: InMemoryLockProvider::new(),
        }
    }

    pub fn use_case(&self) -> DeployUseCase {
        DeployUseCase::new(
            Arc::new(self.store.clone()),
            Arc::new(self.receiver.clone()),
            Arc::new(self.locks.clone()),
        )
        .with_settings(fast_settings())
    }

    /// Deploy `site:/www` onto the receiver root
    pub fn request(&self, mode: DeployMode) -> DeploymentRequest {
        DeploymentRequest::new(
            "site:/www".parse().unwrap(),
            Destination::new("web01", 44100, "live", "/"),
        )
        .with_mode(mode)
    }

    /// Source head below `/www`, keyed relative to it
    pub fn source_tree(&self) -> Manifest {
        subtree(&self.store.head_manifest(), "/www")
    }

    /// Receiver tree, without its root
    pub fn destination_tree(&self) -> Manifest {
        subtree(&self.receiver.store().head_manifest(), "/")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Entries strictly below `prefix`, re-keyed relative to it
pub fn subtree(manifest: &Manifest, prefix: &str) -> Manifest {
    let base = prefix.trim_end_matches('/');
    manifest
        .iter()
        .filter_map(|(path, entry)| {
            let rest = path.strip_prefix(base)?;
            (rest.starts_with('/') && rest.len() > 1).then(|| (rest.to_string(), entry.clone()))
        })
        .collect()
}

pub const BOTH_MODES: [DeployMode; 2] = [DeployMode::Direct, DeployMode::Queued];
