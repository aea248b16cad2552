//! Domain Ports (Interfaces)
//!
//! These traits define the boundaries of the deployment engine.
//! Infrastructure provides concrete implementations; tests use the
//! in-memory ones.

pub mod clock;
pub mod content_filter;
pub mod deploy_events;
pub mod destination_snapshots;
pub mod lock_provider;
pub mod name_matcher;
pub mod remote_session;
pub mod source_store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use content_filter::{ContentFilter, FilterChain};
pub use deploy_events::{DeploymentCallback, NoopCallback};
pub use destination_snapshots::DestinationSnapshots;
pub use lock_provider::{LivenessCallback, LockError, LockProvider};
pub use name_matcher::NameMatcher;
pub use remote_session::{
    ContentSink, Credentials, RemoteSession, TransportError, TransportResult, WriteRequest,
};
pub use source_store::{ContentReader, SourceStore, StoreError, StoreResult};
