//! DestinationSnapshots port - snapshot history on the receiving side
//!
//! Receivers that keep versions of their own tree offer this so that a
//! failed direct deployment can be rolled back by re-deploying the
//! pre-deployment snapshot.

use std::sync::Arc;

use super::{SourceStore, StoreResult};
use crate::domain::value_objects::Version;

pub trait DestinationSnapshots: Send + Sync {
    /// Snapshot the destination tree as it is now
    fn create_snapshot(&self, label: &str) -> StoreResult<Version>;

    /// The destination's history, readable as a source store.
    ///
    /// Paths in this store are destination paths.
    fn history(&self) -> Arc<dyn SourceStore>;
}
