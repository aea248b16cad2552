//! Domain Entities
//!
//! - `VersionedNode` - a source node at a fixed version
//! - `RemoteEntry` - a destination listing entry
//! - `DeploymentEvent` - one structural decision, delivered to callbacks
//! - `DeploymentWork` - a queued transfer or delete
//! - `DeploymentReport` - events delivered during one deployment

mod event;
mod node;
mod remote_entry;
mod report;
mod work;

pub use event::{DeploymentEvent, EventKind, EventSource};
pub use node::{ContentInfo, NodeKind, NodeMetadata, VersionedNode};
pub use remote_entry::RemoteEntry;
pub use report::DeploymentReport;
pub use work::{DeploymentWork, WorkAction};
