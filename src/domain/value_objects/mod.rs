//! Domain Value Objects
//!
//! Immutable value types that represent domain concepts.

mod guid;
mod lock;
mod mode;
mod path;
mod ticket;
mod version;

pub use guid::Guid;
pub use lock::{LockName, LockToken};
pub use mode::DeployMode;
pub use path::{ancestors, extend_path, normalize_path, split_parent, StorePath, StorePathError};
pub use ticket::Ticket;
pub use version::{Version, VersionRequest};
