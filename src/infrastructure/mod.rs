//! Infrastructure Layer
//!
//! Concrete implementations of domain ports.
//! This layer handles all I/O operations.
//!
//! ## Structure
//!
//! - `store/` - Source stores (in-memory, local directory)
//! - `receiver/` - Remote sessions (in-memory, file system)
//! - `lock/` - Lock providers (in-memory table, lease files)
//! - `events/` - Deployment callbacks (JSON, console)
//! - `matcher` - Gitignore-style exclusion

pub mod events;
pub mod lock;
pub mod matcher;
pub mod receiver;
pub mod store;

// Re-export for convenience
pub use events::{ConsoleEventCallback, JsonEventCallback};
pub use lock::{FileLockProvider, InMemoryLockProvider};
pub use matcher::{GlobMatcher, MatcherError};
pub use receiver::{FsReceiver, MemoryReceiver, ReceiverOp};
pub use store::{FsSourceStore, MemoryStore};
