//! Source store implementations
//!
//! - `MemoryStore`: in-memory versioned tree with snapshots
//! - `FsSourceStore`: a local directory read as a store

mod fs;
mod memory;
pub(crate) mod tree;

pub use fs::FsSourceStore;
pub use memory::MemoryStore;
