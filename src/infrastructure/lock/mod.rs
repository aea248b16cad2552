//! Lock provider implementations
//!
//! - `InMemoryLockProvider`: process-wide lock table, for tests and for
//!   several deployments inside one process
//! - `FileLockProvider`: lease files in a shared directory

mod file;
mod memory;

pub use file::FileLockProvider;
pub use memory::InMemoryLockProvider;
