//! Receiver implementations of the remote session port
//!
//! - `MemoryReceiver`: an in-memory destination with transactions, an
//!   operation log and fault injection
//! - `FsReceiver`: deploys into a local directory, staging every change
//!   until commit

mod fs;
mod memory;

pub use fs::FsReceiver;
pub use memory::{MemoryReceiver, ReceiverOp};
