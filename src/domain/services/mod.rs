//! Domain Services
//!
//! Pure logic over domain entities, with no I/O.

mod differ;

pub use differ::{merge_join, sort_entries, sort_nodes, Decision};
