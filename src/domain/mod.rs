//! Domain Layer
//!
//! Deployment concepts without I/O.
//!
//! ## Structure
//!
//! - `entities/` - nodes, listing entries, events, work items, reports
//! - `value_objects/` - GUIDs, versions, tickets, lock names, paths
//! - `services/` - the merge-join differ
//! - `ports/` - traits for the source store, remote session, lock provider,
//!   filters, matchers and callbacks

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
