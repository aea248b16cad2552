//! treeship - versioned tree deployment engine
//!
//! treeship deploys one version of a source tree onto a destination tree
//! held by a receiver. It computes the differences with a merge-join over
//! sorted child lists, transfers only what changed, and applies everything
//! under a single remote transaction guarded by a cluster-wide lock lease.
//!
//! The entry point is [`DeployUseCase`]; stores, receivers and lock
//! providers plug in through the traits in [`domain::ports`].

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod lease;
pub mod transfer;

// Re-exports for convenience
pub use application::{DeployUseCase, DeploymentRequest, Destination, EngineSettings};
pub use config::Config;
pub use domain::entities::{DeploymentEvent, DeploymentReport, EventKind};
pub use domain::value_objects::{DeployMode, StorePath, Version, VersionRequest};
pub use error::{DeployError, DeployResult};
pub use lease::{LeaseConfig, LockLease};
