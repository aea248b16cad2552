//! Application Layer
//!
//! Use cases that sequence domain services and ports.

pub mod deploy;

pub use deploy::{DeployUseCase, DeploymentRequest, Destination, EngineSettings};
