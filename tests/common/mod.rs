//! Common test utilities for treeship scenario and property tests.
//!
//! - `Harness`: an in-memory store, receiver and lock provider wired into
//!   a `DeployUseCase`
//! - `Recorder`: a callback that keeps every event it receives
//! - `subtree`: manifest comparison helpers

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
