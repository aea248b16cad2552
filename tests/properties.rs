//! Property tests for treeship.
//!
//! Properties use randomized trees to protect invariants like "the
//! destination mirrors the source" and "a second deployment is a no-op".
//!
//! Run with: `cargo test --test properties`

mod common;

#[path = "properties/diff_fixed_point.rs"]
mod diff_fixed_point;

#[path = "properties/paths.rs"]
mod paths;
