//! Deployment callback implementations
//!
//! - JsonEventCallback: NDJSON output for CI/automation
//! - ConsoleEventCallback: one human-readable line per event

mod console;
mod json;

pub use console::ConsoleEventCallback;
pub use json::JsonEventCallback;
