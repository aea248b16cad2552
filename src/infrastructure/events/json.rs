//! JSON deployment callback
//!
//! Outputs deployment events as NDJSON for CI/automation consumption.

use crate::domain::entities::{DeploymentEvent, EventKind};
use crate::domain::ports::DeploymentCallback;
use std::io::{self, Write};
use std::sync::Mutex;

/// Callback that writes one JSON object per event
pub struct JsonEventCallback {
    /// Mutex to ensure thread-safe writes
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonEventCallback {
    /// Create a new JSON callback writing to stdout
    pub fn stdout() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Create a JSON callback writing to a custom writer
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    fn write_event(&self, event: serde_json::Value) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", event);
            let _ = writer.flush();
        }
    }
}

impl DeploymentCallback for JsonEventCallback {
    fn on_event(&self, event: &DeploymentEvent) {
        let mut json = serde_json::json!({
            "event": event.kind().as_str().to_ascii_lowercase(),
            "command": "deploy",
            "destination": event.destination(),
        });
        if let Some(source) = event.source() {
            json["version"] = serde_json::json!(source.version.get());
            json["source"] = serde_json::json!(source.path);
        }
        if let Some(message) = event.message() {
            let key = if event.kind() == EventKind::Failed {
                "error"
            } else {
                "message"
            };
            json[key] = serde_json::json!(message);
        }
        self.write_event(json);
    }
}
