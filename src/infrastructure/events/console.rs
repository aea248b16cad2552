//! Console deployment callback

use crate::domain::entities::{DeploymentEvent, EventKind};
use crate::domain::ports::DeploymentCallback;
use std::io::{self, Write};
use std::sync::Mutex;

/// Writes one human-readable line per event
pub struct ConsoleEventCallback {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleEventCallback {
    pub fn stderr() -> Self {
        Self::with_writer(io::stderr())
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

fn marker(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Start => "==>",
        EventKind::End => "<==",
        EventKind::Created => "  +",
        EventKind::Updated => "  ~",
        EventKind::Deleted => "  -",
        EventKind::Failed => "  !",
    }
}

impl DeploymentCallback for ConsoleEventCallback {
    fn on_event(&self, event: &DeploymentEvent) {
        let mut line = format!("{} {}", marker(event.kind()), event);
        if let Some(source) = event.source() {
            if event.kind().is_structural() {
                line.push_str(&format!("  (from {}@{})", source.path, source.version));
            }
        }
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
        }
    }
}
