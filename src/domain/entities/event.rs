//! DeploymentEvent entity - an immutable record of one deployment decision

use std::fmt;

use serde::Serialize;

use crate::domain::value_objects::Version;

/// Kind of a deployment event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Start,
    End,
    Created,
    Updated,
    Deleted,
    Failed,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Start => "START",
            EventKind::End => "END",
            EventKind::Created => "CREATED",
            EventKind::Updated => "UPDATED",
            EventKind::Deleted => "DELETED",
            EventKind::Failed => "FAILED",
        }
    }

    /// CREATED, UPDATED and DELETED describe a change to a node;
    /// the others bracket the deployment.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            EventKind::Created | EventKind::Updated | EventKind::Deleted
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The source side of an event: a version and a path in the source store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSource {
    pub version: Version,
    pub path: String,
}

impl EventSource {
    pub fn new(version: Version, path: impl Into<String>) -> Self {
        Self {
            version,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentEvent {
    kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<EventSource>,
    destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl DeploymentEvent {
    pub fn new(kind: EventKind, source: Option<EventSource>, destination: impl Into<String>) -> Self {
        Self {
            kind,
            source,
            destination: destination.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn source(&self) -> Option<&EventSource> {
        self.source.as_ref()
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for DeploymentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.destination)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        let event = DeploymentEvent::new(EventKind::Failed, None, "/live").with_message("boom");
        assert_eq!(event.to_string(), "FAILED /live: boom");
    }

    #[test]
    fn structural_kinds() {
        assert!(EventKind::Created.is_structural());
        assert!(EventKind::Deleted.is_structural());
        assert!(!EventKind::Start.is_structural());
        assert!(!EventKind::Failed.is_structural());
    }

    #[test]
    fn serializes_without_empty_fields() {
        let event = DeploymentEvent::new(
            EventKind::Created,
            Some(EventSource::new(Version::new(3), "/www/a")),
            "/live/a",
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "CREATED");
        assert_eq!(json["source"]["version"], 3);
        assert!(json.get("message").is_none());
    }
}
