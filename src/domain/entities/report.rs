//! DeploymentReport - what happened during one deployment

use super::{DeploymentEvent, EventKind};
use crate::domain::value_objects::Version;

/// Events in delivery order plus the version that was deployed
#[derive(Debug, Clone, Default)]
pub struct DeploymentReport {
    version: Option<Version>,
    events: Vec<DeploymentEvent>,
}

impl DeploymentReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: DeploymentEvent) {
        self.events.push(event);
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = Some(version);
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn events(&self) -> &[DeploymentEvent] {
        &self.events
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn created(&self) -> usize {
        self.count(EventKind::Created)
    }

    pub fn updated(&self) -> usize {
        self.count(EventKind::Updated)
    }

    pub fn deleted(&self) -> usize {
        self.count(EventKind::Deleted)
    }

    /// Whether any node was created, updated or deleted
    pub fn has_changes(&self) -> bool {
        self.events.iter().any(|e| e.kind().is_structural())
    }

    /// Destination paths of structural events, in delivery order
    pub fn changed_paths(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter(|e| e.kind().is_structural())
            .map(|e| e.destination())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_kind() {
        let mut report = DeploymentReport::new();
        report.push(DeploymentEvent::new(EventKind::Start, None, "/"));
        report.push(DeploymentEvent::new(EventKind::Created, None, "/a"));
        report.push(DeploymentEvent::new(EventKind::Created, None, "/a/b"));
        report.push(DeploymentEvent::new(EventKind::Deleted, None, "/c"));
        report.push(DeploymentEvent::new(EventKind::End, None, "/"));

        assert_eq!(report.created(), 2);
        assert_eq!(report.deleted(), 1);
        assert_eq!(report.updated(), 0);
        assert!(report.has_changes());
        assert_eq!(report.changed_paths(), vec!["/a", "/a/b", "/c"]);
    }

    #[test]
    fn bracketing_only_is_not_a_change() {
        let mut report = DeploymentReport::new();
        report.push(DeploymentEvent::new(EventKind::Start, None, "/"));
        report.push(DeploymentEvent::new(EventKind::End, None, "/"));
        assert!(!report.has_changes());
    }
}
