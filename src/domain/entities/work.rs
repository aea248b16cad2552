//! DeploymentWork entity - a unit of deferred work for the transfer workers

use super::{DeploymentEvent, VersionedNode};
use crate::domain::value_objects::{Ticket, Version};

/// What a worker must do for one work item
#[derive(Debug, Clone, Copy)]
pub enum WorkAction<'a> {
    /// Stream a file's content to the destination path
    Write {
        node: &'a VersionedNode,
        version: Version,
        create: bool,
    },
    /// Remove the destination path
    Delete,
}

/// Created by the tree walk in queued mode, consumed exactly once by a
/// transfer worker.
#[derive(Debug, Clone)]
pub struct DeploymentWork {
    event: DeploymentEvent,
    ticket: Ticket,
    node: Option<VersionedNode>,
    version: Option<Version>,
    create: bool,
}

impl DeploymentWork {
    /// A content transfer; `event` is CREATED or UPDATED.
    ///
    /// `create` is false only when overwriting an existing destination file.
    pub fn transfer(
        event: DeploymentEvent,
        ticket: Ticket,
        node: VersionedNode,
        version: Version,
        create: bool,
    ) -> Self {
        Self {
            event,
            ticket,
            node: Some(node),
            version: Some(version),
            create,
        }
    }

    /// A delete; `event` is DELETED.
    pub fn delete(event: DeploymentEvent, ticket: Ticket) -> Self {
        Self {
            event,
            ticket,
            node: None,
            version: None,
            create: false,
        }
    }

    pub fn event(&self) -> &DeploymentEvent {
        &self.event
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn destination(&self) -> &str {
        self.event.destination()
    }

    pub fn action(&self) -> WorkAction<'_> {
        match (&self.node, self.version) {
            (Some(node), Some(version)) => WorkAction::Write {
                node,
                version,
                create: self.create,
            },
            _ => WorkAction::Delete,
        }
    }

    pub fn into_event(self) -> DeploymentEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ContentInfo, EventKind, EventSource};
    use crate::domain::value_objects::Guid;

    #[test]
    fn transfer_carries_create_flag() {
        let node = VersionedNode::file("/a", "a", Guid::new("g"), ContentInfo::default());
        let event = DeploymentEvent::new(
            EventKind::Created,
            Some(EventSource::new(Version::new(1), "/a")),
            "/t/a",
        );
        let work = DeploymentWork::transfer(event, Ticket::new("t1"), node, Version::new(1), true);
        assert!(matches!(work.action(), WorkAction::Write { create: true, .. }));
        assert_eq!(work.destination(), "/t/a");
    }

    #[test]
    fn delete_has_no_node() {
        let event = DeploymentEvent::new(EventKind::Deleted, None, "/t/old");
        let work = DeploymentWork::delete(event, Ticket::new("t1"));
        assert!(matches!(work.action(), WorkAction::Delete));
        assert_eq!(work.into_event().kind(), EventKind::Deleted);
    }
}
