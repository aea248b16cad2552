//! RemoteEntry entity - one child in a destination listing

use serde::{Deserialize, Serialize};

use super::NodeKind;
use crate::domain::value_objects::Guid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub guid: Guid,
    pub kind: NodeKind,
}

impl RemoteEntry {
    pub fn new(name: impl Into<String>, guid: Guid, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            guid,
            kind,
        }
    }

    pub fn file(name: impl Into<String>, guid: impl Into<Guid>) -> Self {
        Self::new(name, guid.into(), NodeKind::File)
    }

    pub fn directory(name: impl Into<String>, guid: impl Into<Guid>) -> Self {
        Self::new(name, guid.into(), NodeKind::Directory)
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }
}
