//! Differ Domain Service
//!
//! Sorted merge-join of one directory's source children against the
//! destination's children. Both listings must be ordered by name using
//! byte-wise comparison; the join walks them in lock-step, so each pair of
//! listings costs one comparison per entry.

use std::cmp::Ordering;

use crate::domain::entities::{RemoteEntry, VersionedNode};

/// What to do with one name in a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision<'a> {
    /// Only in the source: materialize it
    Create(&'a VersionedNode),
    /// Source file whose GUID differs from the destination entry.
    /// The destination may be a file or a directory.
    Update {
        source: &'a VersionedNode,
        dest: &'a RemoteEntry,
    },
    /// Both are directories with different GUIDs: push metadata, recurse
    Descend {
        source: &'a VersionedNode,
        dest: &'a RemoteEntry,
    },
    /// Source directory over a destination file: delete, then materialize
    Replace {
        source: &'a VersionedNode,
        dest: &'a RemoteEntry,
    },
    /// Only in the destination
    Delete(&'a RemoteEntry),
    /// Same GUID on both sides
    Unchanged {
        source: &'a VersionedNode,
        dest: &'a RemoteEntry,
    },
}

impl Decision<'_> {
    /// The name this decision is about
    pub fn name(&self) -> &str {
        match self {
            Decision::Create(source) => source.name(),
            Decision::Delete(dest) => &dest.name,
            Decision::Update { dest, .. }
            | Decision::Descend { dest, .. }
            | Decision::Replace { dest, .. }
            | Decision::Unchanged { dest, .. } => &dest.name,
        }
    }

    /// Whether applying this decision changes the destination
    pub fn is_change(&self) -> bool {
        !matches!(self, Decision::Unchanged { .. } | Decision::Descend { .. })
    }
}

/// Join two name-ordered listings into one decision per distinct name.
///
/// Decisions come out in name order.
pub fn merge_join<'a>(source: &'a [VersionedNode], dest: &'a [RemoteEntry]) -> Vec<Decision<'a>> {
    let mut decisions = Vec::with_capacity(source.len().max(dest.len()));
    let (mut i, mut j) = (0, 0);

    loop {
        let decision = match (source.get(i), dest.get(j)) {
            (None, None) => break,
            (Some(s), None) => {
                i += 1;
                Decision::Create(s)
            }
            (None, Some(d)) => {
                j += 1;
                Decision::Delete(d)
            }
            (Some(s), Some(d)) => match s.name().cmp(d.name.as_str()) {
                Ordering::Less => {
                    i += 1;
                    Decision::Create(s)
                }
                Ordering::Greater => {
                    j += 1;
                    Decision::Delete(d)
                }
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                    pair(s, d)
                }
            },
        };
        decisions.push(decision);
    }

    decisions
}

fn pair<'a>(source: &'a VersionedNode, dest: &'a RemoteEntry) -> Decision<'a> {
    if source.guid() == &dest.guid {
        Decision::Unchanged { source, dest }
    } else if !source.is_directory() {
        Decision::Update { source, dest }
    } else if dest.is_directory() {
        Decision::Descend { source, dest }
    } else {
        Decision::Replace { source, dest }
    }
}

/// Order source nodes by name, byte-wise
pub fn sort_nodes(nodes: &mut [VersionedNode]) {
    nodes.sort_by(|a, b| a.name().cmp(b.name()));
}

/// Order destination entries by name, byte-wise
pub fn sort_entries(entries: &mut [RemoteEntry]) {
    entries.sort_by(|a, b| a.name.cmp(&b.name));
}
