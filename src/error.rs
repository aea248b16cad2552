//! Error types for treeship
//!
//! Uses `thiserror` for library errors. The binary wraps these with `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::entities::NodeKind;
use crate::domain::ports::{LockError, StoreError, TransportError};
use crate::domain::value_objects::Version;

/// Result type alias for deployment operations
pub type DeployResult<T> = Result<T, DeployError>;

/// Main error type for deployment operations
#[derive(Error, Debug)]
pub enum DeployError {
    /// The lease was not obtained within the retry budget
    #[error("could not acquire lock '{name}' after {attempts} attempt(s)")]
    LockTimeout { name: String, attempts: u32 },

    /// The lease was lost while the deployment was running
    #[error("lock '{name}' expired: {reason}")]
    LockExpired { name: String, reason: String },

    /// The lock provider itself failed
    #[error("lock provider error: {0}")]
    Lock(#[from] LockError),

    /// A remote call failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The source store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A deployment root is not the expected node type
    #[error("expected a {expected} at {path}, found a {found}")]
    StructuralMismatch {
        path: String,
        expected: NodeKind,
        found: NodeKind,
    },

    /// The destination root does not exist and may not be created
    #[error("destination not found: {path}")]
    DestinationNotFound { path: String },

    /// The compensating rollback failed
    #[error("rollback to destination version {version} failed: {cause}")]
    Rollback {
        version: Version,
        #[source]
        cause: Box<DeployError>,
    },

    /// Every transfer worker has exited while work was still being queued
    #[error("transfer pipeline stopped before the walk completed")]
    PipelineStopped,

    /// A transfer worker thread panicked
    #[error("transfer worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration file or value
    #[error("invalid configuration in {file}: {message}")]
    Config { file: PathBuf, message: String },

    /// A deployment failed after the lock was taken
    #[error(
        "deployment of {source_path} (version {}) to {destination} failed: {cause}{}",
        version_label(.version),
        rollback_suffix(.rollback)
    )]
    Failed {
        destination: String,
        source_path: String,
        version: Option<Version>,
        #[source]
        cause: Box<DeployError>,
        rollback: Option<Box<DeployError>>,
    },
}

impl DeployError {
    /// The underlying failure, looking through a `Failed` wrapper.
    pub fn root_cause(&self) -> &DeployError {
        match self {
            DeployError::Failed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Secondary rollback failure attached to a failed deployment, if any.
    pub fn rollback_error(&self) -> Option<&DeployError> {
        match self {
            DeployError::Failed { rollback, .. } => rollback.as_deref(),
            _ => None,
        }
    }

    /// Whether the failure came from losing (or never getting) the lease.
    pub fn is_lock_failure(&self) -> bool {
        matches!(
            self.root_cause(),
            DeployError::LockTimeout { .. } | DeployError::LockExpired { .. }
        )
    }
}

fn version_label(version: &Option<Version>) -> String {
    match version {
        Some(v) => v.to_string(),
        None => "unresolved".to_string(),
    }
}

fn rollback_suffix(rollback: &Option<Box<DeployError>>) -> String {
    match rollback {
        Some(err) => format!("; {}", err),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_lock_timeout() {
        let err = DeployError::LockTimeout {
            name: "treeship:web01:44100:live".to_string(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "could not acquire lock 'treeship:web01:44100:live' after 3 attempt(s)"
        );
    }

    #[test]
    fn test_error_display_structural_mismatch() {
        let err = DeployError::StructuralMismatch {
            path: "/www".to_string(),
            expected: NodeKind::Directory,
            found: NodeKind::File,
        };
        assert_eq!(err.to_string(), "expected a directory at /www, found a file");
    }

    #[test]
    fn test_failed_carries_identity_and_rollback() {
        let err = DeployError::Failed {
            destination: "web01:44100/live:/".to_string(),
            source_path: "site:/www".to_string(),
            version: Some(Version::new(7)),
            cause: Box::new(DeployError::Transport(TransportError::Connection(
                "reset by peer".to_string(),
            ))),
            rollback: Some(Box::new(DeployError::Rollback {
                version: Version::new(3),
                cause: Box::new(DeployError::Transport(TransportError::Connection(
                    "refused".to_string(),
                ))),
            })),
        };

        let text = err.to_string();
        assert!(text.starts_with("deployment of site:/www (version 7) to web01:44100/live:/"));
        assert!(text.contains("reset by peer"));
        assert!(text.contains("rollback to destination version 3 failed"));
        assert!(err.rollback_error().is_some());
        assert!(matches!(err.root_cause(), DeployError::Transport(_)));
    }

    #[test]
    fn test_unresolved_version_label() {
        let err = DeployError::Failed {
            destination: "d".to_string(),
            source_path: "s:/".to_string(),
            version: None,
            cause: Box::new(DeployError::PipelineStopped),
            rollback: None,
        };
        assert!(err.to_string().contains("(version unresolved)"));
        assert!(err.rollback_error().is_none());
    }

    #[test]
    fn test_lock_failure_detection_looks_through_wrapper() {
        let err = DeployError::Failed {
            destination: "d".to_string(),
            source_path: "s:/".to_string(),
            version: Some(Version::new(1)),
            cause: Box::new(DeployError::LockExpired {
                name: "l".to_string(),
                reason: "lost".to_string(),
            }),
            rollback: None,
        };
        assert!(err.is_lock_failure());
        assert!(!DeployError::PipelineStopped.is_lock_failure());
    }
}
