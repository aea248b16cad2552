//! RemoteSession port - the destination side of a deployment
//!
//! A session is a begin / prepare / commit / abort handshake plus per-node
//! operations, all scoped by the ticket returned from `begin`. Every call may
//! fail with a `TransportError`; the engine surfaces these and never retries.

use std::fmt;
use std::io::{self, Write};

use thiserror::Error;

use crate::domain::entities::{NodeMetadata, RemoteEntry};
use crate::domain::value_objects::{split_parent, Guid, Ticket, Version};

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed for user '{user}'")]
    Authentication { user: String },

    #[error("invalid or expired ticket {0}")]
    InvalidTicket(Ticket),

    #[error("remote path not found: {0}")]
    NotFound(String),

    #[error("{operation} {path} rejected: {message}")]
    Rejected {
        operation: String,
        path: String,
        message: String,
    },

    #[error("stream to {path} failed: {message}")]
    Stream { path: String, message: String },
}

impl TransportError {
    pub fn rejected(operation: &str, path: &str, message: impl Into<String>) -> Self {
        TransportError::Rejected {
            operation: operation.to_string(),
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn stream(path: &str, err: &io::Error) -> Self {
        TransportError::Stream {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

/// User name and password presented at `begin`
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parameters of `open_write`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    /// `true` creates a new node, `false` overwrites an existing file
    pub create: bool,
    pub path: String,
    pub guid: Guid,
    pub encoding: String,
    pub mime_type: String,
    pub metadata: NodeMetadata,
}

/// Writable byte sink returned by `open_write`.
///
/// The write only takes effect once `close` returns `Ok`.
pub trait ContentSink: Write + Send {
    fn close(self: Box<Self>) -> io::Result<()>;
}

pub trait RemoteSession: Send + Sync {
    /// Start a deployment transaction against `target`
    fn begin(
        &self,
        target: &str,
        store: &str,
        version: Version,
        credentials: &Credentials,
    ) -> TransportResult<Ticket>;

    /// Called once by each transfer worker before its first remote call
    fn attach_worker(&self, _ticket: &Ticket) -> TransportResult<()> {
        Ok(())
    }

    fn prepare(&self, ticket: &Ticket) -> TransportResult<()>;

    /// Only valid after a successful `prepare`
    fn commit(&self, ticket: &Ticket) -> TransportResult<()>;

    fn abort(&self, ticket: &Ticket) -> TransportResult<()>;

    /// Children of the directory at `path`, ordered by name
    fn list(&self, ticket: &Ticket, path: &str) -> TransportResult<Vec<RemoteEntry>>;

    /// The entry at `path`, or `None` when nothing is there.
    ///
    /// Default resolves through a listing of the parent directory.
    fn lookup(&self, ticket: &Ticket, path: &str) -> TransportResult<Option<RemoteEntry>> {
        let Some((parent, name)) = split_parent(path) else {
            return Ok(Some(RemoteEntry::directory("", Guid::new(""))));
        };
        match self.list(ticket, &parent) {
            Ok(entries) => Ok(entries.into_iter().find(|e| e.name == name)),
            Err(TransportError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn create_directory(
        &self,
        ticket: &Ticket,
        path: &str,
        guid: &Guid,
        metadata: &NodeMetadata,
    ) -> TransportResult<()>;

    fn update_directory(
        &self,
        ticket: &Ticket,
        path: &str,
        guid: &Guid,
        metadata: &NodeMetadata,
    ) -> TransportResult<()>;

    fn delete(&self, ticket: &Ticket, path: &str) -> TransportResult<()>;

    fn open_write(
        &self,
        ticket: &Ticket,
        request: &WriteRequest,
    ) -> TransportResult<Box<dyn ContentSink>>;
}
