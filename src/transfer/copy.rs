//! Streaming one file from the source store into a remote sink

use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;

use tracing::trace;

use crate::domain::entities::VersionedNode;
use crate::domain::ports::{
    FilterChain, RemoteSession, SourceStore, StoreError, TransportError, WriteRequest,
};
use crate::domain::value_objects::{Ticket, Version};
use crate::error::DeployResult;

/// Copies file content through the configured filters with a fixed buffer
pub struct ContentCopier {
    store: Arc<dyn SourceStore>,
    session: Arc<dyn RemoteSession>,
    filters: FilterChain,
    buffer_size: usize,
}

impl ContentCopier {
    pub fn new(
        store: Arc<dyn SourceStore>,
        session: Arc<dyn RemoteSession>,
        filters: FilterChain,
        buffer_size: usize,
    ) -> Self {
        Self {
            store,
            session,
            filters,
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn SourceStore> {
        &self.store
    }

    pub fn session(&self) -> &Arc<dyn RemoteSession> {
        &self.session
    }

    /// Write `node`'s content to `destination`, returning the bytes copied.
    ///
    /// The remote write only takes effect when the sink closes cleanly; on
    /// any error the sink is dropped unclosed.
    pub fn copy(
        &self,
        ticket: &Ticket,
        version: Version,
        node: &VersionedNode,
        destination: &str,
        create: bool,
    ) -> DeployResult<u64> {
        let mut reader = self.store.open_content(version, node.path())?;
        let request = WriteRequest {
            create,
            path: destination.to_string(),
            guid: node.guid().clone(),
            encoding: node.encoding().to_string(),
            mime_type: node.mime_type().to_string(),
            metadata: node.metadata().clone(),
        };

        let sink = self.session.open_write(ticket, &request)?;
        let mut sink = self
            .filters
            .apply(sink, destination, node.encoding(), node.mime_type())
            .map_err(|e| TransportError::stream(destination, &e))?;

        let mut buffer = vec![0u8; self.buffer_size];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(StoreError::Read {
                        path: node.path().to_string(),
                        message: e.to_string(),
                    }
                    .into())
                }
            };
            sink.write_all(&buffer[..n])
                .map_err(|e| TransportError::stream(destination, &e))?;
            total += n as u64;
        }

        sink.flush()
            .map_err(|e| TransportError::stream(destination, &e))?;
        sink.close()
            .map_err(|e| TransportError::stream(destination, &e))?;
        trace!(path = destination, bytes = total, "content copied");
        Ok(total)
    }
}
