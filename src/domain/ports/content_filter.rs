//! ContentFilter port - streaming content transforms
//!
//! A filter wraps the sink returned by the session; bytes written to the
//! outer sink pass through every filter before reaching the receiver.

use std::fmt;
use std::io;
use std::sync::Arc;

use super::ContentSink;

pub trait ContentFilter: Send + Sync {
    fn name(&self) -> &str;

    fn wrap(
        &self,
        sink: Box<dyn ContentSink>,
        path: &str,
        encoding: &str,
        mime_type: &str,
    ) -> io::Result<Box<dyn ContentSink>>;
}

/// Filters applied in configured order.
///
/// The first filter sees the source bytes first, so it is wrapped last.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn ContentFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: Arc<dyn ContentFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(
        &self,
        mut sink: Box<dyn ContentSink>,
        path: &str,
        encoding: &str,
        mime_type: &str,
    ) -> io::Result<Box<dyn ContentSink>> {
        for filter in self.filters.iter().rev() {
            sink = filter.wrap(sink, path, encoding, mime_type)?;
        }
        Ok(sink)
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}
