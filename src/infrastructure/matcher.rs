//! Gitignore-style exclusion matcher
//!
//! Patterns are matched against node paths with the leading `/` removed, so
//! `*.bak` matches at any depth and `/drafts` only at the top of the tree.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use thiserror::Error;

use crate::domain::ports::NameMatcher;

/// Maximum number of patterns allowed
const MAX_PATTERNS: usize = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatcherError {
    #[error("invalid exclude pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("{count} exclude patterns exceeds the limit of {limit}")]
    TooManyPatterns { count: usize, limit: usize },

    #[error("failed to build exclude matcher: {0}")]
    Build(String),
}

#[derive(Debug)]
pub struct GlobMatcher {
    matcher: Gitignore,
    pattern_count: usize,
}

impl GlobMatcher {
    /// Build a matcher from gitignore lines. Blank lines and `#` comments
    /// are skipped.
    pub fn new<I, S>(patterns: I) -> Result<Self, MatcherError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new("");
        let mut pattern_count = 0;

        for line in patterns {
            let line = line.as_ref();
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            pattern_count += 1;
            if pattern_count > MAX_PATTERNS {
                return Err(MatcherError::TooManyPatterns {
                    count: pattern_count,
                    limit: MAX_PATTERNS,
                });
            }
            builder
                .add_line(None, trimmed)
                .map_err(|e| MatcherError::InvalidPattern {
                    pattern: trimmed.to_string(),
                    message: e.to_string(),
                })?;
        }

        let matcher = builder
            .build()
            .map_err(|e| MatcherError::Build(e.to_string()))?;
        Ok(Self {
            matcher,
            pattern_count,
        })
    }

    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }

    pub fn is_empty(&self) -> bool {
        self.pattern_count == 0
    }
}

impl NameMatcher for GlobMatcher {
    fn matches(&self, path: &str, is_directory: bool) -> bool {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() || self.is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(Path::new(relative), is_directory)
            .is_ignore()
    }
}
