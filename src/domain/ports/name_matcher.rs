//! NameMatcher port - caller-supplied exclusion of paths

pub trait NameMatcher: Send + Sync {
    /// Whether `path` is excluded
    fn matches(&self, path: &str, is_directory: bool) -> bool;

    /// Whether a decision touching the source and/or destination path is
    /// vetoed. Either side matching is enough.
    fn excludes(&self, source: Option<&str>, destination: Option<&str>, is_directory: bool) -> bool {
        source.is_some_and(|p| self.matches(p, is_directory))
            || destination.is_some_and(|p| self.matches(p, is_directory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Suffix(&'static str);

    impl NameMatcher for Suffix {
        fn matches(&self, path: &str, _is_directory: bool) -> bool {
            path.ends_with(self.0)
        }
    }

    #[test]
    fn either_side_vetoes() {
        let m = Suffix(".tmp");
        assert!(m.excludes(Some("/src/a.tmp"), Some("/dst/a"), false));
        assert!(m.excludes(None, Some("/dst/b.tmp"), false));
        assert!(!m.excludes(Some("/src/a"), None, false));
        assert!(!m.excludes(None, None, true));
    }
}
