//! Package exclusion patterns.
//!
//! A symbol is ignored when the fully qualified name of its declaring type
//! matches any pattern. Patterns use glob syntax: `*` matches any run of
//! characters including `.`, so `java.*` covers every type below `java`.
//! Matching is case-sensitive.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{Error, Result};

/// Patterns applied when no configuration says otherwise.
pub const DEFAULT_IGNORE_FILTERS: &[&str] = &["java.*", "javax.*"];

/// Compiled, ordered set of ignore patterns.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    patterns: Vec<String>,
    set: GlobSet,
}

impl IgnoreFilter {
    /// Compile `patterns`, keeping their order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if a pattern is not a valid glob.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let set = build_glob_set(&patterns)?;
        Ok(Self { patterns, set })
    }

    /// A filter that ignores nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// Returns `true` if `type_name` matches any pattern.
    #[must_use]
    pub fn is_ignored(&self, type_name: &str) -> bool {
        self.set.is_match(type_name)
    }

    /// Patterns in the order they were given.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns `true` if there are no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        let patterns: Vec<String> = DEFAULT_IGNORE_FILTERS
            .iter()
            .map(ToString::to_string)
            .collect();
        let set = build_glob_set(&patterns).unwrap_or_else(|_| GlobSet::empty());
        Self { patterns, set }
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| Error::InvalidPattern {
        pattern: "<combined>".to_string(),
        source,
    })
}
