//! Session configuration.
//!
//! A [`HierarchyConfig`] is plain data. It can be built in code, or loaded
//! from YAML or JSON; every field is optional in the file and falls back to
//! its default.
//!
//! ```yaml
//! ignore_filters: ["java.*", "javax.*", "com.example.generated.*"]
//! use_filters: true
//! default_field_mode: read
//! use_implementors: true
//! search_scope:
//!   kind: packages
//!   entries: ["com.example"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filter::{DEFAULT_IGNORE_FILTERS, IgnoreFilter};
use crate::oracle::SearchScope;
use crate::types::FieldAccessMode;

/// Settings that shape discovery for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Glob patterns over declaring-type names to leave out of every tree
    pub ignore_filters: Vec<String>,
    /// Apply `ignore_filters`; when `false` nothing is ignored
    pub use_filters: bool,
    /// Field access mode given to new roots
    pub default_field_mode: FieldAccessMode,
    /// Narrow interface call targets to a sole implementor
    pub use_implementors: bool,
    /// Where reference searches look
    pub search_scope: SearchScope,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            ignore_filters: DEFAULT_IGNORE_FILTERS
                .iter()
                .map(ToString::to_string)
                .collect(),
            use_filters: true,
            default_field_mode: FieldAccessMode::default(),
            use_implementors: true,
            search_scope: SearchScope::default(),
        }
    }
}

impl HierarchyConfig {
    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] on malformed input.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] on malformed input.
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load from a file: YAML for `.yml`/`.yaml`, JSON otherwise.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a parse error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if is_yaml(path) {
            Self::from_yaml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// Write to a file, choosing the format the same way as [`load`](Self::load).
    ///
    /// # Errors
    ///
    /// Returns an I/O or serialization error.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = if is_yaml(path) {
            serde_yaml::to_string(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Compile the effective ignore filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if a pattern is not a valid glob.
    pub fn ignore_filter(&self) -> Result<IgnoreFilter> {
        if self.use_filters {
            IgnoreFilter::new(self.ignore_filters.iter().cloned())
        } else {
            Ok(IgnoreFilter::empty())
        }
    }

    /// Check the configuration without building a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for a bad filter, or
    /// [`Error::Config`] for an empty restricted search scope.
    pub fn validate(&self) -> Result<()> {
        self.ignore_filter()?;
        let empty_scope = match &self.search_scope {
            SearchScope::Workspace => false,
            SearchScope::Units(units) => units.is_empty(),
            SearchScope::Packages(packages) => packages.is_empty(),
        };
        if empty_scope {
            return Err(Error::Config(
                "search scope must name at least one unit or package".to_string(),
            ));
        }
        Ok(())
    }
}

/// Split a comma-separated filter list, trimming entries and skipping empties.
#[must_use]
pub fn parse_filter_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
}
