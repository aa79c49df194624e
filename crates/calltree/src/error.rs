//! Error types for call hierarchy operations.
//!
//! Errors fall into the categories the engine distinguishes at runtime:
//!
//! - **Unresolvable references** never become errors. Discovery skips them.
//! - **Backend failures** (`Error::Backend`) come from the reference index or the
//!   syntax provider. Discovery logs them and reports "no results" for the one node
//!   whose expansion failed; siblings and the session are unaffected.
//! - **Cancellation** (`Error::Cancelled`) always propagates to the caller and is
//!   never cached, so the same expansion can be retried.
//! - **Configuration and lookup failures** (`Config`, `InvalidPattern`, `NotFound`,
//!   I/O and parse errors) are returned from the public API as-is.

use thiserror::Error;

/// Result type for call hierarchy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for call hierarchy operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller-supplied cancellation token was triggered.
    #[error("operation cancelled")]
    Cancelled,

    /// The reference index or syntax provider failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// An ignore filter pattern could not be compiled.
    #[error("invalid ignore filter '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The underlying glob error.
        #[source]
        source: globset::Error,
    },

    /// Invalid configuration or arguments.
    #[error("configuration error: {0}")]
    Config(String),

    /// A symbol or tree node was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a backend error from any displayable message.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Returns `true` if this error is the cooperative cancellation outcome.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
