//! Error types for the interception chain and fixture catalog.

use std::path::{Path, PathBuf};

/// Errors surfaced to the caller of a request, or to whoever configures a session.
///
/// Handler-local conditions (a predicate that does not match, a fixture miss outside
/// replay mode) are declines and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Bad mode, bad fixtures directory, bad header pattern.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Replay mode and nothing recorded for this request.
    #[error("No fixture recorded for {method} {url} (replay mode does not allow network access)")]
    NoFixture { method: String, url: String },

    /// The host is on the dropped list.
    #[error("Connection to {0} dropped")]
    ConnectionDropped(String),

    /// Propagated from the live transport; never retried here.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Fixture load or write failure.
    #[error("Fixture storage error at {path}: {message}")]
    Storage { path: PathBuf, message: String },

    /// Every handler declined.
    #[error("No handler produced a response for {method} {url}")]
    ChainExhausted { method: String, url: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ReplayError {
    pub(crate) fn storage(path: &Path, err: impl std::fmt::Display) -> Self {
        ReplayError::Storage {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ReplayError::Configuration(_) => "configuration",
            ReplayError::NoFixture { .. } => "no_fixture",
            ReplayError::ConnectionDropped(_) => "connection_dropped",
            ReplayError::Transport(_) => "transport",
            ReplayError::Storage { .. } => "storage",
            ReplayError::ChainExhausted { .. } => "chain_exhausted",
            ReplayError::InvalidRequest(_) => "invalid_request",
        }
    }
}

/// Result type for the reprise crate
pub type Result<T> = std::result::Result<T, ReplayError>;
