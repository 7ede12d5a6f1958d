//! Error types for the Satori framework.

use thiserror::Error;

use satori_core::ApiError;

/// Errors raised by the framework's stores and built-in commands.
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// A store file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A store file holds invalid JSON.
    #[error("{path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A reply could not be delivered.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result type for framework operations.
pub type FrameworkResult<T> = Result<T, FrameworkError>;
