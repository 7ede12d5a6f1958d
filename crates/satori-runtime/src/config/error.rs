//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or resolving the configuration.
///
/// All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file extension is unknown or its format feature is disabled.
    #[error("Unsupported or disabled configuration file format: .{0}")]
    UnsupportedFormat(String),

    /// Extraction from the merged sources failed.
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// A section required by the serve mode is absent.
    #[error("Missing `{0}` section in a [[satori]] entry")]
    MissingSection(&'static str),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
