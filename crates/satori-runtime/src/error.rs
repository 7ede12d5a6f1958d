//! Runtime error types.

use thiserror::Error;

use satori_core::{AdapterError, TransportError};

use crate::config::ConfigError;

/// Errors that stop the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// A transport required by the serve mode is missing or failed to start.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No `[[satori]]` entry is configured.
    #[error("no Satori endpoint configured")]
    NoEndpoint,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
