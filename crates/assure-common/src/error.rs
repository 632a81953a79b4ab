//! Error types for control assurance

use thiserror::Error;

use crate::ids::DomainError;
use crate::registry::RegistryError;

/// Assurance error type
#[derive(Error, Debug)]
pub enum AssureError {
    /// No control registered under the given id
    #[error("control not found: {0}")]
    ControlNotFound(String),

    /// Invalid domain value
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Asset registry lookup failed
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration error
    #[error("config error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for assurance operations
pub type AssureResult<T> = Result<T, AssureError>;
