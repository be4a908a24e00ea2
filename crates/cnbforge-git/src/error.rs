//! Error types for git credential resolution

use std::path::PathBuf;
use thiserror::Error;

/// Git credential errors
#[derive(Debug, Error)]
pub enum GitError {
    // ============ Input Errors ============
    #[error("could not parse git secret argument {argument}")]
    InvalidSecretArgument { argument: String },

    #[error("Invalid git URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // ============ Resolution Errors ============
    #[error("no credentials found for {url}")]
    NoCredentials { url: String },

    // ============ Secret Errors ============
    #[error("Failed to read secret {secret} at {path}: {source}")]
    SecretRead {
        secret: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed secret {secret}: {reason}")]
    MalformedSecret { secret: String, reason: String },

    // ============ Wrapped Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for git credential resolution
pub type Result<T> = std::result::Result<T, GitError>;

impl GitError {
    /// Whether no configured credential applied, as opposed to a read or
    /// parse failure
    pub fn is_no_credentials(&self) -> bool {
        matches!(self, GitError::NoCredentials { .. })
    }
}
