//! Error types for registry operations

use thiserror::Error;

use cnbforge_core::CoreError;

/// Registry operation errors
#[derive(Debug, Error)]
pub enum RegistryError {
    // ============ Reference Errors ============
    #[error("Invalid image reference: {reference}")]
    InvalidReference { reference: String },

    // ============ Fetch Errors ============
    #[error("Image not found: {reference}")]
    ImageNotFound { reference: String },

    #[error("Failed to fetch {reference}: {message}")]
    FetchFailed { reference: String, message: String },

    #[error("Invalid image {reference}: {message}")]
    InvalidImage { reference: String, message: String },

    // ============ Save Errors ============
    #[error("Failed to save {reference}: {message}")]
    PushFailed { reference: String, message: String },

    // ============ Authentication Errors ============
    #[error("Authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    // ============ Other ============
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Serialization(e.to_string())
    }
}
