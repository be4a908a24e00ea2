//! Error types for builder composition

use thiserror::Error;

use cnbforge_core::CoreError;
use cnbforge_registry::RegistryError;

/// Builder composition errors
#[derive(Debug, Error)]
pub enum CnbError {
    // ============ Lookup Errors ============
    #[error("Buildpack not found: {id}@{version}")]
    BuildpackNotFound { id: String, version: String },

    #[error("Layer {diff_id} for buildpack {id}@{version} not found in {image}")]
    BuildpackLayerNotFound {
        id: String,
        version: String,
        diff_id: String,
        image: String,
    },

    #[error("Buildpack order cycle detected: {cycle}")]
    BuildpackCycle { cycle: String },

    // ============ Lifecycle Errors ============
    #[error("Lifecycle image has no {label} label")]
    MissingLifecycleMetadata { label: String },

    // ============ Composition Errors ============
    #[error("No stack added to builder")]
    MissingStack,

    #[error("Build image is for stack {actual}, expected {expected}")]
    StackMismatch { expected: String, actual: String },

    #[error("Buildpack {buildpack} does not support stack {stack}")]
    UnsupportedStack { buildpack: String, stack: String },

    #[error("Buildpack {buildpack} uses buildpack API {api}, lifecycle supports: {supported}")]
    UnsupportedBuildpackApi {
        buildpack: String,
        api: String,
        supported: String,
    },

    // ============ Configuration Errors ============
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ Wrapped Errors ============
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for builder composition
pub type Result<T> = std::result::Result<T, CnbError>;

impl From<serde_json::Error> for CnbError {
    fn from(e: serde_json::Error) -> Self {
        CnbError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for CnbError {
    fn from(e: serde_yaml::Error) -> Self {
        CnbError::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for CnbError {
    fn from(e: toml::ser::Error) -> Self {
        CnbError::Serialization(e.to_string())
    }
}
