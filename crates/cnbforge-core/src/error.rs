//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid builder spec: {message}")]
    InvalidBuilderSpec { message: String },

    #[error("Invalid buildpack reference in group {group}: {message}")]
    InvalidBuildpackRef { group: usize, message: String },

    #[error("Invalid image config: {message}")]
    InvalidImageConfig { message: String },

    #[error("Invalid label {label}: {message}")]
    InvalidLabel { label: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
