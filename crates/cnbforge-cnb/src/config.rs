//! Builder creator configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CnbError, Result};

/// Configuration for `RemoteBuilderCreator::from_config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorConfig {
    /// Version stamped into builder metadata
    #[serde(default = "default_product_version")]
    pub product_version: String,

    /// Reference of the image carrying the lifecycle
    pub lifecycle_image: String,
}

fn default_product_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl CreatorConfig {
    pub fn new(lifecycle_image: impl Into<String>) -> Self {
        Self {
            product_version: default_product_version(),
            lifecycle_image: lifecycle_image.into(),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lifecycle_image.trim().is_empty() {
            return Err(CnbError::InvalidConfig {
                message: "lifecycleImage must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
