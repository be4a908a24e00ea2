//! Lifecycle image provider and metadata

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use cnbforge_core::{Image, labels};
use cnbforge_registry::{RegistryClient, RegistryKeychain};

use crate::error::{CnbError, Result};

/// Supplies the image carrying the lifecycle executable
#[async_trait]
pub trait LifecycleProvider: Send + Sync {
    async fn get_image(&self) -> Result<Image>;
}

/// Fetches the lifecycle image from a registry on every call
pub struct RegistryLifecycleProvider {
    registry: Arc<dyn RegistryClient>,
    keychain: Arc<dyn RegistryKeychain>,
    image: String,
}

impl RegistryLifecycleProvider {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        keychain: Arc<dyn RegistryKeychain>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            keychain,
            image: image.into(),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

#[async_trait]
impl LifecycleProvider for RegistryLifecycleProvider {
    async fn get_image(&self) -> Result<Image> {
        let (image, resolved) = self
            .registry
            .fetch(self.keychain.as_ref(), &self.image)
            .await?;
        tracing::debug!(image = %self.image, %resolved, "fetched lifecycle image");
        Ok(image)
    }
}

/// API versions a lifecycle speaks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSet {
    #[serde(default)]
    pub deprecated: Vec<String>,
    #[serde(default)]
    pub supported: Vec<String>,
}

impl ApiSet {
    pub fn is_empty(&self) -> bool {
        self.deprecated.is_empty() && self.supported.is_empty()
    }

    /// Whether `api` is compatible with a supported or deprecated version
    ///
    /// Pre-1.0 APIs must match major and minor exactly; from 1.0 a newer
    /// minor of the same major is compatible.
    pub fn supports(&self, api: &str) -> bool {
        self.supported
            .iter()
            .chain(self.deprecated.iter())
            .any(|candidate| api_compatible(candidate, api))
    }
}

fn parse_api(api: &str) -> Option<(u64, u64)> {
    let (major, minor) = api.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

fn api_compatible(available: &str, requested: &str) -> bool {
    match (parse_api(available), parse_api(requested)) {
        (Some((a_major, a_minor)), Some((r_major, r_minor))) => {
            if a_major != r_major {
                false
            } else if a_major == 0 {
                a_minor == r_minor
            } else {
                a_minor >= r_minor
            }
        }
        _ => available == requested,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleApis {
    #[serde(default)]
    pub buildpack: ApiSet,
    #[serde(default)]
    pub platform: ApiSet,
}

/// Contents of the lifecycle metadata label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleMetadata {
    pub version: String,
    #[serde(default)]
    pub apis: LifecycleApis,
}

impl LifecycleMetadata {
    /// Read metadata from a lifecycle image
    pub fn from_image(image: &Image) -> Result<Self> {
        image
            .label_json(labels::LIFECYCLE_METADATA)?
            .ok_or_else(|| CnbError::MissingLifecycleMetadata {
                label: labels::LIFECYCLE_METADATA.to_string(),
            })
    }
}
