//! In-memory registry
//!
//! Stores images in memory, useful for unit tests and for callers that
//! compose builders without a real registry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use cnbforge_core::Image;

use crate::auth::RegistryKeychain;
use crate::client::RegistryClient;
use crate::error::{RegistryError, Result};
use crate::reference::OciReference;

/// In-memory registry client
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    /// Storage: reference -> image
    images: Arc<RwLock<HashMap<String, Image>>>,
    /// Track operation counts for assertions
    operations: Arc<RwLock<OperationCounts>>,
    /// Reject every save when set
    reject_saves: Arc<RwLock<Option<String>>>,
}

/// Counts of operations performed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub fetches: usize,
    pub saves: usize,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image under a reference
    pub fn with_image(self, reference: &str, image: Image) -> Self {
        self.put(reference, image);
        self
    }

    pub fn put(&self, reference: &str, image: Image) {
        self.images
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference.to_string(), image);
    }

    pub fn get(&self, reference: &str) -> Option<Image> {
        self.images
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .cloned()
    }

    pub fn image_count(&self) -> usize {
        self.images.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Make every subsequent save fail with the given message
    pub fn reject_saves(&self, message: impl Into<String>) {
        *self.reject_saves.write().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Reset operation counts
    pub fn reset_counts(&self) {
        *self.operations.write().unwrap_or_else(PoisonError::into_inner) =
            OperationCounts::default();
    }

    fn record(&self, update: impl FnOnce(&mut OperationCounts)) {
        update(&mut self.operations.write().unwrap_or_else(PoisonError::into_inner));
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn fetch(
        &self,
        keychain: &dyn RegistryKeychain,
        reference: &str,
    ) -> Result<(Image, String)> {
        self.record(|ops| ops.fetches += 1);

        let parsed = OciReference::parse(reference)?;
        keychain.resolve(&parsed.registry)?;

        let image = self.get(reference).ok_or_else(|| RegistryError::ImageNotFound {
            reference: reference.to_string(),
        })?;
        let resolved = parsed.with_digest(&image.digest()?);
        Ok((image, resolved))
    }

    async fn save(&self, keychain: &dyn RegistryKeychain, tag: &str, image: &Image) -> Result<String> {
        self.record(|ops| ops.saves += 1);

        let parsed = OciReference::parse(tag)?;
        keychain.resolve(&parsed.registry)?;

        if let Some(message) = self
            .reject_saves
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(RegistryError::PushFailed {
                reference: tag.to_string(),
                message,
            });
        }

        let identifier = parsed.with_digest(&image.digest()?);
        let mut images = self.images.write().unwrap_or_else(PoisonError::into_inner);
        images.insert(tag.to_string(), image.clone());
        images.insert(identifier.clone(), image.clone());
        Ok(identifier)
    }
}
