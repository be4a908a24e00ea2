//! Registry client contract

use async_trait::async_trait;

use cnbforge_core::Image;

use crate::auth::RegistryKeychain;
use crate::error::Result;

/// Fetches and publishes images
///
/// Retries and timeouts, if any, belong to implementations.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Fetch an image, returning it with its digest reference
    /// (`registry/repository@sha256:...`)
    async fn fetch(&self, keychain: &dyn RegistryKeychain, reference: &str)
    -> Result<(Image, String)>;

    /// Publish an image under `tag`, returning its digest reference
    async fn save(&self, keychain: &dyn RegistryKeychain, tag: &str, image: &Image)
    -> Result<String>;
}
