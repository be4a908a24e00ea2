//! Builder creation
//!
//! `create_builder` runs as two phases. `prepare` fetches inputs, resolves
//! every buildpack reference and composes the image without any registry
//! write. `publish` performs the single save and builds the record. A failure
//! in `prepare` therefore never reaches the registry.

use std::sync::Arc;

use cnbforge_core::{BuilderRecord, BuilderSpec, BuildpackMetadata, BuildpackStore, Image, Stack};
use cnbforge_registry::{RegistryClient, RegistryKeychain};

use crate::composer::BuilderComposer;
use crate::config::CreatorConfig;
use crate::error::Result;
use crate::lifecycle::{LifecycleProvider, RegistryLifecycleProvider};
use crate::repository::{NewBuildpackRepository, StoreBuildpackRepository};

/// A composed builder image that has not been published yet
#[derive(Debug, Clone)]
pub struct PreparedBuilder {
    pub image: Image,
    pub buildpacks: Vec<BuildpackMetadata>,
}

/// Composes builder images and publishes them to a registry
pub struct RemoteBuilderCreator {
    pub registry_client: Arc<dyn RegistryClient>,
    pub new_buildpack_repository: NewBuildpackRepository,
    pub lifecycle_provider: Arc<dyn LifecycleProvider>,
    /// Stamped into builder metadata
    pub product_version: String,
}

impl RemoteBuilderCreator {
    pub fn new(
        registry_client: Arc<dyn RegistryClient>,
        new_buildpack_repository: NewBuildpackRepository,
        lifecycle_provider: Arc<dyn LifecycleProvider>,
        product_version: impl Into<String>,
    ) -> Self {
        Self {
            registry_client,
            new_buildpack_repository,
            lifecycle_provider,
            product_version: product_version.into(),
        }
    }

    /// Wire a creator from configuration
    ///
    /// The lifecycle image and packaged buildpacks are fetched with
    /// `keychain`; the builder itself is published with the keychain passed
    /// to `create_builder`.
    pub fn from_config(
        config: &CreatorConfig,
        registry_client: Arc<dyn RegistryClient>,
        keychain: Arc<dyn RegistryKeychain>,
    ) -> Result<Self> {
        config.validate()?;

        let lifecycle_provider = Arc::new(RegistryLifecycleProvider::new(
            Arc::clone(&registry_client),
            Arc::clone(&keychain),
            config.lifecycle_image.clone(),
        ));
        let new_buildpack_repository =
            StoreBuildpackRepository::factory(Arc::clone(&registry_client), keychain);

        Ok(Self::new(
            registry_client,
            new_buildpack_repository,
            lifecycle_provider,
            config.product_version.clone(),
        ))
    }

    /// Compose a builder for `spec` on `stack` and publish it under `spec.tag`
    pub async fn create_builder(
        &self,
        keychain: &dyn RegistryKeychain,
        store: &BuildpackStore,
        stack: &Stack,
        spec: &BuilderSpec,
    ) -> Result<BuilderRecord> {
        spec.validate()?;

        let prepared = self.prepare(keychain, store, stack, spec).await?;
        self.publish(keychain, store, stack, spec, prepared).await
    }

    /// Fetch inputs, resolve buildpacks and compose the image
    pub async fn prepare(
        &self,
        keychain: &dyn RegistryKeychain,
        store: &BuildpackStore,
        stack: &Stack,
        spec: &BuilderSpec,
    ) -> Result<PreparedBuilder> {
        let (build_image, _) = self
            .registry_client
            .fetch(keychain, &stack.build_image)
            .await?;
        tracing::debug!(image = %stack.build_image, "fetched build image");

        let lifecycle_image = self.lifecycle_provider.get_image().await?;

        let mut composer = BuilderComposer::init(&lifecycle_image, self.product_version.clone())?;
        tracing::debug!(lifecycle = %composer.lifecycle().version, "initialized builder");

        composer.add_stack(build_image, stack)?;

        let repository = (self.new_buildpack_repository)(store);
        for (index, entry) in spec.order.iter().enumerate() {
            let mut group = Vec::with_capacity(entry.group.len());
            for buildpack in &entry.group {
                let info = repository
                    .find_by_id_and_version(buildpack.id(), buildpack.version())
                    .await?;
                group.push(info.optional(buildpack.optional));
            }
            tracing::debug!(group = index, buildpacks = group.len(), "added group");
            composer.add_group(group);
        }

        let image = composer.finalize()?;
        let buildpacks = composer.buildpacks().iter().map(BuildpackMetadata::from).collect();

        Ok(PreparedBuilder { image, buildpacks })
    }

    /// Save a prepared builder and record what was published
    pub async fn publish(
        &self,
        keychain: &dyn RegistryKeychain,
        store: &BuildpackStore,
        stack: &Stack,
        spec: &BuilderSpec,
        prepared: PreparedBuilder,
    ) -> Result<BuilderRecord> {
        let identifier = self
            .registry_client
            .save(keychain, &spec.tag, &prepared.image)
            .await?;
        tracing::info!(tag = %spec.tag, image = %identifier, "published builder");

        Ok(BuilderRecord::new(
            identifier,
            stack,
            store,
            prepared.buildpacks,
            spec.order.clone(),
            prepared.image.os(),
        ))
    }
}
