//! cnbforge Builder Composition
//!
//! Composes buildpack builder images and publishes them:
//!
//! - **Buildpack repository**: resolves `id@version` against a store snapshot
//! - **Lifecycle provider**: supplies the lifecycle image and its API metadata
//! - **Composer**: stack, lifecycle and buildpack layers plus builder labels
//! - **Creator**: the fail-fast pipeline ending in exactly one registry save
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cnbforge_cnb::{CreatorConfig, RemoteBuilderCreator};
//! use cnbforge_core::{BuilderSpec, BuildpackStore, Stack};
//! use cnbforge_registry::{DockerConfigKeychain, OciRegistryClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let keychain = Arc::new(DockerConfigKeychain::load(None)?);
//! let config = CreatorConfig::new("buildpacksio/lifecycle:0.17.0");
//! let creator = RemoteBuilderCreator::from_config(
//!     &config,
//!     Arc::new(OciRegistryClient::new()),
//!     keychain.clone(),
//! )?;
//!
//! let store = BuildpackStore::from_yaml(&std::fs::read_to_string("store.yaml")?)?;
//! let stack: Stack = serde_yaml::from_str(&std::fs::read_to_string("stack.yaml")?)?;
//! let spec = BuilderSpec::load_from("builder.yaml".as_ref())?;
//!
//! let record = creator.create_builder(keychain.as_ref(), &store, &stack, &spec).await?;
//! println!("{}", record.image());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod repository;
pub mod lifecycle;
pub mod defaults;
pub mod composer;
pub mod creator;
pub mod config;

// Re-exports for convenience
pub use error::{CnbError, Result};
pub use repository::{
    BuildpackLayer, BuildpackRepository, NewBuildpackRepository, RemoteBuildpackInfo,
    RemoteBuildpackRef, StoreBuildpackRepository,
};
pub use lifecycle::{ApiSet, LifecycleApis, LifecycleMetadata, LifecycleProvider, RegistryLifecycleProvider};
pub use composer::{BuilderComposer, BuilderMetadata, BuildpackLayersLabel};
pub use creator::{PreparedBuilder, RemoteBuilderCreator};
pub use config::CreatorConfig;
