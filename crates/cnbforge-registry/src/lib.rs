//! cnbforge Registry Access
//!
//! This crate provides image registry access for cnbforge, including:
//!
//! - **Registry client contract**: `fetch` and `save` of whole images
//! - **OCI registries**: Docker Hub, GHCR, ECR, local registries, etc.
//! - **In-memory registry**: For tests and registry-less composition
//! - **Keychains**: Anonymous, static per-registry, Docker config.json
//!
//! ## Example
//!
//! ```rust,no_run
//! use cnbforge_registry::{DockerConfigKeychain, OciRegistryClient, RegistryClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let keychain = DockerConfigKeychain::load(None)?;
//! let client = OciRegistryClient::new();
//!
//! let (image, digest_ref) = client
//!     .fetch(&keychain, "paketobuildpacks/build-jammy-base:latest")
//!     .await?;
//! println!("{} ({})", digest_ref, image.os());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod auth;
pub mod reference;
pub mod client;
pub mod oci;
pub mod memory;

// Re-exports for convenience
pub use error::{RegistryError, Result};
pub use auth::{
    AnonymousKeychain, DockerConfig, DockerConfigKeychain, RegistryCredentials, RegistryKeychain,
    StaticKeychain, normalize_registry,
};
pub use reference::OciReference;
pub use client::RegistryClient;
pub use oci::OciRegistryClient;
pub use memory::{InMemoryRegistry, OperationCounts};
