//! cnbforge Core - Core types for composing buildpack builder images
//!
//! This crate provides the foundational types used throughout cnbforge:
//! - `BuilderSpec`: The requested tag and buildpack order
//! - `Stack` / `BuildpackStore`: Inputs observed at composition time
//! - `BuilderRecord`: Provenance of a published builder
//! - `Image` / `Layer`: A minimal, content-addressed OCI image model

pub mod buildpack;
pub mod builder;
pub mod image;
pub mod error;

pub use buildpack::{
    BuildpackInfo, BuildpackLayerInfo, BuildpackMetadata, BuildpackRef, BuildpackStack,
    DescriptiveBuildpackInfo, Order, OrderEntry,
};
pub use builder::{BuildStack, BuilderRecord, BuilderSpec, BuildpackStore, Stack, StoreBuildpack};
pub use image::{ContainerConfig, Image, ImageConfig, Layer, RootFs, labels, media_types, sha256_digest};
pub use error::{CoreError, Result};
