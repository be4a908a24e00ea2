//! Opaque OCI image model
//!
//! Just enough of an image to compose builders: a config in OCI JSON shape
//! and an ordered list of content-addressed layers. Blob encoding and
//! registry transport live in `cnbforge-registry`.

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use crate::error::{CoreError, Result};

/// Media types understood by the image model
pub mod media_types {
    /// Uncompressed OCI layer
    pub const OCI_LAYER: &str = "application/vnd.oci.image.layer.v1.tar";
    /// Gzip compressed OCI layer
    pub const OCI_LAYER_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
    /// Gzip compressed Docker layer
    pub const DOCKER_LAYER_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
    /// OCI image config
    pub const OCI_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
    /// OCI image manifest
    pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

    /// Layer media types accepted when pulling images
    pub const ACCEPTED_LAYERS: [&str; 3] = [OCI_LAYER, OCI_LAYER_GZIP, DOCKER_LAYER_GZIP];
}

/// Well-known buildpack labels
pub mod labels {
    pub const BUILDER_METADATA: &str = "io.buildpacks.builder.metadata";
    pub const BUILDPACK_ORDER: &str = "io.buildpacks.buildpack.order";
    pub const BUILDPACK_LAYERS: &str = "io.buildpacks.buildpack.layers";
    pub const STACK_ID: &str = "io.buildpacks.stack.id";
    pub const STACK_MIXINS: &str = "io.buildpacks.stack.mixins";
    pub const LIFECYCLE_METADATA: &str = "io.buildpacks.lifecycle.metadata";
}

/// Compute an OCI digest (`sha256:<hex>`) for a blob
pub fn sha256_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}

/// A content-addressed image layer
///
/// Layer data is reference counted so the same physical layer can be shared
/// between buildpack lookups and composed images without copying.
#[derive(Clone, PartialEq, Eq)]
pub struct Layer {
    digest: String,
    diff_id: String,
    media_type: String,
    data: Arc<[u8]>,
}

impl Layer {
    /// Wrap a blob fetched from a registry
    ///
    /// `diff_id` is the digest of the uncompressed content, as recorded in the
    /// image config's rootfs.
    pub fn new(
        data: impl Into<Arc<[u8]>>,
        media_type: impl Into<String>,
        diff_id: impl Into<String>,
    ) -> Self {
        let data = data.into();
        Self {
            digest: sha256_digest(&data),
            diff_id: diff_id.into(),
            media_type: media_type.into(),
            data,
        }
    }

    /// Create an uncompressed layer from a tar archive
    pub fn uncompressed(tar: Vec<u8>) -> Self {
        let digest = sha256_digest(&tar);
        Self {
            diff_id: digest.clone(),
            digest,
            media_type: media_types::OCI_LAYER.to_string(),
            data: tar.into(),
        }
    }

    /// Create a gzip compressed layer from a tar archive
    ///
    /// The gzip header carries no timestamp, so identical archives always
    /// produce identical digests.
    pub fn from_tar(tar: &[u8]) -> Result<Self> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(tar)?;
        let compressed = encoder.finish()?;

        Ok(Self {
            digest: sha256_digest(&compressed),
            diff_id: sha256_digest(tar),
            media_type: media_types::OCI_LAYER_GZIP.to_string(),
            data: compressed.into(),
        })
    }

    /// Digest of the blob as stored in a registry
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Digest of the uncompressed content
    pub fn diff_id(&self) -> &str {
        &self.diff_id
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("digest", &self.digest)
            .field("diff_id", &self.diff_id)
            .field("media_type", &self.media_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Image configuration (OCI config JSON shape)
///
/// Fields without a typed counterpart (`created`, `history`, `os.version`,
/// ...) are carried in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default)]
    pub architecture: String,

    #[serde(default)]
    pub os: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub config: ContainerConfig,

    #[serde(default)]
    pub rootfs: RootFs,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Runtime configuration embedded in an image config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub env: Vec<String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// `Entrypoint`, `Cmd`, `ExposedPorts` and the rest, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Root filesystem description: the ordered diff_ids of all layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootFs {
    #[serde(rename = "type")]
    pub fs_type: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub diff_ids: Vec<String>,
}

impl Default for RootFs {
    fn default() -> Self {
        Self {
            fs_type: "layers".to_string(),
            diff_ids: Vec::new(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ImageConfig {
    /// Parse a config blob
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|e| CoreError::InvalidImageConfig {
            message: e.to_string(),
        })
    }
}

/// An image: config plus ordered layers
///
/// The rootfs diff_ids in the config are kept in step with the layer list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    config: ImageConfig,
    layers: Vec<Layer>,
}

impl Image {
    pub fn new(mut config: ImageConfig, layers: Vec<Layer>) -> Self {
        config.rootfs.diff_ids = layers.iter().map(|l| l.diff_id().to_string()).collect();
        Self { config, layers }
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn os(&self) -> &str {
        &self.config.os
    }

    pub fn architecture(&self) -> &str {
        &self.config.architecture
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.config.config.labels
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.config.config.labels.get(key).map(String::as_str)
    }

    pub fn set_label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config.config.labels.insert(key.into(), value.into());
    }

    /// Decode a JSON-valued label, `None` when the label is absent
    pub fn label_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.label(key) {
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|e| CoreError::InvalidLabel {
                    label: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    pub fn set_label_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set_label(key, raw);
        Ok(())
    }

    pub fn append_layer(&mut self, layer: Layer) {
        self.config.rootfs.diff_ids.push(layer.diff_id().to_string());
        self.layers.push(layer);
    }

    pub fn has_layer(&self, digest: &str) -> bool {
        self.layers.iter().any(|l| l.digest() == digest)
    }

    /// Serialized config blob
    pub fn config_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.config)?)
    }

    pub fn config_digest(&self) -> Result<String> {
        Ok(sha256_digest(&self.config_json()?))
    }

    /// Content identity of the image: the digest of its manifest
    pub fn digest(&self) -> Result<String> {
        let config = self.config_json()?;
        let manifest = serde_json::json!({
            "schemaVersion": 2,
            "mediaType": media_types::OCI_MANIFEST,
            "config": {
                "mediaType": media_types::OCI_CONFIG,
                "digest": sha256_digest(&config),
                "size": config.len(),
            },
            "layers": self.layers.iter().map(|l| serde_json::json!({
                "mediaType": l.media_type(),
                "digest": l.digest(),
                "size": l.size(),
            })).collect::<Vec<_>>(),
        });
        Ok(sha256_digest(&serde_json::to_vec(&manifest)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_digest() {
        assert_eq!(
            sha256_digest(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_layer_from_tar_is_deterministic() {
        let a = Layer::from_tar(b"some tar content").unwrap();
        let b = Layer::from_tar(b"some tar content").unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.diff_id(), sha256_digest(b"some tar content"));
        assert_ne!(a.digest(), a.diff_id());
        assert_eq!(a.media_type(), media_types::OCI_LAYER_GZIP);
    }

    #[test]
    fn test_uncompressed_layer_digest_equals_diff_id() {
        let layer = Layer::uncompressed(b"data".to_vec());
        assert_eq!(layer.digest(), layer.diff_id());
        assert_eq!(layer.size(), 4);
    }

    #[test]
    fn test_image_rootfs_tracks_layers() {
        let mut image = Image::new(ImageConfig::default(), vec![Layer::uncompressed(b"a".to_vec())]);
        image.append_layer(Layer::uncompressed(b"b".to_vec()));

        assert_eq!(image.config().rootfs.diff_ids.len(), 2);
        assert_eq!(image.config().rootfs.diff_ids[1], sha256_digest(b"b"));
        assert!(image.has_layer(&sha256_digest(b"a")));
    }

    #[test]
    fn test_digest_changes_with_labels() {
        let mut image = Image::new(ImageConfig::default(), vec![]);
        let before = image.digest().unwrap();
        image.set_label("foo", "bar");
        assert_ne!(before, image.digest().unwrap());
        assert_eq!(image.label("foo"), Some("bar"));
    }

    #[test]
    fn test_config_parse_tolerates_nulls() {
        let raw = br#"{"architecture":"amd64","os":"linux","config":{"Env":null,"Labels":null},"rootfs":{"type":"layers","diff_ids":["sha256:abc"]}}"#;
        let config = ImageConfig::from_json(raw).unwrap();
        assert_eq!(config.os, "linux");
        assert!(config.config.labels.is_empty());
        assert_eq!(config.rootfs.diff_ids, vec!["sha256:abc".to_string()]);
    }

    #[test]
    fn test_config_keeps_unmodeled_fields() {
        let raw = br#"{
            "architecture": "amd64",
            "os": "linux",
            "os.version": "22.04",
            "created": "2024-01-01T00:00:00Z",
            "history": [{"created_by": "build"}],
            "config": {
                "Entrypoint": ["/cnb/lifecycle/launcher"],
                "Cmd": ["bash"],
                "ExposedPorts": {"8080/tcp": {}},
                "Labels": {"a": "b"}
            },
            "rootfs": {"type": "layers", "diff_ids": []}
        }"#;
        let config = ImageConfig::from_json(raw).unwrap();
        let mut image = Image::new(config, vec![]);
        image.set_label("c", "d");
        image.append_layer(Layer::uncompressed(b"x".to_vec()));

        let written: serde_json::Value = serde_json::from_slice(&image.config_json().unwrap()).unwrap();
        assert_eq!(written["os.version"], "22.04");
        assert_eq!(written["created"], "2024-01-01T00:00:00Z");
        assert_eq!(written["history"][0]["created_by"], "build");
        assert_eq!(written["config"]["Entrypoint"][0], "/cnb/lifecycle/launcher");
        assert_eq!(written["config"]["Cmd"][0], "bash");
        assert!(written["config"]["ExposedPorts"]["8080/tcp"].is_object());
        assert_eq!(written["config"]["Labels"]["a"], "b");
        assert_eq!(written["config"]["Labels"]["c"], "d");
        assert_eq!(written["rootfs"]["diff_ids"][0], sha256_digest(b"x"));
        assert!(written["config"].get("extra").is_none());
    }

    #[test]
    fn test_label_json() {
        let mut image = Image::default();
        image.set_label_json("numbers", &vec![1, 2, 3]).unwrap();
        let decoded: Option<Vec<u32>> = image.label_json("numbers").unwrap();
        assert_eq!(decoded, Some(vec![1, 2, 3]));

        image.set_label("broken", "{not json");
        assert!(image.label_json::<Vec<u32>>("broken").is_err());
        assert!(image.label_json::<Vec<u32>>("missing").unwrap().is_none());
    }
}
