//! OCI registry client
//!
//! Fetch and save whole images against OCI-compliant registries.

use async_trait::async_trait;
use oci_distribution::Reference;
use oci_distribution::client::{Client, ClientConfig, ClientProtocol, Config, ImageLayer};
use oci_distribution::secrets::RegistryAuth;

use cnbforge_core::{Image, ImageConfig, Layer, media_types};

use crate::auth::{RegistryCredentials, RegistryKeychain};
use crate::client::RegistryClient;
use crate::error::{RegistryError, Result};
use crate::reference::OciReference;

/// Registry client speaking the OCI distribution API
pub struct OciRegistryClient {
    client: Client,
}

impl OciRegistryClient {
    /// Create a client using HTTPS for every registry
    pub fn new() -> Self {
        Self::with_protocol(ClientProtocol::Https)
    }

    /// Create a client that talks plain HTTP to the listed registries
    pub fn insecure(registries: Vec<String>) -> Self {
        Self::with_protocol(ClientProtocol::HttpsExcept(registries))
    }

    fn with_protocol(protocol: ClientProtocol) -> Self {
        let config = ClientConfig {
            protocol,
            ..Default::default()
        };
        Self {
            client: Client::new(config),
        }
    }

    /// Parse a reference for the OCI client
    fn parse_reference(reference: &str) -> Result<(OciReference, Reference)> {
        let parsed = OciReference::parse(reference)?;
        let oci = Reference::try_from(parsed.to_oci_string().as_str()).map_err(|e| {
            RegistryError::InvalidReference {
                reference: format!("{}: {}", reference, e),
            }
        })?;
        Ok((parsed, oci))
    }
}

impl Default for OciRegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

fn registry_auth(credentials: RegistryCredentials) -> RegistryAuth {
    match credentials {
        RegistryCredentials::Anonymous => RegistryAuth::Anonymous,
        RegistryCredentials::Basic { username, password } => RegistryAuth::Basic(username, password),
        // Token exchange happens server side; registries accept the token as password
        RegistryCredentials::Bearer { token } => RegistryAuth::Basic(String::new(), token),
    }
}

#[async_trait]
impl RegistryClient for OciRegistryClient {
    async fn fetch(
        &self,
        keychain: &dyn RegistryKeychain,
        reference: &str,
    ) -> Result<(Image, String)> {
        let (parsed, oci_ref) = Self::parse_reference(reference)?;
        let auth = registry_auth(keychain.resolve(&parsed.registry)?);

        let image_data = self
            .client
            .pull(&oci_ref, &auth, media_types::ACCEPTED_LAYERS.to_vec())
            .await
            .map_err(|e| RegistryError::FetchFailed {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;

        let config = ImageConfig::from_json(&image_data.config.data)?;
        if config.rootfs.diff_ids.len() != image_data.layers.len() {
            return Err(RegistryError::InvalidImage {
                reference: reference.to_string(),
                message: format!(
                    "config lists {} diff ids for {} layers",
                    config.rootfs.diff_ids.len(),
                    image_data.layers.len()
                ),
            });
        }

        let layers = image_data
            .layers
            .into_iter()
            .zip(config.rootfs.diff_ids.clone())
            .map(|(layer, diff_id)| Layer::new(layer.data, layer.media_type, diff_id))
            .collect();

        let digest = match image_data.digest {
            Some(digest) => digest,
            None => self
                .client
                .fetch_manifest_digest(&oci_ref, &auth)
                .await
                .map_err(|e| RegistryError::FetchFailed {
                    reference: reference.to_string(),
                    message: e.to_string(),
                })?,
        };

        tracing::debug!(reference, %digest, "fetched image");
        Ok((Image::new(config, layers), parsed.with_digest(&digest)))
    }

    async fn save(&self, keychain: &dyn RegistryKeychain, tag: &str, image: &Image) -> Result<String> {
        let (parsed, oci_ref) = Self::parse_reference(tag)?;
        let auth = registry_auth(keychain.resolve(&parsed.registry)?);

        let layers: Vec<ImageLayer> = image
            .layers()
            .iter()
            .map(|layer| ImageLayer {
                data: layer.data().to_vec(),
                media_type: layer.media_type().to_string(),
                annotations: None,
            })
            .collect();

        let config = Config {
            data: image.config_json()?,
            media_type: media_types::OCI_CONFIG.to_string(),
            annotations: None,
        };

        self.client
            .push(&oci_ref, &layers, config, &auth, None)
            .await
            .map_err(|e| RegistryError::PushFailed {
                reference: tag.to_string(),
                message: e.to_string(),
            })?;

        let digest = self
            .client
            .fetch_manifest_digest(&oci_ref, &auth)
            .await
            .map_err(|e| RegistryError::PushFailed {
                reference: tag.to_string(),
                message: format!("pushed but could not resolve digest: {}", e),
            })?;

        tracing::debug!(tag, %digest, "pushed image");
        Ok(parsed.with_digest(&digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference_docker_hub() {
        let (parsed, oci) = OciRegistryClient::parse_reference("ubuntu:jammy").unwrap();
        assert_eq!(parsed.repository, "library/ubuntu");
        assert_eq!(oci.repository(), "library/ubuntu");
        assert_eq!(oci.tag(), Some("jammy"));
    }

    #[test]
    fn test_parse_reference_invalid() {
        assert!(OciRegistryClient::parse_reference("").is_err());
    }

    #[test]
    fn test_registry_auth_mapping() {
        assert!(matches!(
            registry_auth(RegistryCredentials::Anonymous),
            RegistryAuth::Anonymous
        ));
        match registry_auth(RegistryCredentials::basic("u", "p")) {
            RegistryAuth::Basic(u, p) => {
                assert_eq!(u, "u");
                assert_eq!(p, "p");
            }
            _ => panic!("Expected basic auth"),
        }
    }
}
