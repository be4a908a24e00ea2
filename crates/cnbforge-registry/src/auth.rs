//! Registry keychains
//!
//! A keychain maps a registry host to the credentials used when fetching
//! from or saving to it:
//! - `AnonymousKeychain`: public registries
//! - `StaticKeychain`: credentials configured per registry host
//! - `DockerConfigKeychain`: Docker `config.json` auths

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, Result};

/// Docker Hub's canonical registry host
pub const DOCKER_HUB: &str = "docker.io";

/// Credentials presented to a registry
#[derive(Clone, PartialEq, Eq, Default)]
pub enum RegistryCredentials {
    #[default]
    Anonymous,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
}

impl RegistryCredentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        RegistryCredentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        RegistryCredentials::Bearer {
            token: token.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, RegistryCredentials::Anonymous)
    }
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Anonymous"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"<redacted>").finish(),
        }
    }
}

/// Resolves credentials for a registry host
pub trait RegistryKeychain: Send + Sync {
    fn resolve(&self, registry: &str) -> Result<RegistryCredentials>;
}

/// Keychain that never authenticates
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousKeychain;

impl RegistryKeychain for AnonymousKeychain {
    fn resolve(&self, _registry: &str) -> Result<RegistryCredentials> {
        Ok(RegistryCredentials::Anonymous)
    }
}

/// Normalize a registry key to a bare host
///
/// Strips scheme, path and trailing slashes and folds Docker Hub aliases.
pub fn normalize_registry(registry: &str) -> String {
    let host = registry
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    match host.as_str() {
        "index.docker.io" | "registry-1.docker.io" | "registry.hub.docker.com" => {
            DOCKER_HUB.to_string()
        }
        _ => host,
    }
}

/// Credentials configured per registry host
#[derive(Debug, Clone, Default)]
pub struct StaticKeychain {
    registries: HashMap<String, RegistryCredentials>,
}

impl StaticKeychain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add credentials for a registry
    pub fn add(&mut self, registry: &str, credentials: RegistryCredentials) {
        self.registries.insert(normalize_registry(registry), credentials);
    }

    pub fn with(mut self, registry: &str, credentials: RegistryCredentials) -> Self {
        self.add(registry, credentials);
        self
    }
}

impl RegistryKeychain for StaticKeychain {
    fn resolve(&self, registry: &str) -> Result<RegistryCredentials> {
        Ok(self
            .registries
            .get(&normalize_registry(registry))
            .cloned()
            .unwrap_or_default())
    }
}

/// Docker config.json format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default)]
    pub auths: HashMap<String, DockerAuth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerAuth {
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, rename = "identitytoken")]
    pub identity_token: Option<String>,
}

impl DockerConfig {
    /// Credentials for a registry host, if configured
    pub fn credentials_for(&self, registry: &str) -> Result<Option<RegistryCredentials>> {
        let wanted = normalize_registry(registry);

        // Exact keys first, then any key that normalizes to the same host
        let exact = [
            registry.to_string(),
            format!("https://{}", registry),
            format!("http://{}", registry),
        ];
        let entry = exact
            .iter()
            .find_map(|candidate| self.auths.get(candidate))
            .or_else(|| {
                let mut keys: Vec<&String> = self.auths.keys().collect();
                keys.sort();
                keys.into_iter()
                    .find(|k| normalize_registry(k) == wanted)
                    .and_then(|k| self.auths.get(k))
            });

        let Some(auth) = entry else {
            return Ok(None);
        };

        if let Some(encoded) = &auth.auth {
            let decoded =
                base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
                    .map_err(|e| RegistryError::AuthFailed {
                        registry: registry.to_string(),
                        message: format!("invalid auth entry: {}", e),
                    })?;
            let decoded = String::from_utf8(decoded).map_err(|e| RegistryError::AuthFailed {
                registry: registry.to_string(),
                message: format!("invalid auth entry: {}", e),
            })?;
            let (username, password) =
                decoded
                    .split_once(':')
                    .ok_or_else(|| RegistryError::AuthFailed {
                        registry: registry.to_string(),
                        message: "auth entry is not username:password".to_string(),
                    })?;
            return Ok(Some(RegistryCredentials::basic(username, password)));
        }

        if let (Some(u), Some(p)) = (&auth.username, &auth.password) {
            return Ok(Some(RegistryCredentials::basic(u.clone(), p.clone())));
        }

        if let Some(token) = &auth.identity_token {
            return Ok(Some(RegistryCredentials::bearer(token.clone())));
        }

        Ok(None)
    }
}

/// Keychain backed by a Docker config.json
#[derive(Debug, Clone, Default)]
pub struct DockerConfigKeychain {
    config: DockerConfig,
}

impl DockerConfigKeychain {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    /// Load from the given path or `~/.docker/config.json`
    ///
    /// A missing file yields an empty keychain.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => default_docker_config_path()?,
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: DockerConfig = serde_json::from_str(&content)?;
        Ok(Self { config })
    }
}

fn default_docker_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| RegistryError::AuthFailed {
        registry: String::new(),
        message: "Could not determine home directory".to_string(),
    })?;
    Ok(home.join(".docker").join("config.json"))
}

impl RegistryKeychain for DockerConfigKeychain {
    fn resolve(&self, registry: &str) -> Result<RegistryCredentials> {
        Ok(self.config.credentials_for(registry)?.unwrap_or_default())
    }
}
