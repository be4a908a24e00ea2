//! Keychain configuration
//!
//! ```yaml
//! volume: /var/build-secrets
//! basicAuth:
//!   - github-token=github.com
//! sshAuth:
//!   - deploy-key=gitlab.example.com
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::keychain::SecretGitKeychain;
use crate::secret::DEFAULT_VOLUME;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeychainConfig {
    /// Directory where secrets are mounted
    #[serde(default = "default_volume")]
    pub volume: PathBuf,

    /// `name=domain` arguments for basic-auth secrets
    #[serde(default)]
    pub basic_auth: Vec<String>,

    /// `name=domain` arguments for SSH secrets
    #[serde(default)]
    pub ssh_auth: Vec<String>,
}

fn default_volume() -> PathBuf {
    PathBuf::from(DEFAULT_VOLUME)
}

impl Default for KeychainConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            basic_auth: Vec::new(),
            ssh_auth: Vec::new(),
        }
    }
}

impl KeychainConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Construct the keychain; malformed arguments fail here
    pub fn build(&self) -> Result<SecretGitKeychain> {
        SecretGitKeychain::new(&self.volume, &self.basic_auth, &self.ssh_auth)
    }
}
