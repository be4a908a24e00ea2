//! Mounted secret reading
//!
//! Secrets are directories under a volume, one file per field:
//!
//! ```text
//! <volume>/<name>/username
//! <volume>/<name>/password
//! <volume>/<name>/ssh-privatekey
//! ```
//!
//! Nothing is cached: every read goes to the filesystem so rotated secrets
//! are picked up on the next read.

use std::path::{Path, PathBuf};

use crate::error::{GitError, Result};

/// Default mount point for build secrets
pub const DEFAULT_VOLUME: &str = "/var/build-secrets";

pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const SSH_PRIVATE_KEY_KEY: &str = "ssh-privatekey";

/// Username and password pair
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuthSecret {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuthSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthSecret")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// SSH private key
#[derive(Clone, PartialEq, Eq)]
pub struct SshSecret {
    pub private_key: String,
}

impl std::fmt::Debug for SshSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSecret")
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Directory holding the fields of secret `name`
pub fn secret_dir(volume: &Path, name: &str) -> PathBuf {
    volume.join(name)
}

fn read_field(volume: &Path, name: &str, key: &str) -> Result<String> {
    let path = secret_dir(volume, name).join(key);
    std::fs::read_to_string(&path).map_err(|source| GitError::SecretRead {
        secret: name.to_string(),
        path,
        source,
    })
}

/// Read a basic-auth secret
///
/// Both fields must exist. Their contents are taken verbatim and either may
/// be empty, as with token-as-username secrets.
pub fn read_basic_auth_secret(volume: &Path, name: &str) -> Result<BasicAuthSecret> {
    Ok(BasicAuthSecret {
        username: read_field(volume, name, USERNAME_KEY)?,
        password: read_field(volume, name, PASSWORD_KEY)?,
    })
}

/// Read an SSH secret
pub fn read_ssh_secret(volume: &Path, name: &str) -> Result<SshSecret> {
    let private_key = read_field(volume, name, SSH_PRIVATE_KEY_KEY)?;

    if private_key.trim().is_empty() {
        return Err(GitError::MalformedSecret {
            secret: name.to_string(),
            reason: format!("{} is empty", SSH_PRIVATE_KEY_KEY),
        });
    }

    Ok(SshSecret { private_key })
}
