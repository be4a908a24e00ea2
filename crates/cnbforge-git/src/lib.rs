//! cnbforge Git Credentials
//!
//! Chooses the credential for a git remote operation from a pool of mounted
//! secrets:
//!
//! - **Descriptors**: `name=domain` arguments for basic-auth and SSH secrets
//! - **Resolution**: host from scheme or SCP-like URLs, first match by secret name
//! - **Fresh reads**: secret files are read on every resolution
//! - **git2 adapter**: `credentials_callback` (feature `git2`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use cnbforge_git::{CredentialKinds, GitKeychain, SecretGitKeychain};
//!
//! # fn example() -> Result<(), cnbforge_git::GitError> {
//! let keychain = SecretGitKeychain::new(
//!     "/var/build-secrets",
//!     ["github-token=github.com"],
//!     ["deploy-key=gitlab.example.com"],
//! )?;
//!
//! let credential = keychain.resolve(
//!     "git@gitlab.example.com:team/app.git",
//!     "git",
//!     CredentialKinds::SSH_KEY,
//! )?;
//! println!("{:?}", credential);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod secret;
pub mod remote;
pub mod keychain;
pub mod config;

#[cfg(feature = "git2")]
pub mod callback;

// Re-exports for convenience
pub use error::{GitError, Result};
pub use secret::{BasicAuthSecret, DEFAULT_VOLUME, SshSecret, read_basic_auth_secret, read_ssh_secret};
pub use remote::{domain_matches, host_for_url};
pub use keychain::{
    CredentialDescriptor, CredentialKinds, GitCredential, GitKeychain, SecretGitKeychain,
    SecretKind, parse_secret_argument,
};
pub use config::KeychainConfig;

#[cfg(feature = "git2")]
pub use callback::credentials_callback;
