//! git2 credential callback adapter

use git2::{Cred, CredentialType, ErrorClass, ErrorCode};

use crate::error::GitError;
use crate::keychain::{CredentialKinds, GitCredential, GitKeychain};

impl GitCredential {
    /// Convert into a libgit2 credential
    pub fn to_cred(&self) -> Result<Cred, git2::Error> {
        match self {
            GitCredential::UserPass { username, password } => Cred::userpass_plaintext(username, password),
            GitCredential::SshKey {
                username,
                private_key,
            } => Cred::ssh_key_from_memory(username, None, private_key, None),
        }
    }
}

fn to_git2_error(error: GitError) -> git2::Error {
    let code = if error.is_no_credentials() {
        ErrorCode::Auth
    } else {
        ErrorCode::GenericError
    };
    git2::Error::new(code, ErrorClass::Callback, error.to_string())
}

/// Callback for `git2::RemoteCallbacks::credentials`
///
/// ```rust,no_run
/// use cnbforge_git::{KeychainConfig, credentials_callback};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let keychain = KeychainConfig::default().build()?;
/// let mut callbacks = git2::RemoteCallbacks::new();
/// callbacks.credentials(credentials_callback(&keychain));
/// # Ok(())
/// # }
/// ```
pub fn credentials_callback<K>(
    keychain: &K,
) -> impl FnMut(&str, Option<&str>, CredentialType) -> Result<Cred, git2::Error> + '_
where
    K: GitKeychain + ?Sized,
{
    move |url, username_from_url, allowed| {
        let allowed = CredentialKinds::from_bits_truncate(allowed.bits());
        keychain
            .resolve(url, username_from_url.unwrap_or_default(), allowed)
            .map_err(to_git2_error)?
            .to_cred()
    }
}
