//! Secret-backed git keychain
//!
//! Descriptors bind a mounted secret to one domain and one credential kind.
//! Resolution picks the first descriptor, by secret name, whose kind the
//! transport allows and whose domain names the remote's host. Secret material
//! is read only after a descriptor is chosen, and read again on every
//! resolution.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::{GitError, Result};
use crate::secret::{self, DEFAULT_VOLUME};
use crate::remote::{domain_matches, host_for_url};

bitflags::bitflags! {
    /// Credential types a git transport will accept
    ///
    /// Bit values match libgit2's `git_credential_t`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CredentialKinds: u32 {
        const USER_PASS_PLAINTEXT = 1 << 0;
        const SSH_KEY = 1 << 1;
        const SSH_CUSTOM = 1 << 2;
        const DEFAULT = 1 << 3;
        const SSH_INTERACTIVE = 1 << 4;
        const USERNAME = 1 << 5;
        const SSH_MEMORY = 1 << 6;
    }
}

/// A concrete credential handed to the transport
#[derive(Clone, PartialEq, Eq)]
pub enum GitCredential {
    UserPass { username: String, password: String },
    SshKey { username: String, private_key: String },
}

impl GitCredential {
    pub fn username(&self) -> &str {
        match self {
            GitCredential::UserPass { username, .. } | GitCredential::SshKey { username, .. } => {
                username
            }
        }
    }

    /// The credential type this satisfies
    pub fn kind(&self) -> CredentialKinds {
        match self {
            GitCredential::UserPass { .. } => CredentialKinds::USER_PASS_PLAINTEXT,
            GitCredential::SshKey { .. } => CredentialKinds::SSH_KEY,
        }
    }
}

impl std::fmt::Debug for GitCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitCredential::UserPass { username, .. } => f
                .debug_struct("UserPass")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            GitCredential::SshKey { username, .. } => f
                .debug_struct("SshKey")
                .field("username", username)
                .field("private_key", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Resolves a credential for one git remote operation
pub trait GitKeychain: Send + Sync {
    fn resolve(&self, url: &str, username: &str, allowed: CredentialKinds) -> Result<GitCredential>;
}

/// Kind of mounted secret behind a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    Basic,
    Ssh,
}

impl SecretKind {
    /// Credential type this kind can satisfy
    pub fn credential_kind(self) -> CredentialKinds {
        match self {
            SecretKind::Basic => CredentialKinds::USER_PASS_PLAINTEXT,
            SecretKind::Ssh => CredentialKinds::SSH_KEY,
        }
    }
}

/// A secret scoped to one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDescriptor {
    pub secret_name: String,
    pub domain: String,
    pub kind: SecretKind,
    pub volume: PathBuf,
}

impl CredentialDescriptor {
    pub fn new(
        secret_name: impl Into<String>,
        domain: impl Into<String>,
        kind: SecretKind,
        volume: impl Into<PathBuf>,
    ) -> Self {
        Self {
            secret_name: secret_name.into(),
            domain: domain.into(),
            kind,
            volume: volume.into(),
        }
    }

    /// Whether this descriptor applies to `host` for a transport accepting `allowed`
    pub fn matches(&self, host: &str, allowed: CredentialKinds) -> bool {
        allowed.intersects(self.kind.credential_kind()) && domain_matches(&self.domain, host)
    }

    /// Read the secret and build the credential
    ///
    /// Basic secrets use their own username, or `username` when theirs is
    /// empty. SSH secrets always use `username`.
    pub fn materialize(&self, username: &str) -> Result<GitCredential> {
        match self.kind {
            SecretKind::Basic => {
                let secret = secret::read_basic_auth_secret(&self.volume, &self.secret_name)?;
                let username = if secret.username.is_empty() {
                    username.to_string()
                } else {
                    secret.username
                };
                Ok(GitCredential::UserPass {
                    username,
                    password: secret.password,
                })
            }
            SecretKind::Ssh => {
                let secret = secret::read_ssh_secret(&self.volume, &self.secret_name)?;
                Ok(GitCredential::SshKey {
                    username: username.to_string(),
                    private_key: secret.private_key,
                })
            }
        }
    }
}

/// Split a `name=domain` secret argument
pub fn parse_secret_argument(argument: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = argument.split('=').collect();
    match parts.as_slice() {
        [name, domain] if !name.trim().is_empty() && !domain.trim().is_empty() => {
            Ok((name.trim().to_string(), domain.trim().to_string()))
        }
        _ => Err(GitError::InvalidSecretArgument {
            argument: argument.to_string(),
        }),
    }
}

/// Keychain over secrets mounted in one volume
///
/// Descriptors are kept sorted by secret name; descriptors with equal names
/// keep insertion order.
#[derive(Debug)]
pub struct SecretGitKeychain {
    volume: PathBuf,
    descriptors: RwLock<Vec<CredentialDescriptor>>,
}

impl SecretGitKeychain {
    /// Build a keychain from `name=domain` arguments
    ///
    /// Fails on the first malformed argument. Secrets are not read here.
    pub fn new<B, S>(volume: impl Into<PathBuf>, basic_auth: B, ssh_auth: S) -> Result<Self>
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let keychain = Self::empty(volume);

        let basic = basic_auth.into_iter().map(|a| (SecretKind::Basic, parse_secret_argument(a.as_ref())));
        let ssh = ssh_auth.into_iter().map(|a| (SecretKind::Ssh, parse_secret_argument(a.as_ref())));

        for (kind, parsed) in basic.chain(ssh) {
            let (name, domain) = parsed?;
            keychain.add(CredentialDescriptor::new(name, domain, kind, keychain.volume.clone()));
        }

        Ok(keychain)
    }

    /// A keychain with no descriptors
    pub fn empty(volume: impl Into<PathBuf>) -> Self {
        Self {
            volume: volume.into(),
            descriptors: RwLock::new(Vec::new()),
        }
    }

    pub fn volume(&self) -> &Path {
        &self.volume
    }

    /// Add a descriptor, keeping the set ordered by secret name
    pub fn add(&self, descriptor: CredentialDescriptor) {
        let mut descriptors = self.descriptors.write().unwrap_or_else(PoisonError::into_inner);
        let position = descriptors.partition_point(|d| d.secret_name <= descriptor.secret_name);
        descriptors.insert(position, descriptor);
    }

    /// Snapshot of the descriptors in resolution order
    pub fn descriptors(&self) -> Vec<CredentialDescriptor> {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.descriptors.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, host: &str, allowed: CredentialKinds) -> Option<CredentialDescriptor> {
        self.descriptors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|d| d.matches(host, allowed))
            .cloned()
    }
}

impl Default for SecretGitKeychain {
    fn default() -> Self {
        Self::empty(DEFAULT_VOLUME)
    }
}

impl GitKeychain for SecretGitKeychain {
    fn resolve(&self, url: &str, username: &str, allowed: CredentialKinds) -> Result<GitCredential> {
        let host = host_for_url(url)?;

        let Some(descriptor) = self.find(&host, allowed) else {
            tracing::debug!(%url, %host, ?allowed, "no matching git credentials");
            return Err(GitError::NoCredentials {
                url: url.to_string(),
            });
        };

        tracing::debug!(
            secret = %descriptor.secret_name,
            %host,
            kind = ?descriptor.kind,
            "selected git credentials"
        );
        descriptor.materialize(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::{PASSWORD_KEY, SSH_PRIVATE_KEY_KEY, USERNAME_KEY};
    use tempfile::TempDir;

    fn write_basic(volume: &Path, name: &str, username: &str, password: &str) {
        let dir = volume.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(USERNAME_KEY), username).unwrap();
        std::fs::write(dir.join(PASSWORD_KEY), password).unwrap();
    }

    fn write_ssh(volume: &Path, name: &str, key: &str) {
        let dir = volume.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(SSH_PRIVATE_KEY_KEY), key).unwrap();
    }

    const NONE: [&str; 0] = [];

    #[test]
    fn test_parse_secret_argument() {
        assert_eq!(
            parse_secret_argument("github=github.com").unwrap(),
            ("github".to_string(), "github.com".to_string())
        );
        for bad in ["onlyname", "a=b=c", "=github.com", "github=", ""] {
            assert!(
                matches!(parse_secret_argument(bad), Err(GitError::InvalidSecretArgument { .. })),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_error_message_names_argument() {
        let err = SecretGitKeychain::new("/unused", ["onlyname"], NONE).unwrap_err();
        assert_eq!(err.to_string(), "could not parse git secret argument onlyname");
    }

    #[test]
    fn test_descriptors_sorted_by_name() {
        let keychain = SecretGitKeychain::new(
            "/unused",
            ["zzz=git.example.com", "mmm=git.example.com"],
            ["aaa=git.example.com"],
        )
        .unwrap();

        let names: Vec<String> = keychain.descriptors().into_iter().map(|d| d.secret_name).collect();
        assert_eq!(names, vec!["aaa", "mmm", "zzz"]);
    }

    #[test]
    fn test_equal_names_keep_insertion_order() {
        let keychain = SecretGitKeychain::empty("/unused");
        keychain.add(CredentialDescriptor::new("same", "a.example.com", SecretKind::Basic, "/unused"));
        keychain.add(CredentialDescriptor::new("same", "b.example.com", SecretKind::Basic, "/unused"));
        keychain.add(CredentialDescriptor::new("first", "c.example.com", SecretKind::Ssh, "/unused"));

        let domains: Vec<String> = keychain.descriptors().into_iter().map(|d| d.domain).collect();
        assert_eq!(domains, vec!["c.example.com", "a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_match_requires_allowed_kind() {
        let basic = CredentialDescriptor::new("b", "github.com", SecretKind::Basic, "/unused");
        let ssh = CredentialDescriptor::new("s", "github.com", SecretKind::Ssh, "/unused");

        assert!(basic.matches("github.com", CredentialKinds::USER_PASS_PLAINTEXT));
        assert!(!basic.matches("github.com", CredentialKinds::SSH_KEY));
        assert!(ssh.matches("github.com", CredentialKinds::SSH_KEY | CredentialKinds::USERNAME));
        assert!(!ssh.matches("github.com", CredentialKinds::USER_PASS_PLAINTEXT));
        assert!(!ssh.matches("gitlab.com", CredentialKinds::all()));
    }

    #[test]
    fn test_resolve_basic() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "github", "octocat", "token");

        let keychain = SecretGitKeychain::new(volume.path(), ["github=github.com"], NONE).unwrap();
        let credential = keychain
            .resolve("https://github.com/org/repo.git", "git", CredentialKinds::USER_PASS_PLAINTEXT)
            .unwrap();

        assert_eq!(
            credential,
            GitCredential::UserPass {
                username: "octocat".to_string(),
                password: "token".to_string(),
            }
        );
    }

    #[test]
    fn test_basic_empty_username_uses_hint() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "github", "", "token");

        let keychain = SecretGitKeychain::new(volume.path(), ["github=github.com"], NONE).unwrap();
        let credential = keychain
            .resolve("https://github.com/org/repo.git", "hinted", CredentialKinds::USER_PASS_PLAINTEXT)
            .unwrap();

        assert_eq!(credential.username(), "hinted");
    }

    #[test]
    fn test_resolve_ssh_uses_hint_username() {
        let volume = TempDir::new().unwrap();
        write_ssh(volume.path(), "deploy", "PRIVATE KEY");

        let keychain = SecretGitKeychain::new(volume.path(), NONE, ["deploy=github.com"]).unwrap();
        let credential = keychain
            .resolve("git@github.com:org/repo.git", "git", CredentialKinds::SSH_KEY)
            .unwrap();

        assert_eq!(
            credential,
            GitCredential::SshKey {
                username: "git".to_string(),
                private_key: "PRIVATE KEY".to_string(),
            }
        );
        assert_eq!(credential.kind(), CredentialKinds::SSH_KEY);
    }

    #[test]
    fn test_first_by_name_wins() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "aaa", "from-aaa", "a");
        write_basic(volume.path(), "zzz", "from-zzz", "z");

        for args in [["zzz=git.example.com", "aaa=git.example.com"], ["aaa=git.example.com", "zzz=git.example.com"]] {
            let keychain = SecretGitKeychain::new(volume.path(), args, NONE).unwrap();
            let credential = keychain
                .resolve("https://git.example.com/org/repo", "git", CredentialKinds::USER_PASS_PLAINTEXT)
                .unwrap();
            assert_eq!(credential.username(), "from-aaa");
        }
    }

    #[test]
    fn test_kind_filter_skips_earlier_names() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "aaa", "basic", "pw");
        write_ssh(volume.path(), "bbb", "KEY");

        let keychain =
            SecretGitKeychain::new(volume.path(), ["aaa=github.com"], ["bbb=github.com"]).unwrap();
        let credential = keychain
            .resolve("ssh://git@github.com/org/repo.git", "git", CredentialKinds::SSH_KEY)
            .unwrap();

        assert!(matches!(credential, GitCredential::SshKey { .. }));
    }

    #[test]
    fn test_no_credentials() {
        let keychain = SecretGitKeychain::new("/unused", ["github=github.com"], NONE).unwrap();
        let url = "https://nomatch.example/org/repo.git";

        let err = keychain
            .resolve(url, "git", CredentialKinds::USER_PASS_PLAINTEXT)
            .unwrap_err();

        assert!(err.is_no_credentials());
        assert_eq!(err.to_string(), format!("no credentials found for {}", url));
    }

    #[test]
    fn test_unreadable_secret_is_not_a_miss() {
        let volume = TempDir::new().unwrap();
        let keychain = SecretGitKeychain::new(volume.path(), ["absent=github.com"], NONE).unwrap();

        let err = keychain
            .resolve("https://github.com/org/repo", "git", CredentialKinds::USER_PASS_PLAINTEXT)
            .unwrap_err();

        assert!(!err.is_no_credentials());
        assert!(matches!(err, GitError::SecretRead { .. }));
    }

    #[test]
    fn test_invalid_url() {
        let keychain = SecretGitKeychain::default();
        let err = keychain
            .resolve("github.com/org/repo", "git", CredentialKinds::all())
            .unwrap_err();
        assert!(matches!(err, GitError::InvalidUrl { .. }));
        assert_eq!(keychain.volume(), Path::new(DEFAULT_VOLUME));
    }
}
