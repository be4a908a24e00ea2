//! Integration tests for credential selection from mounted secrets

use std::path::Path;
use std::sync::Arc;

use cnbforge_git::{
    CredentialDescriptor, CredentialKinds, GitCredential, GitError, GitKeychain, KeychainConfig,
    SecretGitKeychain, SecretKind,
};
use tempfile::TempDir;

const NONE: [&str; 0] = [];

fn write_basic(volume: &Path, name: &str, username: &str, password: &str) {
    let dir = volume.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("username"), username).unwrap();
    std::fs::write(dir.join("password"), password).unwrap();
}

fn write_ssh(volume: &Path, name: &str, key: &str) {
    let dir = volume.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("ssh-privatekey"), key).unwrap();
}

mod selection {
    use super::*;

    #[test]
    fn test_lowest_secret_name_wins_regardless_of_argument_order() {
        let volume = TempDir::new().unwrap();
        write_ssh(volume.path(), "zzz", "KEY-ZZZ");
        write_ssh(volume.path(), "aaa", "KEY-AAA");

        let orders = [
            ["zzz=git.example.com", "aaa=git.example.com"],
            ["aaa=git.example.com", "zzz=git.example.com"],
        ];
        for args in orders {
            let keychain = SecretGitKeychain::new(volume.path(), NONE, args).unwrap();
            let credential = keychain
                .resolve("ssh://git@git.example.com/org/repo.git", "git", CredentialKinds::SSH_KEY)
                .unwrap();

            assert_eq!(
                credential,
                GitCredential::SshKey {
                    username: "git".to_string(),
                    private_key: "KEY-AAA".to_string(),
                }
            );
        }
    }

    #[test]
    fn test_scp_like_and_scheme_urls_select_same_descriptor() {
        let volume = TempDir::new().unwrap();
        write_ssh(volume.path(), "github-key", "GITHUB");
        write_ssh(volume.path(), "gitlab-key", "GITLAB");

        let keychain = SecretGitKeychain::new(
            volume.path(),
            NONE,
            ["gitlab-key=gitlab.com", "github-key=github.com"],
        )
        .unwrap();

        let scp = keychain
            .resolve("git@github.com:org/repo.git", "git", CredentialKinds::SSH_KEY)
            .unwrap();
        let scheme = keychain
            .resolve("ssh://git@github.com/org/repo.git", "git", CredentialKinds::SSH_KEY)
            .unwrap();

        assert_eq!(scp, scheme);
        assert!(matches!(scp, GitCredential::SshKey { ref private_key, .. } if private_key == "GITHUB"));
    }

    #[test]
    fn test_no_match_names_url() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "github", "octocat", "token");

        let keychain = SecretGitKeychain::new(volume.path(), ["github=github.com"], NONE).unwrap();
        let url = "https://nomatch.example/org/repo.git";

        match keychain.resolve(url, "git", CredentialKinds::USER_PASS_PLAINTEXT) {
            Err(GitError::NoCredentials { url: reported }) => assert_eq!(reported, url),
            other => panic!("Expected NoCredentials, got {:?}", other),
        }
    }

    #[test]
    fn test_disallowed_kind_is_a_miss() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "github", "octocat", "token");

        let keychain = SecretGitKeychain::new(volume.path(), ["github=github.com"], NONE).unwrap();
        let err = keychain
            .resolve("git@github.com:org/repo.git", "git", CredentialKinds::SSH_KEY)
            .unwrap_err();

        assert!(err.is_no_credentials());
    }

    #[test]
    fn test_explicit_default_port_matches_descriptor_with_port() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "with-port", "ported", "pw");
        write_basic(volume.path(), "without-port", "plain", "pw");

        let keychain = SecretGitKeychain::new(
            volume.path(),
            ["with-port=github.com:443", "without-port=github.com"],
            NONE,
        )
        .unwrap();

        let ported = keychain
            .resolve("https://github.com:443/org/repo", "git", CredentialKinds::USER_PASS_PLAINTEXT)
            .unwrap();
        let plain = keychain
            .resolve("https://github.com/org/repo", "git", CredentialKinds::USER_PASS_PLAINTEXT)
            .unwrap();

        assert_eq!(ported.username(), "ported");
        assert_eq!(plain.username(), "plain");
    }

    #[test]
    fn test_token_as_username_with_empty_password() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "tok", "ghp_token", "");

        let keychain = SecretGitKeychain::new(volume.path(), ["tok=github.com"], NONE).unwrap();
        let credential = keychain
            .resolve("https://github.com/org/repo", "git", CredentialKinds::USER_PASS_PLAINTEXT)
            .unwrap();

        assert_eq!(
            credential,
            GitCredential::UserPass {
                username: "ghp_token".to_string(),
                password: String::new(),
            }
        );
    }

    #[test]
    fn test_subdomain_does_not_match() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "example", "user", "pw");

        let keychain = SecretGitKeychain::new(volume.path(), ["example=example.com"], NONE).unwrap();
        let err = keychain
            .resolve("https://git.example.com/repo.git", "git", CredentialKinds::USER_PASS_PLAINTEXT)
            .unwrap_err();

        assert!(err.is_no_credentials());
    }
}

mod construction {
    use super::*;

    #[test]
    fn test_malformed_argument_fails_before_resolve() {
        let result = SecretGitKeychain::new("/var/build-secrets", ["onlyname"], NONE);
        assert!(matches!(result, Err(GitError::InvalidSecretArgument { .. })));

        let result = SecretGitKeychain::new("/var/build-secrets", NONE, ["onlyname"]);
        assert!(matches!(result, Err(GitError::InvalidSecretArgument { .. })));
    }

    #[test]
    fn test_missing_secret_files_fail_at_read_time() {
        let volume = TempDir::new().unwrap();
        let keychain = SecretGitKeychain::new(volume.path(), ["absent=github.com"], NONE).unwrap();

        let err = keychain
            .resolve("https://github.com/org/repo", "git", CredentialKinds::USER_PASS_PLAINTEXT)
            .unwrap_err();

        match err {
            GitError::SecretRead { secret, .. } => assert_eq!(secret, "absent"),
            other => panic!("Expected SecretRead, got {:?}", other),
        }
    }

    #[test]
    fn test_from_config() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "github", "octocat", "token");

        let yaml = format!(
            "volume: {}\nbasicAuth:\n  - github=github.com\n",
            volume.path().display()
        );
        let keychain = KeychainConfig::from_yaml(&yaml).unwrap().build().unwrap();

        let credential = keychain
            .resolve("https://github.com/org/repo", "git", CredentialKinds::USER_PASS_PLAINTEXT)
            .unwrap();
        assert_eq!(credential.username(), "octocat");
    }
}

mod freshness {
    use super::*;

    #[test]
    fn test_rotated_secret_observed_on_next_resolve() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "github", "octocat", "old-token");

        let keychain = SecretGitKeychain::new(volume.path(), ["github=github.com"], NONE).unwrap();
        let url = "https://github.com/org/repo.git";

        let before = keychain.resolve(url, "git", CredentialKinds::USER_PASS_PLAINTEXT).unwrap();
        write_basic(volume.path(), "github", "octocat", "new-token");
        let after = keychain.resolve(url, "git", CredentialKinds::USER_PASS_PLAINTEXT).unwrap();

        assert!(matches!(before, GitCredential::UserPass { ref password, .. } if password == "old-token"));
        assert!(matches!(after, GitCredential::UserPass { ref password, .. } if password == "new-token"));
    }

    #[test]
    fn test_added_descriptor_takes_part_in_ordering() {
        let volume = TempDir::new().unwrap();
        write_basic(volume.path(), "mmm", "from-mmm", "pw");
        write_basic(volume.path(), "aaa", "from-aaa", "pw");

        let keychain = SecretGitKeychain::new(volume.path(), ["mmm=github.com"], NONE).unwrap();
        let url = "https://github.com/org/repo";

        let first = keychain.resolve(url, "git", CredentialKinds::USER_PASS_PLAINTEXT).unwrap();
        assert_eq!(first.username(), "from-mmm");

        keychain.add(CredentialDescriptor::new("aaa", "github.com", SecretKind::Basic, volume.path()));
        let second = keychain.resolve(url, "git", CredentialKinds::USER_PASS_PLAINTEXT).unwrap();
        assert_eq!(second.username(), "from-aaa");
    }

    #[test]
    fn test_concurrent_resolve_and_add() {
        let volume = TempDir::new().unwrap();
        for name in ["a00", "b00", "c00"] {
            write_basic(volume.path(), name, name, "pw");
        }

        let keychain = Arc::new(
            SecretGitKeychain::new(volume.path(), ["c00=github.com", "b00=github.com"], NONE).unwrap(),
        );

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let keychain = Arc::clone(&keychain);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let credential = keychain
                            .resolve("https://github.com/org/repo", "git", CredentialKinds::USER_PASS_PLAINTEXT)
                            .unwrap();
                        assert!(credential.username() == "a00" || credential.username() == "b00");
                    }
                })
            })
            .collect();

        keychain.add(CredentialDescriptor::new("a00", "github.com", SecretKind::Basic, volume.path()));

        for reader in readers {
            reader.join().unwrap();
        }

        let names: Vec<String> = keychain.descriptors().into_iter().map(|d| d.secret_name).collect();
        assert_eq!(names, vec!["a00", "b00", "c00"]);
    }
}
