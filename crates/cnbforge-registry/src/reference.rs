//! OCI image references

use crate::auth::DOCKER_HUB;
use crate::error::{RegistryError, Result};

/// A parsed image reference: `registry/repository[:tag][@digest]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OciReference {
    pub registry: String,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl OciReference {
    /// Parse an image reference
    ///
    /// References without a registry host resolve to Docker Hub, and single
    /// component Docker Hub repositories live under `library/`.
    pub fn parse(s: &str) -> Result<Self> {
        let clean = s
            .trim_start_matches("oci://")
            .trim_start_matches("https://")
            .trim_start_matches("http://");

        if clean.is_empty() || clean.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidReference {
                reference: s.to_string(),
            });
        }

        let (registry, rest) = match clean.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            _ => (DOCKER_HUB.to_string(), clean.to_string()),
        };

        let (repo_tag, digest) = match rest.rsplit_once('@') {
            Some((repo_tag, digest)) => (repo_tag.to_string(), Some(digest.to_string())),
            None => (rest, None),
        };

        let (repository, tag) = match repo_tag.rsplit_once(':') {
            Some((r, t)) => (r.to_string(), Some(t.to_string())),
            None => (repo_tag, None),
        };

        if repository.is_empty()
            || tag.as_deref() == Some("")
            || digest.as_deref().is_some_and(|d| !d.contains(':'))
        {
            return Err(RegistryError::InvalidReference {
                reference: s.to_string(),
            });
        }

        let repository = if registry == DOCKER_HUB && !repository.contains('/') {
            format!("library/{}", repository)
        } else {
            repository
        };

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// `registry/repository` without tag or digest
    pub fn repository_ref(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Digest reference within the same repository
    pub fn with_digest(&self, digest: &str) -> String {
        format!("{}@{}", self.repository_ref(), digest)
    }

    /// Convert to string representation
    pub fn to_oci_string(&self) -> String {
        let mut s = self.repository_ref();
        if let Some(tag) = &self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for OciReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_oci_string())
    }
}
