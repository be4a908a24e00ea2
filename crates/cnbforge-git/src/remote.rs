//! Git remote URL host extraction and domain matching
//!
//! Two remote shapes are accepted:
//! - scheme URLs (`https://host/org/repo`, `ssh://git@host:2222/org/repo`)
//! - SCP-like shorthand without a scheme (`git@host:org/repo.git`)

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::{GitError, Result};

static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^:]+://").expect("valid regex"));

static SCP_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<user>[^@]+)@)?(?P<host>[^:\s]+):(?:(?P<port>[0-9]{1,5})(?:/|:))?(?P<path>[^\\].*/[^\\].*)$",
    )
    .expect("valid regex")
});

/// Host a git remote URL points at
///
/// Scheme URLs yield `host`, or `host:port` whenever the URL spells out a
/// port, default or not. SCP-like URLs yield the host alone.
pub fn host_for_url(url: &str) -> Result<String> {
    if !SCHEME.is_match(url) {
        if let Some(captures) = SCP_LIKE.captures(url) {
            if let Some(host) = captures.name("host") {
                return Ok(host.as_str().to_string());
            }
        }
    }

    let parsed = Url::parse(url).map_err(|e| GitError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host,
        _ => {
            return Err(GitError::InvalidUrl {
                url: url.to_string(),
                reason: "no host".to_string(),
            });
        }
    };

    // `Url` drops ports equal to the scheme default; the authority still has them.
    let port = parsed.port().or_else(|| {
        let default = parsed.port_or_known_default()?;
        authority_has_port(url, default).then_some(default)
    });

    Ok(match port {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn authority_has_port(url: &str, port: u16) -> bool {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    host_port
        .rsplit_once(':')
        .is_some_and(|(_, p)| p.parse::<u16>().ok() == Some(port))
}

/// Reduce a configured domain to the host it names
///
/// Accepts bare hosts as well as `https://host/path` or `user@host` forms.
pub fn normalize_domain(domain: &str) -> &str {
    let domain = domain.trim();
    let domain = domain.split_once("://").map_or(domain, |(_, rest)| rest);
    let domain = domain.split('/').next().unwrap_or(domain);
    domain.rsplit_once('@').map_or(domain, |(_, host)| host)
}

/// Whether a configured domain names `host`
///
/// Exact, ASCII case-insensitive comparison: `example.com` does not match
/// `git.example.com`.
pub fn domain_matches(domain: &str, host: &str) -> bool {
    let domain = normalize_domain(domain);
    !domain.is_empty() && domain.eq_ignore_ascii_case(host)
}
