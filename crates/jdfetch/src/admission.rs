//! URL admission control
//!
//! Decides whether a caller-supplied URL may be fetched at all. The default
//! [`BasicGuard`] is a literal string check over scheme and hostname; it does
//! not resolve DNS and does not know about CIDR ranges. Stricter policies
//! plug in through the [`UrlGuard`] trait without touching the pipeline.

use crate::error::ExtractError;
use std::fmt;
use url::{Host, Url};

/// Schemes the fetcher is allowed to use
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Hostnames denied by exact match
const DENIED_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// Hostname prefixes denied by prefix match
const DENIED_HOST_PREFIXES: &[&str] = &["192.168.", "10."];

/// A successfully parsed target URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    raw: String,
    url: Url,
    hostname: String,
}

impl ParsedTarget {
    /// The string exactly as supplied by the caller
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The parsed URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Scheme without the trailing colon (`http`, `https`, ...)
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Lowercased hostname; IPv6 literals are rendered without brackets
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Serialized, normalized form of the URL
    pub fn normalized_url(&self) -> &str {
        self.url.as_str()
    }
}

/// Parse a caller-supplied string as an absolute URL
pub fn parse_target(raw: &str) -> Result<ParsedTarget, ExtractError> {
    let url = Url::parse(raw).map_err(|_| ExtractError::InvalidUrlFormat)?;
    let hostname = hostname_of(&url);
    Ok(ParsedTarget {
        raw: raw.to_string(),
        url,
        hostname,
    })
}

/// Hostname used for admission decisions
pub fn hostname_of(url: &Url) -> String {
    match url.host() {
        Some(Host::Domain(domain)) => domain.to_lowercase(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => String::new(),
    }
}

/// Policy deciding whether a (scheme, hostname) pair may be fetched
///
/// Implementations must be pure: the same input always yields the same
/// decision, and no network access happens while deciding.
pub trait UrlGuard: Send + Sync + fmt::Debug {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Returns `Ok(())` if the target may be fetched
    ///
    /// `scheme` has no trailing colon; `hostname` is lowercased.
    fn admit(&self, scheme: &str, hostname: &str) -> Result<(), ExtractError>;

    /// Convenience wrapper over [`UrlGuard::admit`] for a parsed target
    fn admit_target(&self, target: &ParsedTarget) -> Result<(), ExtractError> {
        self.admit(target.scheme(), target.hostname())
    }
}

/// Best-effort SSRF guard using literal hostname checks
///
/// Denies `localhost`, `127.0.0.1`, `::1` and anything starting with
/// `192.168.` or `10.`. Other private ranges (169.254/16, 172.16/12,
/// IPv4-mapped IPv6) pass, as do hostnames that resolve to private
/// addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicGuard;

impl BasicGuard {
    /// Create a new basic guard
    pub fn new() -> Self {
        Self
    }
}

impl UrlGuard for BasicGuard {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn admit(&self, scheme: &str, hostname: &str) -> Result<(), ExtractError> {
        if !ALLOWED_SCHEMES.contains(&scheme) {
            return Err(ExtractError::DisallowedProtocol);
        }

        if DENIED_HOSTS.contains(&hostname)
            || DENIED_HOST_PREFIXES
                .iter()
                .any(|prefix| hostname.starts_with(prefix))
        {
            return Err(ExtractError::PrivateNetworkDenied);
        }

        Ok(())
    }
}
