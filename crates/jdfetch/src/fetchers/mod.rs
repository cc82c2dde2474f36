//! Fetcher system for specialized content fetching
//!
//! Design: Each fetcher handles specific URL patterns with custom logic.
//! FetcherRegistry tries matching fetchers in order; a failing specialized
//! fetcher falls through to the next match.

mod default;
mod workday;

pub use default::DefaultFetcher;
pub use workday::WorkdayFetcher;

use crate::admission::{hostname_of, ParsedTarget};
use crate::client::FetchOptions;
use crate::error::ExtractError;
use crate::types::ExtractedContent;
use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Redirect hop limit applied when redirects are re-validated
const MAX_REDIRECTS: usize = 10;

/// Output of a fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedPage {
    /// Raw HTML that still needs extraction
    Html {
        /// Upstream status code (always 2xx)
        status_code: u16,
        /// Decoded response body
        body: String,
    },
    /// Content the fetcher already extracted from a structured source
    Extracted(ExtractedContent),
}

/// Trait for specialized content fetchers
///
/// Implement this trait to create custom fetchers for specific URL patterns.
/// Each fetcher declares what URLs it can handle via `matches()` and
/// performs the actual fetch via `fetch()`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Unique identifier for this fetcher (for logging/debugging)
    fn name(&self) -> &'static str;

    /// Returns true if this fetcher can handle the given URL
    ///
    /// Called by the registry to determine which fetchers to use.
    /// More specific fetchers should be registered before generic ones.
    fn matches(&self, url: &Url) -> bool;

    /// Fetch content for an admitted target
    ///
    /// Called only if `matches()` returned true.
    async fn fetch(
        &self,
        target: &ParsedTarget,
        options: &FetchOptions,
    ) -> Result<FetchedPage, ExtractError>;
}

/// Registry of fetchers that dispatches to the appropriate handler
///
/// Maintains an ordered list of fetchers. When fetching a URL, tries every
/// matching fetcher in order until one succeeds. The error of the last
/// matching fetcher is returned if none does.
pub struct FetcherRegistry {
    fetchers: Vec<Box<dyn Fetcher>>,
}

impl Default for FetcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FetcherRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            fetchers: Vec::new(),
        }
    }

    /// Create a registry with default fetchers pre-registered
    ///
    /// Includes (in order of priority):
    /// 1. WorkdayFetcher - handles Workday job posting URLs
    /// 2. DefaultFetcher - handles all HTTP/HTTPS URLs
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(WorkdayFetcher::new()));
        // Default fetcher last (catches all remaining URLs)
        registry.register(Box::new(DefaultFetcher::new()));
        registry
    }

    /// Register a fetcher
    ///
    /// Fetchers are checked in registration order, so register more
    /// specific fetchers before generic ones.
    pub fn register(&mut self, fetcher: Box<dyn Fetcher>) {
        self.fetchers.push(fetcher);
    }

    /// Fetch an admitted target using the matching fetchers
    pub async fn fetch(
        &self,
        target: &ParsedTarget,
        options: &FetchOptions,
    ) -> Result<FetchedPage, ExtractError> {
        let matching: Vec<&dyn Fetcher> = self
            .fetchers
            .iter()
            .filter(|fetcher| fetcher.matches(target.url()))
            .map(|fetcher| fetcher.as_ref())
            .collect();

        for (index, fetcher) in matching.iter().enumerate() {
            debug!(fetcher = fetcher.name(), url = %target.normalized_url(), "Using fetcher");
            match fetcher.fetch(target, options).await {
                Ok(page) => return Ok(page),
                Err(err) if index + 1 < matching.len() => {
                    warn!(
                        fetcher = fetcher.name(),
                        error = %err,
                        "Fetcher failed, falling back to next fetcher"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Err(ExtractError::FetcherError(
            "No fetcher available for URL".to_string(),
        ))
    }
}

/// Redirect target rejected by the redirect guard
#[derive(Debug, Error)]
#[error("redirect to {0} denied by admission control")]
struct RedirectDenied(String);

/// Build an HTTP client honoring the timeout and redirect settings
pub(crate) fn http_client(options: &FetchOptions) -> Result<reqwest::Client, ExtractError> {
    reqwest::Client::builder()
        .connect_timeout(options.timeout)
        .timeout(options.timeout)
        .redirect(redirect_policy(options))
        .build()
        .map_err(ExtractError::ClientBuildError)
}

/// Client-default redirects unless a redirect guard is configured
fn redirect_policy(options: &FetchOptions) -> Policy {
    let Some(guard) = options.redirect_guard.as_ref().map(Arc::clone) else {
        return Policy::default();
    };

    Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let hostname = hostname_of(attempt.url());
        if guard.admit(attempt.url().scheme(), &hostname).is_err() {
            return attempt.error(RedirectDenied(hostname));
        }
        attempt.follow()
    })
}

/// Classify an error raised while sending a request
pub(crate) fn send_error(err: reqwest::Error, options: &FetchOptions) -> ExtractError {
    if is_redirect_denied(&err) {
        return ExtractError::PrivateNetworkDenied;
    }
    ExtractError::from_reqwest(err, options.timeout)
}

fn is_redirect_denied(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if inner.downcast_ref::<RedirectDenied>().is_some() {
            return true;
        }
        source = inner.source();
    }
    false
}
