//! Request pipeline for jdfetch
//!
//! This module wires the stages together: admission control, fetching,
//! extraction and normalization. The actual network access is implemented
//! by fetchers in the [`fetchers`](crate::fetchers) module.

use crate::admission::{parse_target, BasicGuard, UrlGuard};
use crate::error::ExtractError;
use crate::extract::{ContentExtractor, HtmlExtractor};
use crate::fetchers::{FetchedPage, FetcherRegistry};
use crate::normalize::assemble;
use crate::types::{ExtractResponse, ExtractedContent};
use crate::{FETCH_TIMEOUT, MAX_BODY_BYTES, MAX_TEXT_LENGTH};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Fetch options that can be configured via the pipeline builder
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Custom User-Agent (defaults to a desktop browser string)
    pub user_agent: Option<String>,
    /// Hard bound on a single outbound fetch
    pub timeout: Duration,
    /// Maximum characters of extracted text
    pub max_text_length: usize,
    /// Maximum body bytes read from upstream
    pub max_body_bytes: usize,
    /// Allow list of URL prefixes
    pub allow_prefixes: Vec<String>,
    /// Block list of URL prefixes
    pub block_prefixes: Vec<String>,
    /// Re-check every redirect hop with this guard
    pub redirect_guard: Option<Arc<dyn UrlGuard>>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout: FETCH_TIMEOUT,
            max_text_length: MAX_TEXT_LENGTH,
            max_body_bytes: MAX_BODY_BYTES,
            allow_prefixes: Vec::new(),
            block_prefixes: Vec::new(),
            redirect_guard: None,
        }
    }
}

impl FetchOptions {
    /// Check the raw URL against the allow and block prefix lists
    fn check_prefixes(&self, raw_url: &str) -> Result<(), ExtractError> {
        if !self.allow_prefixes.is_empty()
            && !self
                .allow_prefixes
                .iter()
                .any(|prefix| raw_url.starts_with(prefix))
        {
            return Err(ExtractError::BlockedUrl);
        }

        if self
            .block_prefixes
            .iter()
            .any(|prefix| raw_url.starts_with(prefix))
        {
            return Err(ExtractError::BlockedUrl);
        }

        Ok(())
    }
}

/// Pipeline stage, reported through [`Pipeline::run_with_status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Request accepted by the gate
    Received,
    /// Target passed admission control
    Validated,
    /// Outbound fetch in flight
    Fetching,
    /// Page is being converted to text
    Extracting,
    /// Text is being truncated and assembled
    Normalizing,
    /// Success payload is ready
    Responded,
    /// A stage failed with the given response status; the error is
    /// returned to the caller
    Failed(u16),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Normalizing => "normalizing",
            Stage::Responded => "responded",
            Stage::Failed(_) => "failed",
        };
        f.write_str(name)
    }
}

/// Extract a URL with the default pipeline
///
/// Uses [`BasicGuard`], the default fetcher registry and [`HtmlExtractor`].
/// For custom options, use [`Pipeline::builder`].
pub async fn extract(url: &str) -> Result<ExtractResponse, ExtractError> {
    Pipeline::default().run(url).await
}

/// Builder for configuring the pipeline
pub struct PipelineBuilder {
    options: FetchOptions,
    guard: Arc<dyn UrlGuard>,
    extractor: Arc<dyn ContentExtractor>,
    registry: Option<FetcherRegistry>,
    revalidate_redirects: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Create a builder with the default guard, fetchers and extractor
    pub fn new() -> Self {
        Self {
            options: FetchOptions::default(),
            guard: Arc::new(BasicGuard::new()),
            extractor: Arc::new(HtmlExtractor::new()),
            registry: None,
            revalidate_redirects: false,
        }
    }

    /// Set custom User-Agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.options.user_agent = Some(ua.into());
        self
    }

    /// Set the outbound fetch timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Set the maximum length of returned text, in characters
    pub fn max_text_length(mut self, max: usize) -> Self {
        self.options.max_text_length = max;
        self
    }

    /// Set the maximum number of body bytes read from upstream
    pub fn max_body_bytes(mut self, max: usize) -> Self {
        self.options.max_body_bytes = max;
        self
    }

    /// Add URL prefix to allow list
    pub fn allow_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.allow_prefixes.push(prefix.into());
        self
    }

    /// Add URL prefix to block list
    pub fn block_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.block_prefixes.push(prefix.into());
        self
    }

    /// Replace the admission guard
    pub fn guard(mut self, guard: impl UrlGuard + 'static) -> Self {
        self.guard = Arc::new(guard);
        self
    }

    /// Replace the content extractor
    pub fn extractor(mut self, extractor: impl ContentExtractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Replace the fetcher registry
    pub fn registry(mut self, registry: FetcherRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Re-run the admission guard on every redirect hop
    ///
    /// Off by default: redirects follow the HTTP client's default policy
    /// and only the caller-supplied URL is checked.
    pub fn revalidate_redirects(mut self, enable: bool) -> Self {
        self.revalidate_redirects = enable;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        let mut options = self.options;
        if self.revalidate_redirects {
            options.redirect_guard = Some(Arc::clone(&self.guard));
        }

        Pipeline {
            options,
            guard: self.guard,
            extractor: self.extractor,
            registry: self.registry.unwrap_or_else(FetcherRegistry::with_defaults),
        }
    }
}

/// Configured fetch-and-extract pipeline
///
/// Holds configuration only; every call to [`Pipeline::run`] is independent.
pub struct Pipeline {
    options: FetchOptions,
    guard: Arc<dyn UrlGuard>,
    extractor: Arc<dyn ContentExtractor>,
    registry: FetcherRegistry,
}

impl Default for Pipeline {
    fn default() -> Self {
        PipelineBuilder::new().build()
    }
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Active fetch options
    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch and extract `raw_url`
    pub async fn run(&self, raw_url: &str) -> Result<ExtractResponse, ExtractError> {
        self.run_with_status(raw_url, |_| {}).await
    }

    /// Fetch and extract `raw_url`, reporting each stage transition
    ///
    /// [`Stage::Failed`] is reported once, carrying the error's status code,
    /// before an error is returned.
    pub async fn run_with_status<F>(
        &self,
        raw_url: &str,
        mut status_callback: F,
    ) -> Result<ExtractResponse, ExtractError>
    where
        F: FnMut(Stage),
    {
        let result = self.run_stages(raw_url, &mut status_callback).await;
        if let Err(err) = &result {
            status_callback(Stage::Failed(err.status_code()));
        }
        result
    }

    async fn run_stages<F>(
        &self,
        raw_url: &str,
        status_callback: &mut F,
    ) -> Result<ExtractResponse, ExtractError>
    where
        F: FnMut(Stage),
    {
        status_callback(Stage::Received);

        if raw_url.is_empty() {
            return Err(ExtractError::MissingParameter);
        }

        let target = parse_target(raw_url)?;
        self.guard.admit_target(&target)?;
        self.options.check_prefixes(raw_url)?;
        status_callback(Stage::Validated);

        status_callback(Stage::Fetching);
        let page = self.registry.fetch(&target, &self.options).await?;

        status_callback(Stage::Extracting);
        let content = match page {
            FetchedPage::Html { status_code, body } => {
                debug!(
                    status_code,
                    bytes = body.len(),
                    extractor = self.extractor.name(),
                    "Extracting page"
                );
                self.extract_html(body).await?
            }
            FetchedPage::Extracted(content) => content,
        };

        status_callback(Stage::Normalizing);
        let response = assemble(content, raw_url, self.options.max_text_length);

        info!(
            url = %target.normalized_url(),
            chars = response.text.chars().count(),
            "Extracted page"
        );
        status_callback(Stage::Responded);
        Ok(response)
    }

    /// Run the extractor on the blocking pool
    ///
    /// A panic inside the parser surfaces as [`ExtractError::ExtractionError`].
    async fn extract_html(&self, html: String) -> Result<ExtractedContent, ExtractError> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract(&html))
            .await
            .map_err(|e| ExtractError::ExtractionError(e.to_string()))?
    }
}
