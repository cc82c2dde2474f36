//! jdfetch - hardened web page fetching and text extraction
//!
//! This crate turns an arbitrary, caller-supplied URL into a bounded
//! plain-text extract plus a few metadata fields (title, company/site name,
//! the caller's URL), while refusing to act as an open proxy into private
//! networks.
//!
//! ## Pipeline
//!
//! Every request runs through the same forward-only stages:
//!
//! 1. Admission control ([`UrlGuard`]) - scheme and private-host checks
//! 2. Fetching ([`FetcherRegistry`]) - bounded outbound GET
//! 3. Extraction ([`ContentExtractor`]) - markup removal and linearization
//! 4. Normalization ([`normalize`]) - truncation and payload assembly
//!
//! Built-in fetchers:
//! - [`WorkdayFetcher`] - Workday job postings via their JSON API
//! - [`DefaultFetcher`] - General HTTP/HTTPS fetcher returning raw HTML
//!
//! The [`server`] module exposes the pipeline as a single HTTP endpoint.

pub mod admission;
pub mod client;
mod error;
pub mod extract;
pub mod fetchers;
pub mod normalize;
pub mod server;
mod types;

pub use admission::{parse_target, BasicGuard, ParsedTarget, UrlGuard};
pub use client::{extract, FetchOptions, Pipeline, PipelineBuilder, Stage};
pub use error::ExtractError;
pub use extract::{ContentExtractor, HtmlExtractor};
pub use fetchers::{DefaultFetcher, FetchedPage, Fetcher, FetcherRegistry, WorkdayFetcher};
pub use types::{ErrorBody, ExtractedContent, ExtractResponse};

use std::time::Duration;

/// Desktop browser User-Agent sent with every outbound request
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Accept header sent with page requests
pub const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Accept-Language header sent with page requests
pub const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Hard upper bound on a single outbound fetch
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Maximum number of characters returned in `text`
pub const MAX_TEXT_LENGTH: usize = 15_000;

/// Maximum number of body bytes read from the upstream response
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Service description for LLM consumption (llmtxt)
pub const SERVICE_LLMTXT: &str = r#"# jdfetch

Fetches a web page (typically a job posting) and returns a plain-text
extract with a little metadata.

## Endpoint
`GET /api/fetch-jd?url=<absolute http(s) URL>`

## Output Fields
- `text`: visible body text, whitespace-collapsed, at most 15000 characters
- `title`: `<title>` text, or `og:title`, or ""
- `company`: `og:site_name`, or ""
- `url`: the `url` parameter exactly as supplied

## Errors
Errors are JSON `{"error": "...", "details": "..."}`:
- 400 missing `url`, malformed URL, or non-http(s) scheme
- 403 localhost / private network targets
- 405 any method other than GET or OPTIONS
- 500 timeout (8s), connection failure, extraction failure
- upstream status code when the target answers with a non-2xx status

## Example
```
curl 'http://localhost:8787/api/fetch-jd?url=https://example.com/jobs/42'
```
"#;
