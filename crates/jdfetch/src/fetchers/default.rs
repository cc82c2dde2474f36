//! Default HTTP fetcher
//!
//! Handles general HTTP/HTTPS URLs and returns the raw page HTML.
//! This is the fallback fetcher that handles any URL not served by
//! specialized fetchers.

use crate::admission::ParsedTarget;
use crate::client::FetchOptions;
use crate::error::ExtractError;
use crate::fetchers::{http_client, send_error, FetchedPage, Fetcher};
use crate::{BROWSER_ACCEPT, BROWSER_ACCEPT_LANGUAGE, BROWSER_USER_AGENT};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use tracing::warn;
use url::Url;

/// Default HTTP fetcher
///
/// Issues a single GET with browser-like headers, bounded by the
/// configured timeout, and rejects non-2xx answers.
pub struct DefaultFetcher;

impl DefaultFetcher {
    /// Create a new default fetcher
    pub fn new() -> Self {
        Self
    }
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for DefaultFetcher {
    fn name(&self) -> &'static str {
        "default"
    }

    fn matches(&self, _url: &Url) -> bool {
        // Default fetcher matches all URLs
        true
    }

    async fn fetch(
        &self,
        target: &ParsedTarget,
        options: &FetchOptions,
    ) -> Result<FetchedPage, ExtractError> {
        let client = http_client(options)?;
        let request = client
            .get(target.normalized_url())
            .headers(browser_headers(options));

        let fetch = async {
            let response = request
                .send()
                .await
                .map_err(|e| send_error(e, options))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ExtractError::UpstreamError {
                    status: status.as_u16(),
                    reason: status.canonical_reason().unwrap_or_default().to_string(),
                });
            }

            let body = read_body_capped(response, options.max_body_bytes)
                .await
                .map_err(|e| ExtractError::from_body_error(e, options.timeout))?;

            Ok::<_, ExtractError>(FetchedPage::Html {
                status_code: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        };

        tokio::time::timeout(options.timeout, fetch)
            .await
            .map_err(|_| ExtractError::FetchTimeout(options.timeout))?
    }
}

/// Masquerading header set sent with page requests
fn browser_headers(options: &FetchOptions) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let user_agent = options.user_agent.as_deref().unwrap_or(BROWSER_USER_AGENT);
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(BROWSER_USER_AGENT)),
    );
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE),
    );
    headers
}

/// Read the response body, dropping everything past `max_bytes`
async fn read_body_capped(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<Bytes, reqwest::Error> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let remaining = max_bytes - body.len();
        if chunk.len() > remaining {
            body.extend_from_slice(&chunk[..remaining]);
            warn!(max_bytes, "Body size limit reached, dropping remaining content");
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(body))
}
