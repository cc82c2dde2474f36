//! Workday job posting fetcher
//!
//! Workday career sites are single-page apps whose HTML carries almost no
//! text. Their public JSON endpoint returns the posting directly, so this
//! fetcher asks it first. Any failure hands the URL to the next fetcher.

use crate::admission::ParsedTarget;
use crate::client::FetchOptions;
use crate::error::ExtractError;
use crate::extract::fragment_to_text;
use crate::fetchers::{http_client, send_error, FetchedPage, Fetcher};
use crate::types::ExtractedContent;
use crate::BROWSER_USER_AGENT;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Host suffix of Workday-hosted career sites
const WORKDAY_HOST_SUFFIX: &str = "myworkdayjobs.com";

/// Workday job posting fetcher
///
/// Matches `https://{company}.{dc}.myworkdayjobs.com/{tenant}/{job path}`
/// and queries `/wday/cxs/{company}/{tenant}/{job path}` on the same origin.
#[derive(Debug, Clone, Default)]
pub struct WorkdayFetcher {
    api_base: Option<Url>,
}

/// API location derived from a posting URL
#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkdayJob {
    origin: String,
    api_path: String,
    company: String,
}

impl WorkdayJob {
    fn api_url(&self, api_base: Option<&Url>) -> String {
        let base = api_base
            .map(|base| base.as_str().trim_end_matches('/'))
            .unwrap_or(self.origin.as_str());
        format!("{base}{}", self.api_path)
    }
}

impl WorkdayFetcher {
    /// Create a new Workday fetcher
    pub fn new() -> Self {
        Self { api_base: None }
    }

    /// Query the posting API at `api_base` instead of the posting's origin
    pub fn with_api_base(api_base: Url) -> Self {
        Self {
            api_base: Some(api_base),
        }
    }

    /// Derive the JSON API URL and company label from a posting URL
    fn parse_workday_url(url: &Url) -> Option<WorkdayJob> {
        let host = url.host_str()?;
        if !host.ends_with(WORKDAY_HOST_SUFFIX) {
            return None;
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        // Need at least a tenant and one job path segment
        if segments.len() < 2 {
            return None;
        }

        let company = host.split('.').next().unwrap_or_default();
        let tenant = segments[0];
        let job_path = segments[1..].join("/");

        Some(WorkdayJob {
            origin: url.origin().ascii_serialization(),
            api_path: format!("/wday/cxs/{company}/{tenant}/{job_path}"),
            company: company.to_string(),
        })
    }
}

/// Workday posting API response (partial)
#[derive(Debug, Deserialize)]
struct WorkdayResponse {
    #[serde(rename = "jobPostingInfo")]
    job_posting_info: Option<WorkdayPosting>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkdayPosting {
    title: Option<String>,
    #[serde(rename = "jobDescription")]
    job_description: Option<String>,
    #[serde(rename = "hiringOrganization")]
    hiring_organization: Option<Value>,
}

#[async_trait]
impl Fetcher for WorkdayFetcher {
    fn name(&self) -> &'static str {
        "workday"
    }

    fn matches(&self, url: &Url) -> bool {
        Self::parse_workday_url(url).is_some()
    }

    async fn fetch(
        &self,
        target: &ParsedTarget,
        options: &FetchOptions,
    ) -> Result<FetchedPage, ExtractError> {
        let job = Self::parse_workday_url(target.url()).ok_or_else(|| {
            ExtractError::FetcherError("Not a valid Workday posting URL".to_string())
        })?;

        let api_url = job.api_url(self.api_base.as_ref());
        debug!(api_url = %api_url, "Querying Workday posting API");

        let client = http_client(options)?;
        let user_agent = options.user_agent.as_deref().unwrap_or(BROWSER_USER_AGENT);
        let response = client
            .get(&api_url)
            .header(
                USER_AGENT,
                HeaderValue::from_str(user_agent)
                    .unwrap_or_else(|_| HeaderValue::from_static(BROWSER_USER_AGENT)),
            )
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
            .map_err(|e| send_error(e, options))?;

        if !response.status().is_success() {
            return Err(ExtractError::FetcherError(format!(
                "Workday API error: HTTP {}",
                response.status().as_u16()
            )));
        }

        let data: WorkdayResponse = response.json().await.map_err(|e| {
            ExtractError::FetcherError(format!("Failed to parse Workday posting: {}", e))
        })?;

        let posting = data.job_posting_info.ok_or_else(|| {
            ExtractError::FetcherError("Workday response has no jobPostingInfo".to_string())
        })?;

        Ok(FetchedPage::Extracted(content_from_posting(
            posting,
            &job.company,
        )))
    }
}

/// Flatten a Workday posting into extracted content
fn content_from_posting(posting: WorkdayPosting, company: &str) -> ExtractedContent {
    let text = posting
        .job_description
        .as_deref()
        .map(fragment_to_text)
        .unwrap_or_default();

    let hiring_organization = match posting.hiring_organization {
        Some(Value::String(name)) => Some(name),
        Some(Value::Object(org)) => org
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    };

    ExtractedContent {
        text,
        title: posting.title.unwrap_or_default(),
        company: hiring_organization
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| company.to_string()),
    }
}
