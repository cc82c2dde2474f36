//! Error types for jdfetch

use std::time::Duration;
use thiserror::Error;

/// Errors that can terminate a fetch-and-extract request
///
/// Every variant maps to an HTTP status via [`ExtractError::status_code`].
/// None of them is retried.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Request method is neither GET nor OPTIONS
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// `url` query parameter is absent or empty
    #[error("Missing content URL")]
    MissingParameter,

    /// Target could not be parsed as an absolute URL
    #[error("Invalid URL format")]
    InvalidUrlFormat,

    /// Target scheme is not http or https
    #[error("Invalid protocol. Only http and https are allowed.")]
    DisallowedProtocol,

    /// Target host is loopback or a denied private range
    #[error("Access to private networks is denied.")]
    PrivateNetworkDenied,

    /// Target is rejected by the configured prefix lists
    #[error("Blocked URL: prefix not allowed")]
    BlockedUrl,

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// Upstream did not answer within the fetch timeout
    #[error("Failed to fetch page: timed out after {} ms", .0.as_millis())]
    FetchTimeout(Duration),

    /// DNS, connect, TLS or other transport failure
    #[error("Failed to fetch page: could not reach server")]
    FetchTransportError(#[source] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Failed to fetch page: {status} {reason}")]
    UpstreamError { status: u16, reason: String },

    /// Body could not be read or parsed
    #[error("Failed to extract content")]
    ExtractionError(String),

    /// Fetcher-specific error
    #[error("Fetcher error: {0}")]
    FetcherError(String),
}

impl ExtractError {
    /// Classify a reqwest error raised while sending a request
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ExtractError::FetchTimeout(timeout)
        } else {
            ExtractError::FetchTransportError(err)
        }
    }

    /// Classify a reqwest error raised while reading the response body
    pub fn from_body_error(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ExtractError::FetchTimeout(timeout)
        } else {
            ExtractError::ExtractionError(err.to_string())
        }
    }

    /// HTTP status code reported to the caller
    pub fn status_code(&self) -> u16 {
        match self {
            ExtractError::MethodNotAllowed => 405,
            ExtractError::MissingParameter
            | ExtractError::InvalidUrlFormat
            | ExtractError::DisallowedProtocol => 400,
            ExtractError::PrivateNetworkDenied | ExtractError::BlockedUrl => 403,
            ExtractError::UpstreamError { status, .. } => *status,
            ExtractError::ClientBuildError(_)
            | ExtractError::FetchTimeout(_)
            | ExtractError::FetchTransportError(_)
            | ExtractError::ExtractionError(_)
            | ExtractError::FetcherError(_) => 500,
        }
    }

    /// Diagnostic detail, only exposed for generic extraction failures
    pub fn details(&self) -> Option<&str> {
        match self {
            ExtractError::ExtractionError(details) => Some(details),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ExtractError::MissingParameter.to_string(),
            "Missing content URL"
        );
        assert_eq!(
            ExtractError::DisallowedProtocol.to_string(),
            "Invalid protocol. Only http and https are allowed."
        );
        assert_eq!(
            ExtractError::PrivateNetworkDenied.to_string(),
            "Access to private networks is denied."
        );
        assert_eq!(
            ExtractError::UpstreamError {
                status: 404,
                reason: "Not Found".to_string()
            }
            .to_string(),
            "Failed to fetch page: 404 Not Found"
        );
        assert_eq!(
            ExtractError::FetchTimeout(Duration::from_secs(8)).to_string(),
            "Failed to fetch page: timed out after 8000 ms"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ExtractError::MethodNotAllowed.status_code(), 405);
        assert_eq!(ExtractError::MissingParameter.status_code(), 400);
        assert_eq!(ExtractError::InvalidUrlFormat.status_code(), 400);
        assert_eq!(ExtractError::DisallowedProtocol.status_code(), 400);
        assert_eq!(ExtractError::PrivateNetworkDenied.status_code(), 403);
        assert_eq!(ExtractError::BlockedUrl.status_code(), 403);
        assert_eq!(
            ExtractError::FetchTimeout(Duration::from_secs(8)).status_code(),
            500
        );
        assert_eq!(
            ExtractError::UpstreamError {
                status: 503,
                reason: "Service Unavailable".to_string()
            }
            .status_code(),
            503
        );
        assert_eq!(
            ExtractError::ExtractionError("boom".to_string()).status_code(),
            500
        );
    }

    #[test]
    fn test_details_only_for_extraction_errors() {
        assert_eq!(
            ExtractError::ExtractionError("bad utf-8".to_string()).details(),
            Some("bad utf-8")
        );
        assert_eq!(ExtractError::PrivateNetworkDenied.details(), None);
        assert_eq!(
            ExtractError::FetchTimeout(Duration::from_secs(1)).details(),
            None
        );
    }
}
