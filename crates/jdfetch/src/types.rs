//! Core types for jdfetch

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};

/// Text and metadata pulled out of a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    /// Visible body text, whitespace-collapsed
    pub text: String,
    /// Page title
    pub title: String,
    /// Site or hiring company name
    pub company: String,
}

/// Successful response payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractResponse {
    /// Extracted text, at most the configured maximum length
    pub text: String,
    /// Page title
    pub title: String,
    /// Site or hiring company name
    pub company: String,
    /// The URL exactly as supplied by the caller
    pub url: String,
}

/// Error response payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error
    pub error: String,

    /// Underlying message for generic extraction failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&ExtractError> for ErrorBody {
    fn from(err: &ExtractError) -> Self {
        Self {
            error: err.to_string(),
            details: err.details().map(str::to_string),
        }
    }
}
