//! Core types for Duckling

use crate::error::FetchError;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;

/// Resource returned by the origin for one request
#[derive(Debug, Clone)]
pub struct FetchedResource {
    /// HTTP status of the final response
    pub status: StatusCode,
    /// Response headers of the final response
    pub headers: HeaderMap,
    /// Full body. Empty when the origin redirected elsewhere.
    pub body: Bytes,
    /// URL after any redirects the HTTP client followed
    pub final_url: String,
}

impl FetchedResource {
    /// Content-Type header verbatim, or an empty string when absent
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    /// Status line text, e.g. `404 Not Found`
    pub fn status_text(&self) -> String {
        match self.status.canonical_reason() {
            Some(reason) => format!("{} {}", self.status.as_u16(), reason),
            None => self.status.as_u16().to_string(),
        }
    }
}

/// Outcome of one fetch. Transport errors occupy the `Err` arm.
pub type FetchResult = Result<FetchedResource, FetchError>;

/// Result of handling one proxy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// Non-HTML content passed through untouched
    Content { content_type: String, body: Bytes },
    /// HTML converted to gemtext
    ConvertedPage {
        title: String,
        url: String,
        gemtext: String,
    },
    /// The origin redirected; the client must re-request the new location
    Redirect { location: String },
    /// The origin answered 404
    NotFound,
    /// Transport failure or non-200/404 origin status
    UpstreamFailure { message: String },
    /// Request scheme is not http or https
    UnsupportedScheme { scheme: String },
    /// Content was fetched but could not be converted
    ConversionFailure,
}

impl GatewayOutcome {
    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayOutcome::Content { .. } => "content",
            GatewayOutcome::ConvertedPage { .. } => "converted_page",
            GatewayOutcome::Redirect { .. } => "redirect",
            GatewayOutcome::NotFound => "not_found",
            GatewayOutcome::UpstreamFailure { .. } => "upstream_failure",
            GatewayOutcome::UnsupportedScheme { .. } => "unsupported_scheme",
            GatewayOutcome::ConversionFailure => "conversion_failure",
        }
    }
}

/// A converted page handed to the [`Renderer`](crate::render::Renderer)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    pub url: String,
    pub gemtext: String,
}
