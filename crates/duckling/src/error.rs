//! Error types for Duckling

use std::time::Duration;
use thiserror::Error;

/// Transport-level failures while fetching from the origin
///
/// Every variant names the URL so operators can tell which origin failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Failed to build HTTP client
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// DNS, TCP or TLS handshake failure
    #[error("Could not connect to remote HTTP host: {url}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request or the body transfer exceeded the total timeout
    #[error("Download abandoned after {} seconds: {url}", .timeout.as_secs())]
    Timeout { url: String, timeout: Duration },

    /// The body stream broke off before completion
    #[error("Download abandoned after {} seconds: {url} ({reason})", .timeout.as_secs())]
    BodyRead {
        url: String,
        timeout: Duration,
        reason: String,
    },

    /// Anything else the HTTP client rejected (malformed response, bad URL)
    #[error("Remote host did not respond with valid HTTP: {url}")]
    InvalidResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Classify a reqwest error raised while sending a request
    pub fn from_reqwest(err: reqwest::Error, url: &str, timeout: Duration) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            FetchError::Timeout { url, timeout }
        } else if err.is_connect() {
            FetchError::Connect { url, source: err }
        } else {
            FetchError::InvalidResponse { url, source: err }
        }
    }
}

/// Failures of the HTML to gemtext conversion
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// Element nesting exceeded the converter's limit
    #[error("Document nesting exceeds {limit} levels")]
    TooDeep { limit: usize },

    /// Converter-specific failure
    #[error("Conversion failed: {0}")]
    Other(String),
}

/// Invalid option values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A counter that must start at one was zero
    #[error("{name} must be at least 1")]
    NotPositive { name: &'static str },

    /// A timeout of zero length
    #[error("{name} must be greater than zero")]
    ZeroTimeout { name: &'static str },
}

/// Malformed Gemini request line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Request line not terminated by CRLF
    #[error("Request line must end with CRLF")]
    MissingCrlf,

    /// Request URL longer than the protocol allows
    #[error("Request URL exceeds {limit} bytes")]
    TooLong { limit: usize },

    /// Request line is not UTF-8
    #[error("Request line is not valid UTF-8")]
    InvalidUtf8,

    /// Request line is not an absolute URL
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}
