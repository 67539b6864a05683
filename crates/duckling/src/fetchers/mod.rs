//! Fetcher system for origin requests
//!
//! Design: the gateway talks to origins only through the [`Fetcher`] trait,
//! so tests and embedders can substitute the network.

mod http;

pub use http::HttpFetcher;

use crate::options::FetchOptions;
use crate::types::FetchResult;
use async_trait::async_trait;

/// Trait for origin fetchers
///
/// A fetcher issues exactly one GET for the URL, bounded by the timeouts
/// in `options`, and reports either the final response or a transport
/// error. It never retries.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Unique identifier for this fetcher (for logging/debugging)
    fn name(&self) -> &'static str;

    /// Fetch the URL
    ///
    /// When the HTTP client followed redirects, `final_url` differs from
    /// `url` and the body is left empty.
    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult;
}
