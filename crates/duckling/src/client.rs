//! HTTP client entry points for Duckling
//!
//! Thin wrappers over the default [`HttpFetcher`](crate::fetchers::HttpFetcher)
//! for callers that do not need a full [`Gateway`](crate::Gateway).

use crate::fetchers::{Fetcher, HttpFetcher};
use crate::options::FetchOptions;
use crate::types::FetchResult;

/// Fetch a URL with the default timeouts and no User-Agent
pub async fn fetch(url: &str) -> FetchResult {
    fetch_with_options(url, &FetchOptions::default()).await
}

/// Fetch a URL with custom options
pub async fn fetch_with_options(url: &str, options: &FetchOptions) -> FetchResult {
    HttpFetcher::new().fetch(url, options).await
}
