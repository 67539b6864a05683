//! Default HTTP fetcher
//!
//! Handles http and https URLs with reqwest. A client is built per call so
//! every fetch carries the configured connect and total timeouts.

use crate::error::FetchError;
use crate::fetchers::Fetcher;
use crate::options::FetchOptions;
use crate::types::{FetchResult, FetchedResource};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Default HTTP fetcher
///
/// - one GET per call, no retries
/// - redirects are followed by reqwest; the final URL is reported
/// - body read in full against the total-timeout deadline
pub struct HttpFetcher;

impl HttpFetcher {
    /// Create a new HTTP fetcher
    pub fn new() -> Self {
        Self
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult {
        let total_timeout = options.total_timeout();
        let deadline = Instant::now() + total_timeout;

        let mut headers = HeaderMap::new();
        if let Some(ua) = options.user_agent() {
            match HeaderValue::from_str(ua) {
                Ok(value) => {
                    headers.insert(USER_AGENT, value);
                }
                Err(_) => warn!(user_agent = ua, "Ignoring invalid User-Agent"),
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(options.connect_timeout())
            .timeout(total_timeout)
            .build()
            .map_err(FetchError::ClientBuild)?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, url, total_timeout))?;

        let status = response.status();
        let headers = response.headers().clone();

        let redirected = match wire_url(url) {
            Some(sent) => *response.url() != sent,
            None => response.url().as_str() != url,
        };

        if redirected {
            let final_url = response.url().to_string();
            // The body belongs to a different base URL; release it unread.
            debug!(url, final_url = %final_url, "Origin redirected");
            drop(response);
            return Ok(FetchedResource {
                status,
                headers,
                body: Bytes::new(),
                final_url,
            });
        }

        let body = read_body(response, url, total_timeout, deadline).await?;

        Ok(FetchedResource {
            status,
            headers,
            body,
            final_url: url.to_string(),
        })
    }
}

/// The URL as reqwest puts it on the wire
///
/// reqwest never sends the fragment and moves `user:pass@` into an
/// `Authorization` header, so `Response::url()` lacks both even when the
/// origin did not redirect.
fn wire_url(url: &str) -> Option<Url> {
    let mut sent = Url::parse(url).ok()?;
    sent.set_fragment(None);
    sent.set_username("").ok()?;
    sent.set_password(None).ok()?;
    Some(sent)
}

/// Read the whole response body, failing once the deadline passes
async fn read_body(
    response: reqwest::Response,
    url: &str,
    timeout: Duration,
    deadline: Instant,
) -> Result<Bytes, FetchError> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();

    loop {
        let chunk_future = stream.next();
        let timeout_future = tokio::time::sleep_until(deadline);

        tokio::select! {
            chunk = chunk_future => {
                match chunk {
                    Some(Ok(bytes)) => {
                        body.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) if e.is_timeout() => {
                        warn!(url, "Body transfer timed out");
                        return Err(FetchError::Timeout {
                            url: url.to_string(),
                            timeout,
                        });
                    }
                    Some(Err(e)) => {
                        warn!(url, error = %e, "Error reading body chunk");
                        return Err(FetchError::BodyRead {
                            url: url.to_string(),
                            timeout,
                            reason: e.to_string(),
                        });
                    }
                    None => {
                        return Ok(Bytes::from(body));
                    }
                }
            }
            _ = timeout_future => {
                warn!(url, received = body.len(), "Body deadline reached");
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout,
                });
            }
        }
    }
}
