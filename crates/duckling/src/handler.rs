//! Request handler: scheme check, fetch, route, render
//!
//! [`Gateway`] is the single entry point invoked per inbound request. It is
//! immutable after [`GatewayBuilder::build`] and shared across connections.

use crate::convert::{Converter, GemtextConverter};
use crate::fetchers::{Fetcher, HttpFetcher};
use crate::gemini::{GeminiResponse, Status, GEMTEXT_MIME};
use crate::options::{ConversionOptions, FetchOptions};
use crate::render::{Renderer, TemplateRenderer};
use crate::router::route;
use crate::types::{GatewayOutcome, Page};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Meta text for conversion failures
pub const CONVERSION_FAILURE_MESSAGE: &str = "HTML to GMI conversion failure";

/// Builder for configuring the gateway
pub struct GatewayBuilder {
    fetch_options: FetchOptions,
    conversion_options: ConversionOptions,
    filter_markup: bool,
    fetcher: Arc<dyn Fetcher>,
    converter: Arc<dyn Converter>,
    renderer: Arc<dyn Renderer>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    /// Create a builder with default options and the built-in collaborators
    pub fn new() -> Self {
        Self {
            fetch_options: FetchOptions::default(),
            conversion_options: ConversionOptions::default(),
            filter_markup: true,
            fetcher: Arc::new(HttpFetcher::new()),
            converter: Arc::new(GemtextConverter::new()),
            renderer: Arc::new(TemplateRenderer::new()),
        }
    }

    pub fn fetch_options(mut self, options: FetchOptions) -> Self {
        self.fetch_options = options;
        self
    }

    pub fn conversion_options(mut self, options: ConversionOptions) -> Self {
        self.conversion_options = options;
        self
    }

    /// Convert `text/html` responses (on by default)
    pub fn filter_markup(mut self, enable: bool) -> Self {
        self.filter_markup = enable;
        self
    }

    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    pub fn converter(mut self, converter: impl Converter + 'static) -> Self {
        self.converter = Arc::new(converter);
        self
    }

    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Build the gateway
    pub fn build(self) -> Gateway {
        Gateway {
            fetch_options: self.fetch_options,
            conversion_options: self.conversion_options,
            filter_markup: self.filter_markup,
            fetcher: self.fetcher,
            converter: self.converter,
            renderer: self.renderer,
        }
    }
}

/// Configured gateway
#[derive(Clone)]
pub struct Gateway {
    fetch_options: FetchOptions,
    conversion_options: ConversionOptions,
    filter_markup: bool,
    fetcher: Arc<dyn Fetcher>,
    converter: Arc<dyn Converter>,
    renderer: Arc<dyn Renderer>,
}

impl Default for Gateway {
    fn default() -> Self {
        GatewayBuilder::new().build()
    }
}

impl Gateway {
    /// Create a new gateway builder
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn fetch_options(&self) -> &FetchOptions {
        &self.fetch_options
    }

    pub fn conversion_options(&self) -> &ConversionOptions {
        &self.conversion_options
    }

    pub fn filter_markup(&self) -> bool {
        self.filter_markup
    }

    /// Handle one proxy request and produce the response to write
    pub async fn handle(&self, url: &Url) -> GeminiResponse {
        let outcome = self.outcome(url).await;
        debug!(url = %url, outcome = outcome.kind(), "Request handled");
        self.respond(outcome)
    }

    /// Run the pipeline up to the outcome, without rendering
    pub async fn outcome(&self, url: &Url) -> GatewayOutcome {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            info!(url = %url, scheme, "Scheme not supported");
            return GatewayOutcome::UnsupportedScheme {
                scheme: scheme.to_string(),
            };
        }

        info!(url = %url, fetcher = self.fetcher.name(), "Retrieve");

        let result = self.fetcher.fetch(url.as_str(), &self.fetch_options).await;

        // Routing may convert a whole page, so it runs on the blocking pool
        let target = url.as_str().to_string();
        let options = self.conversion_options.clone();
        let filter_markup = self.filter_markup;
        let converter = Arc::clone(&self.converter);
        let routed = tokio::task::spawn_blocking(move || {
            route(&target, &result, &options, filter_markup, converter.as_ref())
        })
        .await;

        match routed {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(url = %url, error = %e, "Routing task failed");
                GatewayOutcome::ConversionFailure
            }
        }
    }

    /// Map an outcome to its Gemini status, meta and body
    pub fn respond(&self, outcome: GatewayOutcome) -> GeminiResponse {
        match outcome {
            GatewayOutcome::UnsupportedScheme { scheme } => GeminiResponse::new(
                Status::ProxyRequestRefused,
                format!("Scheme not supported: {}", scheme),
            ),
            GatewayOutcome::UpstreamFailure { message } => {
                GeminiResponse::new(Status::ProxyError, message)
            }
            GatewayOutcome::Redirect { location } => {
                GeminiResponse::new(Status::Redirect, location)
            }
            GatewayOutcome::NotFound => GeminiResponse::new(Status::NotFound, "Not found"),
            GatewayOutcome::ConversionFailure => {
                GeminiResponse::new(Status::CgiError, CONVERSION_FAILURE_MESSAGE)
            }
            GatewayOutcome::Content { content_type, body } => {
                GeminiResponse::success(content_type, body)
            }
            GatewayOutcome::ConvertedPage {
                title,
                url,
                gemtext,
            } => {
                let page = Page {
                    title,
                    url,
                    gemtext,
                };
                GeminiResponse::success(GEMTEXT_MIME, self.renderer.render(&page))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::types::{FetchResult, FetchedResource};
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fetcher that serves a canned response and counts calls
    struct StubFetcher {
        calls: Arc<AtomicUsize>,
        status: u16,
        content_type: &'static str,
        body: &'static str,
        redirect_to: Option<&'static str>,
        timeout: bool,
    }

    impl StubFetcher {
        fn new(status: u16, content_type: &'static str, body: &'static str) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                status,
                content_type,
                body,
                redirect_to: None,
                timeout: false,
            }
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.timeout {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    timeout: options.total_timeout(),
                });
            }
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
            Ok(FetchedResource {
                status: StatusCode::from_u16(self.status).unwrap(),
                headers,
                body: Bytes::from_static(self.body.as_bytes()),
                final_url: match self.redirect_to {
                    Some(location) => location.to_string(),
                    None => url.to_string(),
                },
            })
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_scheme_never_fetches() {
        let stub = StubFetcher::new(200, "text/plain", "x");
        let calls = stub.calls.clone();
        let gateway = Gateway::builder().fetcher(stub).build();

        for target in ["ftp://example.org/file", "gemini://example.org/", "gopher://example.org/"] {
            let resp = gateway.handle(&url(target)).await;
            assert_eq!(resp.status, Status::ProxyRequestRefused);
            assert!(resp.meta.starts_with("Scheme not supported: "));
            assert!(resp.body.is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let outcome = gateway.outcome(&url("ftp://example.org/file")).await;
        assert_eq!(
            outcome,
            GatewayOutcome::UnsupportedScheme {
                scheme: "ftp".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_converted_page_is_rendered() {
        let gateway = Gateway::builder()
            .fetcher(StubFetcher::new(200, "text/html; charset=utf-8", "<h1>Hi</h1>"))
            .build();

        let resp = gateway.handle(&url("http://example.org/index.html")).await;
        assert_eq!(resp.status, Status::Success);
        assert_eq!(resp.meta, "text/gemini");
        let body = String::from_utf8(resp.body.unwrap().to_vec()).unwrap();
        assert!(body.contains("# Hi"));
        assert!(body.contains("=> http://example.org/index.html Original page"));
    }

    #[tokio::test]
    async fn test_injected_renderer() {
        let gateway = Gateway::builder()
            .fetcher(StubFetcher::new(200, "text/html", "<p>Body</p>"))
            .renderer(|page: &Page| Bytes::from(format!("{}|{}", page.url, page.gemtext)))
            .build();

        let resp = gateway.handle(&url("https://example.org/")).await;
        assert_eq!(resp.body, Some(Bytes::from("https://example.org/|Body")));
    }

    #[tokio::test]
    async fn test_unfiltered_gateway_passes_html() {
        let gateway = Gateway::builder()
            .fetcher(StubFetcher::new(200, "text/html", "<p>Body</p>"))
            .filter_markup(false)
            .build();

        let resp = gateway.handle(&url("https://example.org/")).await;
        assert_eq!(resp.status, Status::Success);
        assert_eq!(resp.meta, "text/html");
        assert_eq!(resp.body, Some(Bytes::from_static(b"<p>Body</p>")));
    }

    #[tokio::test]
    async fn test_redirect_has_no_body() {
        let mut stub = StubFetcher::new(200, "text/html", "<p>new</p>");
        stub.redirect_to = Some("http://example.org/new");
        let gateway = Gateway::builder().fetcher(stub).build();

        let resp = gateway.handle(&url("http://example.org/old")).await;
        assert_eq!(resp.status, Status::Redirect);
        assert_eq!(resp.meta, "http://example.org/new");
        assert!(resp.body.is_none());
    }

    #[tokio::test]
    async fn test_timeout_names_configured_duration() {
        let mut stub = StubFetcher::new(200, "text/plain", "");
        stub.timeout = true;
        let gateway = Gateway::builder()
            .fetcher(stub)
            .fetch_options(
                FetchOptions::builder()
                    .total_timeout(Duration::from_secs(3))
                    .build()
                    .unwrap(),
            )
            .build();

        let resp = gateway.handle(&url("http://example.org/slow")).await;
        assert_eq!(resp.status, Status::ProxyError);
        assert_eq!(
            resp.meta,
            "Download abandoned after 3 seconds: http://example.org/slow"
        );
    }

    struct PanickingConverter;

    impl Converter for PanickingConverter {
        fn convert(
            &self,
            _html: &str,
            _options: &ConversionOptions,
        ) -> Result<String, crate::error::ConvertError> {
            panic!("converter bug");
        }
    }

    #[tokio::test]
    async fn test_converter_panic_is_conversion_failure() {
        let gateway = Gateway::builder()
            .fetcher(StubFetcher::new(200, "text/html", "<p>Body</p>"))
            .converter(PanickingConverter)
            .build();

        let resp = gateway.handle(&url("http://example.org/")).await;
        assert_eq!(resp.status, Status::CgiError);
        assert_eq!(resp.meta, CONVERSION_FAILURE_MESSAGE);
    }

    #[test]
    fn test_outcome_mapping() {
        let gateway = Gateway::default();

        let resp = gateway.respond(GatewayOutcome::NotFound);
        assert_eq!((resp.status, resp.meta.as_str()), (Status::NotFound, "Not found"));

        let resp = gateway.respond(GatewayOutcome::ConversionFailure);
        assert_eq!(resp.status, Status::CgiError);
        assert_eq!(resp.meta, CONVERSION_FAILURE_MESSAGE);
        assert!(resp.body.is_none());

        let resp = gateway.respond(GatewayOutcome::UpstreamFailure {
            message: "Failure: HTTP status: 500 Internal Server Error".to_string(),
        });
        assert_eq!(resp.status, Status::ProxyError);
        assert_eq!(resp.meta, "Failure: HTTP status: 500 Internal Server Error");

        let resp = gateway.respond(GatewayOutcome::Content {
            content_type: String::new(),
            body: Bytes::from_static(b"raw"),
        });
        assert_eq!(resp.status, Status::Success);
        assert_eq!(resp.meta, "");
        assert_eq!(resp.header_bytes(), b"20 \r\n");
    }
}
