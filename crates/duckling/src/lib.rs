//! Duckling - Gemini proxy for the HTTP web
//!
//! This crate implements the request pipeline of an HTTP-to-Gemini proxy:
//! Gemini clients ask for `http://` or `https://` URLs, the gateway fetches
//! them and either converts HTML to gemtext or passes the bytes through.
//!
//! ## Pipeline
//!
//! 1. [`Gateway::handle`] rejects schemes other than http and https
//! 2. a [`Fetcher`] performs one bounded-time GET ([`HttpFetcher`] by default)
//! 3. [`route`] classifies the result into a [`GatewayOutcome`]
//! 4. converted pages go through a [`Renderer`] ([`TemplateRenderer`] by default)
//! 5. the outcome becomes a [`GeminiResponse`]
//!
//! Conversion is pluggable through the [`Converter`] trait; the built-in
//! [`GemtextConverter`] covers headings, lists, quotes, preformatted text,
//! tables, links and images.

pub mod client;
pub mod convert;
mod error;
pub mod fetchers;
pub mod gemini;
mod handler;
mod options;
pub mod render;
mod router;
mod types;

pub use client::{fetch, fetch_with_options};
pub use convert::{html_to_gemtext, prepare_document, Converter, GemtextConverter, PreparedDocument};
pub use error::{ConfigError, ConvertError, FetchError, RequestError};
pub use fetchers::{Fetcher, HttpFetcher};
pub use gemini::{GeminiRequest, GeminiResponse, Status};
pub use handler::{Gateway, GatewayBuilder, CONVERSION_FAILURE_MESSAGE};
pub use options::{
    ConversionOptions, ConversionOptionsBuilder, FetchOptions, FetchOptionsBuilder,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_TOTAL_TIMEOUT,
};
pub use render::{Renderer, TemplateRenderer};
pub use router::{route, HTML_MARKER};
pub use types::{FetchResult, FetchedResource, GatewayOutcome, Page};

/// Crate version, shown in rendered pages and `--version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
