//! Gemini request and response framing
//!
//! A request is a single absolute URL terminated by CRLF. A response is a
//! `<status> <meta>\r\n` header optionally followed by a body.

use crate::error::RequestError;
use bytes::Bytes;
use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

/// Maximum request URL length in bytes
pub const MAX_REQUEST_URL_BYTES: usize = 1024;

/// Maximum length of the response meta field in bytes
pub const MAX_META_BYTES: usize = 1024;

/// MIME type of converted pages
pub const GEMTEXT_MIME: &str = "text/gemini";

/// Gemini status codes used by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Redirect,
    CgiError,
    ProxyError,
    NotFound,
    ProxyRequestRefused,
    BadRequest,
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Success => 20,
            Status::Redirect => 30,
            Status::CgiError => 42,
            Status::ProxyError => 43,
            Status::NotFound => 51,
            Status::ProxyRequestRefused => 53,
            Status::BadRequest => 59,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A parsed proxy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiRequest {
    pub url: Url,
}

impl GeminiRequest {
    /// Parse a raw request line including its trailing CRLF
    pub fn parse(line: &[u8]) -> Result<Self, RequestError> {
        let line = line
            .strip_suffix(b"\r\n")
            .ok_or(RequestError::MissingCrlf)?;

        if line.len() > MAX_REQUEST_URL_BYTES {
            return Err(RequestError::TooLong {
                limit: MAX_REQUEST_URL_BYTES,
            });
        }

        let text = std::str::from_utf8(line).map_err(|_| RequestError::InvalidUtf8)?;
        let url = Url::parse(text).map_err(|e| RequestError::InvalidUrl(e.to_string()))?;

        Ok(Self { url })
    }
}

/// A response ready to be written to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiResponse {
    pub status: Status,
    pub meta: String,
    pub body: Option<Bytes>,
}

impl GeminiResponse {
    /// Header-only response
    pub fn new(status: Status, meta: impl Into<String>) -> Self {
        Self {
            status,
            meta: sanitize_meta(&meta.into()),
            body: None,
        }
    }

    /// Success response carrying a body
    pub fn success(mime: impl Into<String>, body: Bytes) -> Self {
        Self {
            status: Status::Success,
            meta: sanitize_meta(&mime.into()),
            body: Some(body),
        }
    }

    /// Response for a request line that could not be parsed
    pub fn bad_request(err: &RequestError) -> Self {
        Self::new(Status::BadRequest, err.to_string())
    }

    /// Serialised `<status> <meta>\r\n` header
    pub fn header_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.status, self.meta).into_bytes()
    }

    /// Write header and body as one sequence
    pub async fn write_to<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.header_bytes()).await?;
        if let Some(body) = &self.body {
            writer.write_all(body).await?;
        }
        writer.flush().await
    }
}

/// Strip line breaks and clamp to the protocol's meta limit
fn sanitize_meta(meta: &str) -> String {
    let mut clean: String = meta.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    if clean.len() > MAX_META_BYTES {
        let mut end = MAX_META_BYTES;
        while !clean.is_char_boundary(end) {
            end -= 1;
        }
        clean.truncate(end);
    }
    clean
}
