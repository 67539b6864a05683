//! Immutable configuration records shared by every request
//!
//! Both records are built once at startup through their builders, which
//! validate numeric bounds, and are read concurrently afterwards.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default connect timeout (TCP + TLS handshake)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default total timeout (request, response and body transfer)
pub const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Controls how HTML is turned into gemtext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConversionOptionsBuilder")]
pub struct ConversionOptions {
    pretty_tables: bool,
    citation_start: usize,
    link_emit_frequency: usize,
    citation_markers: bool,
    numbered_links: bool,
    emit_images_as_links: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            pretty_tables: false,
            citation_start: 1,
            link_emit_frequency: 2,
            citation_markers: false,
            numbered_links: false,
            emit_images_as_links: true,
        }
    }
}

impl ConversionOptions {
    /// Create a builder seeded with the defaults
    pub fn builder() -> ConversionOptionsBuilder {
        ConversionOptionsBuilder::default()
    }

    /// Render tables as padded preformatted blocks
    pub fn pretty_tables(&self) -> bool {
        self.pretty_tables
    }

    /// First citation number
    pub fn citation_start(&self) -> usize {
        self.citation_start
    }

    /// Number of blocks after which gathered links are emitted
    pub fn link_emit_frequency(&self) -> usize {
        self.link_emit_frequency
    }

    /// Use footnote style citation markers (`^1`) instead of `[1]`
    pub fn citation_markers(&self) -> bool {
        self.citation_markers
    }

    /// Prefix link lines with their citation number
    pub fn numbered_links(&self) -> bool {
        self.numbered_links
    }

    /// Emit links to included images
    pub fn emit_images_as_links(&self) -> bool {
        self.emit_images_as_links
    }
}

/// Builder for [`ConversionOptions`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversionOptionsBuilder {
    pretty_tables: bool,
    citation_start: usize,
    link_emit_frequency: usize,
    citation_markers: bool,
    numbered_links: bool,
    emit_images_as_links: bool,
}

impl Default for ConversionOptionsBuilder {
    fn default() -> Self {
        let defaults = ConversionOptions::default();
        Self {
            pretty_tables: defaults.pretty_tables,
            citation_start: defaults.citation_start,
            link_emit_frequency: defaults.link_emit_frequency,
            citation_markers: defaults.citation_markers,
            numbered_links: defaults.numbered_links,
            emit_images_as_links: defaults.emit_images_as_links,
        }
    }
}

impl ConversionOptionsBuilder {
    pub fn pretty_tables(mut self, enable: bool) -> Self {
        self.pretty_tables = enable;
        self
    }

    pub fn citation_start(mut self, start: usize) -> Self {
        self.citation_start = start;
        self
    }

    pub fn link_emit_frequency(mut self, frequency: usize) -> Self {
        self.link_emit_frequency = frequency;
        self
    }

    pub fn citation_markers(mut self, enable: bool) -> Self {
        self.citation_markers = enable;
        self
    }

    pub fn numbered_links(mut self, enable: bool) -> Self {
        self.numbered_links = enable;
        self
    }

    pub fn emit_images_as_links(mut self, enable: bool) -> Self {
        self.emit_images_as_links = enable;
        self
    }

    /// Validate and freeze the options
    pub fn build(self) -> Result<ConversionOptions, ConfigError> {
        if self.citation_start == 0 {
            return Err(ConfigError::NotPositive {
                name: "citation_start",
            });
        }
        if self.link_emit_frequency == 0 {
            return Err(ConfigError::NotPositive {
                name: "link_emit_frequency",
            });
        }

        Ok(ConversionOptions {
            pretty_tables: self.pretty_tables,
            citation_start: self.citation_start,
            link_emit_frequency: self.link_emit_frequency,
            citation_markers: self.citation_markers,
            numbered_links: self.numbered_links,
            emit_images_as_links: self.emit_images_as_links,
        })
    }
}

impl TryFrom<ConversionOptionsBuilder> for ConversionOptions {
    type Error = ConfigError;

    fn try_from(builder: ConversionOptionsBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

/// Outbound fetch settings, one instance per running gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    user_agent: Option<String>,
    connect_timeout: Duration,
    total_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            total_timeout: DEFAULT_TOTAL_TIMEOUT,
        }
    }
}

impl FetchOptions {
    /// Create a builder seeded with the defaults
    pub fn builder() -> FetchOptionsBuilder {
        FetchOptionsBuilder::default()
    }

    /// User-Agent to send, if any. Empty agents are treated as unset.
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn total_timeout(&self) -> Duration {
        self.total_timeout
    }
}

/// Builder for [`FetchOptions`]
#[derive(Debug, Clone)]
pub struct FetchOptionsBuilder {
    user_agent: Option<String>,
    connect_timeout: Duration,
    total_timeout: Duration,
}

impl Default for FetchOptionsBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            total_timeout: DEFAULT_TOTAL_TIMEOUT,
        }
    }
}

impl FetchOptionsBuilder {
    /// Set the outbound User-Agent header
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = timeout;
        self
    }

    /// Validate and freeze the options
    pub fn build(self) -> Result<FetchOptions, ConfigError> {
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                name: "connect_timeout",
            });
        }
        if self.total_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                name: "total_timeout",
            });
        }

        Ok(FetchOptions {
            user_agent: self.user_agent.filter(|ua| !ua.is_empty()),
            connect_timeout: self.connect_timeout,
            total_timeout: self.total_timeout,
        })
    }
}
