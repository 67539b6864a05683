//! HTML preparation and gemtext conversion
//!
//! The gateway only depends on the [`Converter`] trait; [`GemtextConverter`]
//! is the built-in implementation.

mod gemtext;
mod html;
mod prepare;

pub use gemtext::{filter_excessive_newlines, html_to_gemtext, MAX_DEPTH};
pub use prepare::{prepare_document, PreparedDocument};

use crate::error::ConvertError;
use crate::options::ConversionOptions;

/// Turns fetched HTML into gemtext
pub trait Converter: Send + Sync {
    /// Extract the title and clean the document before conversion
    fn prepare(&self, url: &str, html: &str) -> PreparedDocument {
        prepare_document(url, html)
    }

    /// Convert prepared HTML to gemtext
    fn convert(&self, html: &str, options: &ConversionOptions) -> Result<String, ConvertError>;
}

/// Built-in converter
#[derive(Debug, Clone, Copy, Default)]
pub struct GemtextConverter;

impl GemtextConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Converter for GemtextConverter {
    fn convert(&self, html: &str, options: &ConversionOptions) -> Result<String, ConvertError> {
        html_to_gemtext(html, options)
    }
}
