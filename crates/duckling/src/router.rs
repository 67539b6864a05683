//! Content routing: classify a fetch result into a [`GatewayOutcome`]

use crate::convert::Converter;
use crate::options::ConversionOptions;
use crate::types::{FetchResult, GatewayOutcome};
use reqwest::StatusCode;
use tracing::{info, warn};

/// Content-Type token that marks convertible markup
pub const HTML_MARKER: &str = "text/html";

/// Decide what the client receives for one fetch result
///
/// Transport errors win over everything, then redirects (detected by the
/// final URL, never by status code), then the origin status.
pub fn route(
    url: &str,
    result: &FetchResult,
    options: &ConversionOptions,
    filter_markup: bool,
    converter: &dyn Converter,
) -> GatewayOutcome {
    let resource = match result {
        Ok(resource) => resource,
        Err(err) => {
            return GatewayOutcome::UpstreamFailure {
                message: err.to_string(),
            }
        }
    };

    if resource.final_url != url {
        info!(url, location = %resource.final_url, "Redirected");
        return GatewayOutcome::Redirect {
            location: resource.final_url.clone(),
        };
    }

    match resource.status {
        StatusCode::OK => {
            let content_type = resource.content_type();
            info!(url, content_type, "Content-Type");

            if filter_markup && content_type.contains(HTML_MARKER) {
                info!(url, "Converting to text/gemini");
                let html = String::from_utf8_lossy(&resource.body);
                let doc = converter.prepare(url, &html);

                match converter.convert(&doc.html, options) {
                    Ok(gemtext) => GatewayOutcome::ConvertedPage {
                        title: doc.title,
                        url: url.to_string(),
                        gemtext,
                    },
                    Err(err) => {
                        warn!(url, error = %err, "HTML to gemtext conversion failed");
                        GatewayOutcome::ConversionFailure
                    }
                }
            } else {
                GatewayOutcome::Content {
                    content_type: content_type.to_string(),
                    body: resource.body.clone(),
                }
            }
        }
        StatusCode::NOT_FOUND => GatewayOutcome::NotFound,
        _ => GatewayOutcome::UpstreamFailure {
            message: format!("Failure: HTTP status: {}", resource.status_text()),
        },
    }
}
