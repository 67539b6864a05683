//! Page rendering for converted documents

use crate::types::Page;
use crate::VERSION;
use bytes::Bytes;

/// Turns a converted [`Page`] into the response body
pub trait Renderer: Send + Sync {
    fn render(&self, page: &Page) -> Bytes;
}

impl<F> Renderer for F
where
    F: Fn(&Page) -> Bytes + Send + Sync,
{
    fn render(&self, page: &Page) -> Bytes {
        self(page)
    }
}

/// Default page layout: title heading, gemtext body, link back to the origin
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, page: &Page) -> Bytes {
        let mut out = String::with_capacity(page.gemtext.len() + page.url.len() + 128);
        out.push_str("# ");
        out.push_str(page.title.trim());
        out.push_str("\n\n");
        if !page.gemtext.is_empty() {
            out.push_str(&page.gemtext);
            out.push_str("\n\n");
        }
        out.push_str(&format!("=> {} Original page\n", page.url));
        out.push_str(&format!("Proxied by Duckling v{}\n", VERSION));
        Bytes::from(out)
    }
}
