//! Document preparation: title extraction and removal of non-content markup

use super::html::{escape_text, start_tag_html, tokenize, Token};

/// Subtrees that never contribute readable content
const REMOVED_ELEMENTS: &[&str] = &[
    "head", "script", "style", "noscript", "iframe", "svg", "template", "nav", "form",
];

/// Wrapper elements dropped while their children are kept
const UNWRAPPED_ELEMENTS: &[&str] = &["html", "body"];

/// A document ready for conversion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedDocument {
    pub title: String,
    pub html: String,
}

/// Extract the title and strip non-content markup from a fetched page
///
/// The title comes from `<title>`, else the first `<h1>`, else the URL.
pub fn prepare_document(url: &str, html: &str) -> PreparedDocument {
    let tokens = tokenize(html);

    let title = element_text(&tokens, "title")
        .or_else(|| element_text(&tokens, "h1"))
        .unwrap_or_else(|| url.to_string());

    let mut cleaned = String::with_capacity(html.len());
    let mut removed: Vec<&str> = Vec::new();

    for token in &tokens {
        match token {
            Token::Start(tag) if REMOVED_ELEMENTS.contains(&tag.name.as_str()) => {
                if !tag.is_void() {
                    removed.push(tag.name.as_str());
                }
            }
            Token::End(name) if removed.last() == Some(&name.as_str()) => {
                removed.pop();
            }
            _ if !removed.is_empty() => {}
            Token::Start(tag) if UNWRAPPED_ELEMENTS.contains(&tag.name.as_str()) => {}
            Token::End(name) if UNWRAPPED_ELEMENTS.contains(&name.as_str()) => {}
            Token::Start(tag) => cleaned.push_str(&start_tag_html(tag)),
            Token::End(name) => {
                cleaned.push_str("</");
                cleaned.push_str(name);
                cleaned.push('>');
            }
            Token::Text(text) => cleaned.push_str(&escape_text(text)),
        }
    }

    PreparedDocument {
        title,
        html: cleaned.trim().to_string(),
    }
}

/// Whitespace-collapsed text of the first `name` element, if non-empty
fn element_text(tokens: &[Token], name: &str) -> Option<String> {
    let start = tokens
        .iter()
        .position(|t| matches!(t, Token::Start(tag) if tag.name == name))?;

    let mut text = String::new();
    for token in &tokens[start + 1..] {
        match token {
            Token::End(end) if end == name => break,
            Token::Text(t) => {
                text.push_str(t);
                text.push(' ');
            }
            _ => {}
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}
