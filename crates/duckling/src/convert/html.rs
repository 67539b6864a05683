//! Minimal HTML tokenizer shared by document preparation and conversion

/// Elements whose content is raw text up to the matching end tag
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements that never have an end tag
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// A start tag with its lowercased name and decoded attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub self_closing: bool,
}

impl Tag {
    /// Value of the first attribute called `name`
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// True for void elements and explicitly self-closed tags
    pub fn is_void(&self) -> bool {
        self.self_closing || VOID_ELEMENTS.contains(&self.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Start(Tag),
    End(String),
    /// Entity-decoded text
    Text(String),
}

/// Split HTML into start tags, end tags and decoded text
///
/// Comments, doctypes and processing instructions are dropped. Anything
/// that does not parse as a tag is kept as text.
pub(crate) fn tokenize(html: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = html;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("<!--") {
            rest = match after.find("-->") {
                Some(end) => &after[end + 3..],
                None => "",
            };
            continue;
        }

        let looks_like_tag = rest.starts_with('<')
            && rest[1..].starts_with(|c: char| {
                c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?'
            });

        if looks_like_tag {
            let Some(end) = rest.find('>') else {
                // No '>' anywhere ahead: nothing left can be a tag
                push_text(&mut tokens, decode_entities(rest));
                break;
            };
            let inner = &rest[1..end];
            rest = &rest[end + 1..];

            match parse_tag(inner) {
                Some(Token::Start(tag))
                    if !tag.self_closing && RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) =>
                {
                    let (text, remaining) = split_raw_text(rest, &tag.name);
                    let name = tag.name.clone();
                    tokens.push(Token::Start(tag));
                    if !text.is_empty() {
                        tokens.push(Token::Text(text.to_string()));
                    }
                    tokens.push(Token::End(name));
                    rest = remaining;
                }
                Some(token) => tokens.push(token),
                None => {}
            }
            continue;
        }

        // Text runs up to the next '<' (skipping a leading one that was not a tag)
        let skip = rest.chars().next().map(char::len_utf8).unwrap_or(0);
        let end = rest[skip..]
            .find('<')
            .map(|i| i + skip)
            .unwrap_or(rest.len());
        push_text(&mut tokens, decode_entities(&rest[..end]));
        rest = &rest[end..];
    }

    tokens
}

fn push_text(tokens: &mut Vec<Token>, text: String) {
    if let Some(Token::Text(prev)) = tokens.last_mut() {
        prev.push_str(&text);
    } else {
        tokens.push(Token::Text(text));
    }
}

/// Split raw element content at `</name`, returning (content, remainder after the end tag)
fn split_raw_text<'a>(rest: &'a str, name: &str) -> (&'a str, &'a str) {
    match find_end_tag(rest, name) {
        Some(pos) => {
            let after = rest[pos..]
                .find('>')
                .map(|gt| pos + gt + 1)
                .unwrap_or(rest.len());
            (&rest[..pos], &rest[after..])
        }
        None => (rest, ""),
    }
}

/// Byte offset of the first `</name`, matching the name case-insensitively
fn find_end_tag(haystack: &str, name: &str) -> Option<usize> {
    let name = name.as_bytes();
    let mut from = 0;

    while let Some(offset) = haystack[from..].find("</") {
        let start = from + offset;
        let candidate = &haystack.as_bytes()[start + 2..];
        if candidate.len() >= name.len() && candidate[..name.len()].eq_ignore_ascii_case(name) {
            return Some(start);
        }
        from = start + 2;
    }

    None
}

fn parse_tag(inner: &str) -> Option<Token> {
    if inner.starts_with('!') || inner.starts_with('?') {
        return None;
    }

    if let Some(closing) = inner.strip_prefix('/') {
        let name = tag_name(closing);
        return (!name.is_empty()).then_some(Token::End(name));
    }

    let name = tag_name(inner);
    if name.is_empty() {
        return None;
    }

    let raw_attrs = &inner[name.len()..];
    Some(Token::Start(Tag {
        name,
        attrs: parse_attributes(raw_attrs),
        self_closing: inner.trim_end().ends_with('/'),
    }))
}

fn tag_name(s: &str) -> String {
    s.chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ':')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Parse `name="value" name='value' name=value name` sequences
fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    let mut rest = raw;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');
        if rest.is_empty() {
            break;
        }

        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            match after_eq.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let body = &after_eq[1..];
                    let end = body.find(quote).unwrap_or(body.len());
                    rest = body.get(end + 1..).unwrap_or("");
                    &body[..end]
                }
                _ => {
                    let end = after_eq
                        .find(char::is_whitespace)
                        .unwrap_or(after_eq.len());
                    rest = &after_eq[end..];
                    &after_eq[..end]
                }
            }
        } else {
            ""
        };

        if !name.is_empty() {
            attrs.push((name, decode_entities(value)));
        }
    }

    attrs
}

/// Decode named and numeric character references
/// Longest entity name looked up between `&` and `;`
const MAX_ENTITY_LEN: usize = 10;

pub(crate) fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp + 1..];

        let decoded = candidate
            .bytes()
            .take(MAX_ENTITY_LEN + 1)
            .position(|b| b == b';')
            .filter(|&semi| semi > 0)
            .and_then(|semi| decode_entity(&candidate[..semi]).map(|ch| (ch, semi)));

        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &candidate[semi + 1..];
            }
            None => {
                out.push('&');
                rest = candidate;
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    let ch = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            return char::from_u32(code);
        }
    };
    Some(ch)
}

/// Escape text for re-serialisation
pub(crate) fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Serialise a start tag with double-quoted attributes
pub(crate) fn start_tag_html(tag: &Tag) -> String {
    let mut html = format!("<{}", tag.name);
    for (name, value) in &tag.attrs {
        html.push(' ');
        html.push_str(name);
        html.push_str("=\"");
        html.push_str(&escape_text(value).replace('"', "&quot;"));
        html.push('"');
    }
    if tag.self_closing {
        html.push_str(" /");
    }
    html.push('>');
    html
}
