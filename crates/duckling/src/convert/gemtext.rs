//! HTML to gemtext conversion
//!
//! Gemtext has no inline links, so anchors and images leave a citation
//! marker in the running text and are gathered into `=>` link lines. The
//! gathered lines are emitted after every `link_emit_frequency` blocks and
//! at the end of the document.

use super::html::{tokenize, Tag, Token};
use crate::error::ConvertError;
use crate::options::ConversionOptions;

/// Maximum element nesting accepted by the converter
pub const MAX_DEPTH: usize = 512;

/// Subtrees skipped entirely
const SKIP_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "template", "head",
];

/// Elements that start and end a block of text
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "aside", "address", "ul",
    "ol", "dl", "dt", "dd", "figure", "figcaption", "details", "summary", "center",
];

/// Elements implicitly closed by a sibling of the same name
const SELF_NESTING_CLOSERS: &[&str] = &["p", "li", "dt", "dd", "tr", "td", "th", "option"];

/// Convert HTML to gemtext
pub fn html_to_gemtext(html: &str, options: &ConversionOptions) -> Result<String, ConvertError> {
    let mut writer = GemtextWriter::new(options);
    for token in tokenize(html) {
        writer.token(token)?;
    }
    Ok(writer.finish())
}

#[derive(Debug)]
struct GatheredLink {
    citation: usize,
    href: String,
    label: String,
}

#[derive(Debug)]
struct OpenLink {
    href: Option<String>,
    text: String,
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Vec<String>>,
    row: Option<Vec<String>>,
    cell: Option<String>,
}

impl Table {
    fn finish_cell(&mut self) {
        if let Some(cell) = self.cell.take() {
            self.row.get_or_insert_with(Vec::new).push(cell.trim().to_string());
        }
    }

    fn finish_row(&mut self) {
        self.finish_cell();
        if let Some(row) = self.row.take() {
            if row.iter().any(|c| !c.is_empty()) {
                self.rows.push(row);
            }
        }
    }
}

struct GemtextWriter<'o> {
    options: &'o ConversionOptions,
    out: String,
    line: String,
    open: Vec<String>,
    skip: Vec<String>,
    links: Vec<GatheredLink>,
    anchors: Vec<OpenLink>,
    next_citation: usize,
    blocks_since_links: usize,
    heading: Option<usize>,
    list_items: usize,
    quotes: usize,
    pre: Option<String>,
    pre_depth: usize,
    /// Open tables, innermost last
    tables: Vec<Table>,
}

impl<'o> GemtextWriter<'o> {
    fn new(options: &'o ConversionOptions) -> Self {
        Self {
            options,
            out: String::new(),
            line: String::new(),
            open: Vec::new(),
            skip: Vec::new(),
            links: Vec::new(),
            anchors: Vec::new(),
            next_citation: options.citation_start(),
            blocks_since_links: 0,
            heading: None,
            list_items: 0,
            quotes: 0,
            pre: None,
            pre_depth: 0,
            tables: Vec::new(),
        }
    }

    fn token(&mut self, token: Token) -> Result<(), ConvertError> {
        match token {
            Token::Start(tag) => self.start(tag),
            Token::End(name) => {
                self.end(&name);
                Ok(())
            }
            Token::Text(text) => {
                self.text(&text);
                Ok(())
            }
        }
    }

    fn start(&mut self, tag: Tag) -> Result<(), ConvertError> {
        let name = tag.name.as_str();

        if !self.skip.is_empty() || SKIP_ELEMENTS.contains(&name) {
            if !tag.is_void() {
                self.skip.push(tag.name.clone());
            }
            return Ok(());
        }

        if SELF_NESTING_CLOSERS.contains(&name)
            && self.open.last().map(String::as_str) == Some(name)
        {
            self.end(name);
        }

        if !tag.is_void() {
            if self.open.len() >= MAX_DEPTH {
                return Err(ConvertError::TooDeep { limit: MAX_DEPTH });
            }
            self.open.push(tag.name.clone());
        }

        if self.pre.is_some() {
            if name == "pre" && !tag.is_void() {
                self.pre_depth += 1;
            } else if name == "br" {
                self.text("\n");
            }
            return Ok(());
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush_block();
                let level = name[1..].parse::<usize>().unwrap_or(1).min(3);
                self.heading = Some(level);
            }
            "li" => {
                self.flush_block();
                self.list_items += 1;
            }
            "blockquote" => {
                self.flush_block();
                self.quotes += 1;
            }
            "pre" if !tag.is_void() => {
                self.flush_block();
                self.pre = Some(String::new());
                self.pre_depth = 1;
            }
            "br" => {
                self.flush_line();
            }
            "hr" => {
                self.flush_block();
                self.write_line("---");
                self.out.push('\n');
            }
            "table" => {
                if self.tables.is_empty() {
                    self.flush_block();
                }
                self.tables.push(Table::default());
            }
            "tr" => {
                if let Some(table) = self.tables.last_mut() {
                    table.finish_row();
                    table.row = Some(Vec::new());
                }
            }
            "td" | "th" => {
                if let Some(table) = self.tables.last_mut() {
                    table.finish_cell();
                    table.cell = Some(String::new());
                }
            }
            "a" => {
                let href = tag
                    .attr("href")
                    .map(str::trim)
                    .filter(|h| is_followable(h))
                    .map(str::to_string);
                self.anchors.push(OpenLink {
                    href,
                    text: String::new(),
                });
            }
            "img" => {
                if self.options.emit_images_as_links() {
                    if let Some(src) = tag.attr("src").map(str::trim).filter(|s| !s.is_empty()) {
                        let alt = tag.attr("alt").map(str::trim).unwrap_or("");
                        let label = if alt.is_empty() {
                            "[IMG]".to_string()
                        } else {
                            format!("[IMG] {}", alt)
                        };
                        self.cite(src.to_string(), label);
                    }
                }
            }
            _ if BLOCK_ELEMENTS.contains(&name) => self.flush_block(),
            _ => {}
        }

        Ok(())
    }

    fn end(&mut self, name: &str) {
        if !self.skip.is_empty() {
            if self.skip.last().map(String::as_str) == Some(name) {
                self.skip.pop();
            }
            return;
        }

        // Close everything opened since the matching start tag
        match self.open.iter().rposition(|n| n == name) {
            Some(pos) => {
                for unclosed in self.open.split_off(pos).into_iter().skip(1).rev() {
                    self.close(&unclosed);
                }
            }
            None => return,
        }
        self.close(name);
    }

    fn close(&mut self, name: &str) {
        if let Some(pre) = self.pre.as_mut() {
            if name != "pre" {
                return;
            }
            self.pre_depth -= 1;
            if self.pre_depth > 0 {
                return;
            }
            let body = pre.trim_matches('\n').to_string();
            self.pre = None;
            self.write_line("```");
            self.write_line(&body);
            self.write_line("```");
            self.end_block();
            return;
        }

        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush_block();
                self.heading = None;
            }
            "li" => {
                self.flush_block();
                self.list_items = self.list_items.saturating_sub(1);
            }
            "blockquote" => {
                self.flush_block();
                self.quotes = self.quotes.saturating_sub(1);
            }
            "ul" | "ol" => {
                self.flush_block();
                if self.list_items == 0 && !self.out.is_empty() && !self.out.ends_with("\n\n") {
                    self.out.push('\n');
                }
            }
            "td" | "th" => {
                if let Some(table) = self.tables.last_mut() {
                    table.finish_cell();
                }
            }
            "tr" => {
                if let Some(table) = self.tables.last_mut() {
                    table.finish_row();
                }
            }
            "table" => {
                if let Some(mut table) = self.tables.pop() {
                    table.finish_row();
                    match self.tables.last_mut() {
                        // A nested table folds into the enclosing cell as plain text
                        Some(outer) => {
                            let text = table
                                .rows
                                .iter()
                                .flatten()
                                .filter(|c| !c.is_empty())
                                .cloned()
                                .collect::<Vec<_>>()
                                .join(" ");
                            let cell = outer.cell.get_or_insert_with(String::new);
                            if !cell.is_empty() && !text.is_empty() {
                                cell.push(' ');
                            }
                            cell.push_str(&text);
                        }
                        None => self.write_table(table.rows),
                    }
                }
            }
            "a" => {
                if let Some(anchor) = self.anchors.pop() {
                    if let Some(href) = anchor.href {
                        let text = anchor.text.split_whitespace().collect::<Vec<_>>().join(" ");
                        let label = if text.is_empty() { href.clone() } else { text };
                        self.cite(href, label);
                    }
                }
            }
            _ if BLOCK_ELEMENTS.contains(&name) => self.flush_block(),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if !self.skip.is_empty() {
            return;
        }

        if let Some(pre) = self.pre.as_mut() {
            pre.push_str(text);
            return;
        }

        for anchor in &mut self.anchors {
            anchor.text.push_str(text);
        }
        self.push_inline(text);
    }

    /// Append text with whitespace collapsed to the current line or table cell
    fn push_inline(&mut self, text: &str) {
        let target = match self.tables.last_mut().and_then(|t| t.cell.as_mut()) {
            Some(cell) => cell,
            None => &mut self.line,
        };

        for c in text.chars() {
            if c.is_whitespace() {
                if !target.is_empty() && !target.ends_with(' ') {
                    target.push(' ');
                }
            } else {
                target.push(c);
            }
        }
    }

    /// Record a link, leave its citation marker inline
    fn cite(&mut self, href: String, label: String) {
        let citation = self.next_citation;
        self.next_citation += 1;

        let marker = if self.options.citation_markers() {
            format!("^{}", citation)
        } else {
            format!("[{}]", citation)
        };
        let target = match self.tables.last_mut().and_then(|t| t.cell.as_mut()) {
            Some(cell) => cell,
            None => &mut self.line,
        };
        let trimmed_len = target.trim_end().len();
        target.truncate(trimmed_len);
        target.push_str(&marker);

        self.links.push(GatheredLink {
            citation,
            href,
            label,
        });
    }

    /// Emit the pending line as its own block
    fn flush_block(&mut self) {
        if self.flush_line() {
            self.end_block();
        }
    }

    /// Emit the pending line, returning whether anything was written
    fn flush_line(&mut self) -> bool {
        let text = self.line.trim().to_string();
        self.line.clear();
        if text.is_empty() {
            return false;
        }

        let prefix = if let Some(level) = self.heading {
            format!("{} ", "#".repeat(level))
        } else if self.list_items > 0 {
            "* ".to_string()
        } else if self.quotes > 0 {
            "> ".to_string()
        } else {
            String::new()
        };

        let line = format!("{}{}", prefix, text);
        self.write_line(&line);
        true
    }

    fn end_block(&mut self) {
        if self.list_items == 0 {
            self.out.push('\n');
        }
        self.blocks_since_links += 1;
        if self.blocks_since_links >= self.options.link_emit_frequency() {
            self.emit_links();
        }
    }

    fn emit_links(&mut self) {
        self.blocks_since_links = 0;
        if self.links.is_empty() {
            return;
        }

        for link in std::mem::take(&mut self.links) {
            let line = if self.options.numbered_links() {
                format!("=> {} [{}] {}", link.href, link.citation, link.label)
            } else {
                format!("=> {} {}", link.href, link.label)
            };
            self.write_line(&line);
        }
        self.out.push('\n');
    }

    fn write_table(&mut self, rows: Vec<Vec<String>>) {
        if rows.is_empty() {
            return;
        }

        if self.options.pretty_tables() {
            let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
            let widths: Vec<usize> = (0..columns)
                .map(|i| {
                    rows.iter()
                        .filter_map(|r| r.get(i))
                        .map(|c| c.chars().count())
                        .max()
                        .unwrap_or(0)
                })
                .collect();

            self.write_line("```");
            for (index, row) in rows.iter().enumerate() {
                if index > 0 {
                    self.write_line("");
                }
                let cells: Vec<String> = widths
                    .iter()
                    .enumerate()
                    .map(|(i, width)| {
                        let cell = row.get(i).map(String::as_str).unwrap_or("");
                        let pad = width - cell.chars().count();
                        format!("{}{}", cell, " ".repeat(pad))
                    })
                    .collect();
                let line = cells.join("  ");
                self.write_line(line.trim_end());
            }
            self.write_line("```");
        } else {
            for row in &rows {
                let line = row
                    .iter()
                    .filter(|c| !c.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" ");
                self.write_line(&line);
            }
        }
        self.end_block();
    }

    fn write_line(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn finish(mut self) -> String {
        let unclosed: Vec<String> = self.open.drain(..).rev().collect();
        for name in unclosed {
            self.close(&name);
        }
        self.flush_block();
        self.emit_links();
        filter_excessive_newlines(&self.out).trim().to_string()
    }
}

/// Links that make sense outside the page
fn is_followable(href: &str) -> bool {
    !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:")
}

/// Filter excessive newlines: keep at most 2 consecutive newlines
pub fn filter_excessive_newlines(s: &str) -> String {
    let mut result = String::new();
    let mut newline_count = 0;

    for c in s.chars() {
        if c == '\n' {
            newline_count += 1;
            if newline_count <= 2 {
                result.push(c);
            }
        } else {
            newline_count = 0;
            result.push(c);
        }
    }

    result
}
