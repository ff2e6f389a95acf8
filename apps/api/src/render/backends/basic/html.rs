//! HTML reader for the basic backend.
//!
//! Only the structure a resume template produces matters here: headings,
//! paragraphs, list items and bold runs. Everything else is flattened to text.
//! Problems never abort parsing; they are collected in [`ConversionStatus`]
//! and the caller decides whether the result is usable.

use scraper::{ElementRef, Html};

use crate::render::resolver::{is_absolute_uri, ResolvedResource, ResourceNotFoundError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Paragraph,
    ListItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub spans: Vec<Span>,
}

impl Block {
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Outcome of a conversion. `errors` holds asset references that could not be
/// resolved; `warnings` holds everything that was tolerated.
#[derive(Debug, Default)]
pub struct ConversionStatus {
    pub errors: Vec<ResourceNotFoundError>,
    pub warnings: Vec<String>,
}

impl ConversionStatus {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub title: Option<String>,
    pub blocks: Vec<Block>,
    pub status: ConversionStatus,
}

pub type LinkCallback<'a> = dyn FnMut(&str) -> Result<ResolvedResource, ResourceNotFoundError> + 'a;

const SKIPPED_TAGS: &[&str] = &["style", "script", "noscript", "template", "svg"];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt", "footer", "form",
    "header", "html", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "thead", "tr",
    "ul",
];

/// Parses `html`, calling `link_callback` for every relative asset reference
/// (`<img src>`, `<link rel="stylesheet" href>`).
pub fn parse_document(html: &str, link_callback: &mut LinkCallback<'_>) -> ParsedDocument {
    let document = Html::parse_document(html);

    let mut builder = Builder::new(link_callback);
    for error in &document.errors {
        builder.warn(format!("html: {error}"));
    }
    builder.element(document.root_element());
    builder.finish()
}

struct Builder<'a, 'b> {
    blocks: Vec<Block>,
    current: Vec<Span>,
    kind: BlockKind,
    bold_depth: usize,
    title: Option<String>,
    status: ConversionStatus,
    link_callback: &'a mut LinkCallback<'b>,
}

impl<'a, 'b> Builder<'a, 'b> {
    fn new(link_callback: &'a mut LinkCallback<'b>) -> Self {
        Self {
            blocks: Vec::new(),
            current: Vec::new(),
            kind: BlockKind::Paragraph,
            bold_depth: 0,
            title: None,
            status: ConversionStatus::default(),
            link_callback,
        }
    }

    fn warn(&mut self, message: String) {
        self.status.warnings.push(message);
    }

    fn element(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        if SKIPPED_TAGS.contains(&name) {
            return;
        }
        if name == "title" {
            if self.title.is_none() {
                let raw: String = element.text().collect();
                let title = collapse_whitespace(&raw).trim().to_string();
                self.title = (!title.is_empty()).then_some(title);
            }
            return;
        }

        self.open(name, element.value());
        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                self.element(child_element);
            } else if let Some(text) = child.value().as_text() {
                self.text(text);
            }
        }
        self.close(name);
    }

    fn text(&mut self, raw: &str) {
        let collapsed = collapse_whitespace(raw);
        if collapsed.is_empty() {
            return;
        }
        let ends_with_space = self.current.last().map_or(true, |s| s.text.ends_with(' '));
        let collapsed = if ends_with_space {
            collapsed.trim_start()
        } else {
            collapsed.as_str()
        };
        if collapsed.is_empty() {
            return;
        }

        let bold = self.bold_depth > 0 || matches!(self.kind, BlockKind::Heading(_));
        match self.current.last_mut() {
            Some(last) if last.bold == bold => last.text.push_str(collapsed),
            _ => self.current.push(Span {
                text: collapsed.to_string(),
                bold,
            }),
        }
    }

    fn open(&mut self, name: &str, element: &scraper::node::Element) {
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                self.kind = BlockKind::Heading(name.as_bytes()[1] - b'0');
            }
            "li" => {
                self.flush();
                self.kind = BlockKind::ListItem;
            }
            "strong" | "b" => self.bold_depth += 1,
            "br" => {
                self.flush();
                if self.kind == BlockKind::ListItem {
                    self.kind = BlockKind::Paragraph;
                }
            }
            "hr" => {
                self.flush();
                self.kind = BlockKind::Paragraph;
            }
            "td" | "th" => self.text(" "),
            "img" => match element.attr("src") {
                Some(src) => self.resource(src, "image"),
                None => self.warn("<img> without src ignored".to_string()),
            },
            "link" => {
                let is_stylesheet = element
                    .attr("rel")
                    .is_some_and(|rel| rel.to_ascii_lowercase().contains("stylesheet"));
                if is_stylesheet {
                    if let Some(href) = element.attr("href") {
                        self.resource(href, "stylesheet");
                    }
                }
            }
            _ if BLOCK_TAGS.contains(&name) => {
                self.flush();
                self.kind = BlockKind::Paragraph;
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        match name {
            "strong" | "b" => self.bold_depth = self.bold_depth.saturating_sub(1),
            "td" | "th" => self.text(" "),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" => {
                self.flush();
                self.kind = BlockKind::Paragraph;
            }
            _ if BLOCK_TAGS.contains(&name) => {
                self.flush();
                self.kind = BlockKind::Paragraph;
            }
            _ => {}
        }
    }

    fn resource(&mut self, uri: &str, what: &str) {
        let uri = uri.trim();
        if uri.is_empty() || uri.starts_with('#') {
            return;
        }
        if is_absolute_uri(uri) {
            self.warn(format!("external {what} '{uri}' skipped"));
            return;
        }
        match (self.link_callback)(uri) {
            Ok(ResolvedResource::File(path)) => {
                self.warn(format!("{what} '{}' resolved but not embedded", path.display()))
            }
            Ok(ResolvedResource::External(uri)) => {
                self.warn(format!("relative {what} '{uri}' cannot be fetched; skipped"))
            }
            Err(err) => self.status.errors.push(err),
        }
    }

    fn flush(&mut self) {
        let mut spans = std::mem::take(&mut self.current);
        if let Some(last) = spans.last_mut() {
            let trimmed = last.text.trim_end().len();
            last.text.truncate(trimmed);
        }
        spans.retain(|s| !s.text.is_empty());
        if !spans.is_empty() {
            self.blocks.push(Block {
                kind: self.kind,
                spans,
            });
        }
    }

    fn finish(mut self) -> ParsedDocument {
        self.flush();
        ParsedDocument {
            title: self.title,
            blocks: self.blocks,
            status: self.status,
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        // U+00A0 is kept: it must not break or collapse.
        if c.is_whitespace() && c != '\u{a0}' {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}
