//! Importer for notes saved in the older HTML-subset format.
//!
//! Understands `b`/`strong`, `i`/`em`/`cite`/`dfn`, `u`, `font color` and
//! `span style="color:..."`, line breaks and paragraphs. Other tags are
//! dropped and their text kept.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::warn;

use crate::model::{Color, Document, Span, SpanKind};

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)\b([^>]*)>").expect("valid regex"));
static COLOR_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)color\s*[:=]\s*["']?\s*(#[0-9a-f]{6}(?:[0-9a-f]{2})?)"#).expect("valid regex")
});
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("valid regex"));

/// Whether `content` should go through [`import`].
pub fn is_markup(content: &str) -> bool {
    content.contains('<') && content.contains('>')
}

/// Convert markup into a document carrying user spans.
///
/// Whitespace collapses the way a browser would render it, and the result is
/// trimmed with spans moved along.
pub fn import(markup: &str) -> Document {
    let mut builder = Builder::default();
    let mut cursor = 0;
    for caps in TAG.captures_iter(markup) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        builder.text(&markup[cursor..whole.start()]);
        cursor = whole.end();

        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let name = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        let attrs = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        builder.tag(&name, attrs, closing);
    }
    builder.text(&markup[cursor..]);
    builder.finish()
}

pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{A0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16).ok())
                    .unwrap_or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn style_for(name: &str, attrs: &str) -> Option<SpanKind> {
    match name {
        "b" | "strong" => Some(SpanKind::Bold),
        "i" | "em" | "cite" | "dfn" => Some(SpanKind::Italic),
        "u" => Some(SpanKind::Underline),
        "font" | "span" => {
            let caps = COLOR_ATTR.captures(attrs)?;
            let color: Color = caps.get(1)?.as_str().parse().ok()?;
            Some(SpanKind::TextColor { color })
        }
        _ => None,
    }
}

#[derive(Default)]
struct Builder {
    text: String,
    open: Vec<OpenTag>,
    spans: Vec<(SpanKind, usize, usize)>,
}

struct OpenTag {
    name: String,
    kind: Option<SpanKind>,
    start: usize,
}

impl Builder {
    fn text(&mut self, raw: &str) {
        for c in decode_entities(raw).chars() {
            if c == '\u{A0}' {
                self.text.push(' ');
            } else if c.is_whitespace() {
                if !self.text.is_empty() && !self.text.ends_with([' ', '\n']) {
                    self.text.push(' ');
                }
            } else {
                self.text.push(c);
            }
        }
    }

    fn tag(&mut self, name: &str, attrs: &str, closing: bool) {
        match name {
            "br" => self.text.push('\n'),
            "p" | "div" => self.paragraph_break(),
            _ if closing => self.close(name),
            _ => self.open.push(OpenTag {
                name: name.to_string(),
                kind: style_for(name, attrs),
                start: self.text.len(),
            }),
        }
    }

    fn paragraph_break(&mut self) {
        if self.text.is_empty() {
            return;
        }
        if self.text.ends_with(' ') {
            self.text.pop();
        }
        while !self.text.ends_with("\n\n") {
            self.text.push('\n');
        }
    }

    fn close(&mut self, name: &str) {
        let Some(position) = self.open.iter().rposition(|tag| tag.name == name) else {
            return;
        };
        let tag = self.open.remove(position);
        self.record(tag);
    }

    fn record(&mut self, tag: OpenTag) {
        let end = self.text.len();
        let start = tag.start.min(end);
        if let Some(kind) = tag.kind {
            if start < end {
                self.spans.push((kind, start, end));
            }
        }
    }

    fn finish(mut self) -> Document {
        while let Some(tag) = self.open.pop() {
            self.record(tag);
        }

        let lead = self.text.len() - self.text.trim_start().len();
        let trimmed = self.text.trim();
        let len = trimmed.len();
        let mut doc = Document::from_text(trimmed);
        for (kind, start, end) in self.spans {
            let start = start.saturating_sub(lead).min(len);
            let end = end.saturating_sub(lead).min(len);
            if start >= end {
                continue;
            }
            if let Err(err) = doc.add_span(Span::user(kind, start, end)) {
                warn!(%err, "dropping imported span");
            }
        }
        doc
    }
}
