//! Interchange format for whole documents.
//!
//! ```json
//! { "text": "...", "spans": [ { "type": "bold", "start": 0, "end": 4 } ] }
//! ```
//!
//! Highlight markers never appear in the serialized text; highlight regions
//! travel as `"highlight"` spans carrying the palette color and are turned
//! back into markers on load. Quote markers stay in the text.
//!
//! Span offsets count UTF-16 code units of the serialized text. In memory the
//! document uses byte offsets; the conversion happens only here.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::StyleConfig;
use crate::error::CodecError;
use crate::legacy;
use crate::markers::{self, HL_CLOSE};
use crate::model::{Color, Document, Origin, Span, SpanKind, TextRange};

#[derive(Debug, Serialize)]
pub struct SerializedDocument {
    pub text: String,
    pub spans: Vec<SerializedSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedSpan {
    #[serde(rename = "type")]
    pub kind: String,
    pub start: i64,
    pub end: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

impl SerializedSpan {
    fn new(kind: &str, range: TextRange, value: Option<i64>) -> Self {
        Self {
            kind: kind.to_string(),
            start: range.start as i64,
            end: range.end as i64,
            value,
        }
    }
}

/// Lenient reading side: spans are parsed one by one so a bad entry only costs itself.
#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    text: String,
    #[serde(default)]
    spans: Vec<serde_json::Value>,
}

/// Whether `content` looks like a serialized JSON document.
pub fn is_json(content: &str) -> bool {
    let trimmed = content.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}

/// Build the serialized form of `doc`.
pub fn to_serialized(doc: &Document, config: &StyleConfig) -> SerializedDocument {
    let text = doc.text();
    let (clean, map) = markers::strip_highlight_markers(text);
    let mapped = |range: TextRange| {
        TextRange::new(
            utf16_offset(&clean, map.map(range.start)),
            utf16_offset(&clean, map.map(range.end)),
        )
    };

    let mut spans = Vec::new();
    for region in markers::highlight_regions(text) {
        let Some(color) = region.index.and_then(|index| config.highlight_color(index)) else {
            continue;
        };
        let range = mapped(region.content);
        if !range.is_empty() {
            spans.push(SerializedSpan::new("highlight", range, Some(color.to_wire())));
        }
    }

    for span in doc.spans().iter().filter(|span| span.origin == Origin::User) {
        let (kind, value) = match span.kind {
            SpanKind::Bold => ("bold", None),
            SpanKind::Italic => ("italic", None),
            SpanKind::Underline => ("underline", None),
            SpanKind::TextColor { color } => ("color", Some(color.to_wire())),
            SpanKind::Highlight { .. } | SpanKind::AutoColor { .. } | SpanKind::Hidden => continue,
        };
        let range = mapped(span.range);
        if !range.is_empty() {
            spans.push(SerializedSpan::new(kind, range, value));
        }
    }
    spans.sort_by_key(|span| (span.start, span.end));

    SerializedDocument { text: clean, spans }
}

/// Serialize `doc` to JSON.
pub fn encode(doc: &Document, config: &StyleConfig) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&to_serialized(doc, config))?)
}

/// Load a document from any supported format.
///
/// JSON documents are read leniently. Content with markup goes through the
/// legacy importer. Anything else, including JSON that fails to parse, is
/// taken as plain text. Computed spans are not rebuilt here.
pub fn decode(content: &str, config: &StyleConfig) -> Document {
    if is_json(content) {
        match decode_json(content, config) {
            Ok(doc) => return doc,
            Err(err) => warn!(%err, "loading unreadable document as plain text"),
        }
    } else if legacy::is_markup(content) {
        debug!("importing legacy markup");
        return legacy::import(content);
    }
    Document::from_text(content)
}

/// Strict JSON reading; only a malformed top level is an error.
pub fn decode_json(content: &str, config: &StyleConfig) -> Result<Document, CodecError> {
    let raw: RawDocument = serde_json::from_str(content)?;
    let mut doc = Document::from_text(raw.text);
    let mut highlights = Vec::new();

    for value in raw.spans {
        let span: SerializedSpan = match serde_json::from_value(value) {
            Ok(span) => span,
            Err(err) => {
                debug!(%err, "skipping malformed span");
                continue;
            }
        };
        let start = byte_offset(doc.text(), span.start);
        let end = byte_offset(doc.text(), span.end);
        if start >= end {
            continue;
        }
        let range = TextRange::new(start, end);

        let kind = match (span.kind.as_str(), span.value) {
            ("bold", _) => SpanKind::Bold,
            ("italic", _) => SpanKind::Italic,
            ("underline", _) => SpanKind::Underline,
            ("color", Some(value)) => SpanKind::TextColor {
                color: Color::from_wire(value),
            },
            ("highlight", value) => {
                let index = value
                    .map(Color::from_wire)
                    .and_then(|color| config.highlight_index(color))
                    .unwrap_or(0);
                highlights.push((range, index));
                continue;
            }
            (other, _) => {
                debug!(kind = other, "ignoring unsupported span");
                continue;
            }
        };
        if let Err(err) = doc.add_span(Span::user(kind, start, end)) {
            warn!(%err, ?range, "dropping span");
        }
    }

    inject_highlights(&mut doc, highlights);
    Ok(doc)
}

/// Turn highlight spans back into marker regions, last first so earlier
/// offsets stay valid. Spans overlapping an earlier one are dropped.
fn inject_highlights(doc: &mut Document, mut highlights: Vec<(TextRange, usize)>) {
    highlights.sort_by_key(|(range, _)| (range.start, range.end));
    let mut kept: Vec<(TextRange, usize)> = Vec::with_capacity(highlights.len());
    for (range, index) in highlights {
        match kept.last() {
            Some((last, _)) if last.end > range.start => {
                debug!(?range, "skipping overlapping highlight");
            }
            _ => kept.push((range, index)),
        }
    }

    let close = HL_CLOSE.to_string();
    for (range, index) in kept.into_iter().rev() {
        let injected = doc
            .insert(range.end, &close)
            .and_then(|()| doc.insert(range.start, &markers::open_token(index)));
        if let Err(err) = injected {
            warn!(%err, ?range, "dropping highlight");
        }
    }
}

/// Byte offset in `text` as a count of UTF-16 code units.
fn utf16_offset(text: &str, byte: usize) -> usize {
    text.char_indices()
        .take_while(|&(index, _)| index < byte)
        .map(|(_, c)| c.len_utf16())
        .sum()
}

/// UTF-16 code unit offset back to a byte offset in `text`.
///
/// Out of range values are clamped; a unit inside a surrogate pair snaps back
/// to the start of its character.
fn byte_offset(text: &str, units: i64) -> usize {
    let Ok(units) = usize::try_from(units) else {
        return 0;
    };
    let mut seen = 0;
    for (index, c) in text.char_indices() {
        seen += c.len_utf16();
        if seen > units {
            return index;
        }
    }
    text.len()
}
