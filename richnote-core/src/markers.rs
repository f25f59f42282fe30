//! Invisible marker characters that carry highlights and quoted excerpts
//! through plain-text storage.
//!
//! ```text
//! highlight := HL_OPEN "{" digits "}" content HL_CLOSE
//! quote     := QUOTE content QUOTE
//! ```
//!
//! `content` is matched lazily and may cross line breaks.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::error::EditError;
use crate::model::{Document, TextRange};

pub const HL_OPEN: char = '\u{200C}';
pub const HL_CLOSE: char = '\u{200D}';
pub const QUOTE: char = '\u{200B}';

static OPEN_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x{200C}\{[0-9]+\}").expect("valid regex"));
static ANY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x{200C}(?:\{[0-9]+\})?|\x{200D}|\x{200B}").expect("valid regex"));
static HIGHLIGHT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x{200C}(?:\{[0-9]+\})?|\x{200D}").expect("valid regex"));
static HIGHLIGHT_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\x{200C}\{([0-9]+)\}(.*?)\x{200D}").expect("valid regex"));
static ORPHAN_HIGHLIGHT_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{([0-9]+)\}(.*?)\x{200D}").expect("valid regex"));
static QUOTE_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\x{200B}(.*?)\x{200B}").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// `HL_OPEN "{" digits "}"`, or a bare `HL_OPEN` awaiting migration.
    HighlightOpen,
    HighlightClose,
    Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerToken {
    pub kind: MarkerKind,
    pub range: TextRange,
}

/// A highlight region found in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightMatch {
    /// Whole region, markers included.
    pub range: TextRange,
    /// The opening token, `{digits}` alone when `HL_OPEN` is missing.
    pub open: TextRange,
    pub content: TextRange,
    pub close: TextRange,
    /// Palette index, `None` when the digits do not fit a `usize`.
    pub index: Option<usize>,
    /// False when the region was recovered without its `HL_OPEN`.
    pub has_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteMatch {
    pub range: TextRange,
    pub content: TextRange,
}

/// Where a highlight edit left the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightEdit {
    /// The formatted text, markers excluded.
    pub content: TextRange,
    /// Everything the edit rewrote, inserted markers included.
    pub edited: TextRange,
}

pub fn open_token(index: usize) -> String {
    format!("{HL_OPEN}{{{index}}}")
}

pub fn is_marker(c: char) -> bool {
    matches!(c, HL_OPEN | HL_CLOSE | QUOTE)
}

/// Every marker token, leftmost first and non-overlapping.
pub fn markers(text: &str) -> Vec<MarkerToken> {
    ANY_MARKER
        .find_iter(text)
        .map(|m| {
            let kind = match m.as_str().chars().next() {
                Some(HL_CLOSE) => MarkerKind::HighlightClose,
                Some(QUOTE) => MarkerKind::Quote,
                _ => MarkerKind::HighlightOpen,
            };
            MarkerToken {
                kind,
                range: TextRange::new(m.start(), m.end()),
            }
        })
        .collect()
}

/// Well-formed highlight regions (with `HL_OPEN`).
pub fn strict_highlight_regions(text: &str) -> Vec<HighlightMatch> {
    region_matches(&HIGHLIGHT_REGION, text, 0, true)
}

/// Highlight regions, also recovering `{digits} ... HL_CLOSE` whose `HL_OPEN`
/// was lost. Recovery only looks at text between well-formed regions.
pub fn highlight_regions(text: &str) -> Vec<HighlightMatch> {
    let strict = strict_highlight_regions(text);
    let mut regions = Vec::with_capacity(strict.len());
    let mut cursor = 0;
    for region in strict {
        if let Some(gap) = text.get(cursor..region.range.start) {
            regions.extend(region_matches(&ORPHAN_HIGHLIGHT_REGION, gap, cursor, false));
        }
        cursor = region.range.end;
        regions.push(region);
    }
    if let Some(gap) = text.get(cursor..) {
        regions.extend(region_matches(&ORPHAN_HIGHLIGHT_REGION, gap, cursor, false));
    }
    regions
}

fn region_matches(re: &Regex, text: &str, base: usize, has_open: bool) -> Vec<HighlightMatch> {
    re.captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let digits = caps.get(1)?;
            let content = caps.get(2)?;
            Some(HighlightMatch {
                range: TextRange::new(base + whole.start(), base + whole.end()),
                open: TextRange::new(base + whole.start(), base + content.start()),
                content: TextRange::new(base + content.start(), base + content.end()),
                close: TextRange::new(base + content.end(), base + whole.end()),
                index: digits.as_str().parse().ok(),
                has_open,
            })
        })
        .collect()
}

pub fn quote_regions(text: &str) -> Vec<QuoteMatch> {
    QUOTE_REGION
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let content = caps.get(1)?;
            Some(QuoteMatch {
                range: TextRange::new(whole.start(), whole.end()),
                content: TextRange::new(content.start(), content.end()),
            })
        })
        .collect()
}

/// Rewrite every `HL_OPEN` not followed by `{` as `HL_CLOSE`.
///
/// Documents from before the closing marker existed used `HL_OPEN` on both
/// sides. Returns `None` when nothing needed rewriting. Both markers encode to
/// the same number of bytes, so offsets are unaffected.
pub fn migrate_legacy(text: &str) -> Option<String> {
    let mut changed = false;
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == HL_OPEN && chars.peek() != Some(&'{') {
            out.push(HL_CLOSE);
            changed = true;
        } else {
            out.push(c);
        }
    }
    changed.then_some(out)
}

/// Widen `range` so it never cuts a highlight marker token in half.
///
/// A start inside, or right after, an opening token moves to the token start.
/// An end inside an opening token moves to the token end; an end sitting on
/// `HL_CLOSE` (or a bare `HL_OPEN`) moves past it.
pub fn expand_range(text: &str, range: TextRange) -> TextRange {
    let mut start = range.start;
    let mut end = range.end;

    if let Some(token) = OPEN_TOKEN
        .find_iter(text)
        .find(|m| start > m.start() && start <= m.end())
    {
        start = token.start();
    }

    if let Some(token) = OPEN_TOKEN
        .find_iter(text)
        .find(|m| end > m.start() && end < m.end())
    {
        end = token.end();
    } else if let Some(rest) = text.get(end..) {
        let mut chars = rest.chars();
        match chars.next() {
            Some(HL_CLOSE) => end += HL_CLOSE.len_utf8(),
            Some(HL_OPEN) if chars.next() != Some('{') => end += HL_OPEN.len_utf8(),
            _ => {}
        }
    }

    TextRange::new(start, end.max(start))
}

/// Wrap `range` in a highlight region using palette slot `index`.
pub fn wrap_highlight(
    doc: &mut Document,
    range: TextRange,
    index: usize,
) -> Result<Option<HighlightEdit>, EditError> {
    apply_highlight(doc, range, Some(index))
}

/// Remove highlighting from `range`.
pub fn unwrap_highlight(
    doc: &mut Document,
    range: TextRange,
) -> Result<Option<HighlightEdit>, EditError> {
    apply_highlight(doc, range, None)
}

/// Set the highlight of `range` to `index`, or clear it with `None`.
///
/// The range is widened with [`expand_range`] and stripped of highlight
/// markers. Regions cut by either edge keep their own index on the part left
/// outside the range; a cut region with the same index as the new one is
/// extended instead. `QUOTE` markers are never touched.
///
/// Returns `None` for an empty range.
pub fn apply_highlight(
    doc: &mut Document,
    range: TextRange,
    index: Option<usize>,
) -> Result<Option<HighlightEdit>, EditError> {
    doc.check_range(range.start, range.end)?;
    if range.is_empty() {
        return Ok(None);
    }

    let text = doc.text();
    let TextRange { start, end } = expand_range(text, range);

    let regions = strict_highlight_regions(text);
    let left = regions
        .iter()
        .find(|r| r.range.start < start && start < r.range.end)
        .and_then(|r| r.index);
    let right = regions
        .iter()
        .find(|r| r.range.start < end && end < r.range.end)
        .and_then(|r| r.index);

    let strip: Vec<TextRange> = text
        .get(start..end)
        .map(|inner| {
            HIGHLIGHT_MARKER
                .find_iter(inner)
                .map(|m| TextRange::new(start + m.start(), start + m.end()))
                .collect()
        })
        .unwrap_or_default();

    let mut head = String::new();
    let mut tail = String::new();
    match index {
        Some(index) => {
            if left != Some(index) {
                if left.is_some() {
                    head.push(HL_CLOSE);
                }
                head.push_str(&open_token(index));
            }
            if right != Some(index) {
                tail.push(HL_CLOSE);
                if let Some(right) = right {
                    tail.push_str(&open_token(right));
                }
            }
        }
        None => {
            if left.is_some() {
                head.push(HL_CLOSE);
            }
            if let Some(right) = right {
                tail.push_str(&open_token(right));
            }
        }
    }

    doc.insert(end, &tail)?;
    for token in strip.iter().rev() {
        doc.delete(token.start, token.end)?;
    }
    doc.insert(start, &head)?;

    let removed: usize = strip.iter().map(TextRange::len).sum();
    let content = TextRange::new(start + head.len(), end - removed + head.len());
    let edited = TextRange::new(start, content.end + tail.len());
    trace!(?index, ?content, stripped = strip.len(), "applied highlight");
    Ok(Some(HighlightEdit { content, edited }))
}

/// Text with every highlight marker token removed, plus a map from original
/// offsets to offsets in the stripped text.
///
/// The `{digits}` opening of a region that lost its `HL_OPEN` goes too.
/// `QUOTE` markers are kept.
pub fn strip_highlight_markers(text: &str) -> (String, OffsetMap) {
    let mut removed: Vec<TextRange> = HIGHLIGHT_MARKER
        .find_iter(text)
        .map(|m| TextRange::new(m.start(), m.end()))
        .collect();
    removed.extend(
        highlight_regions(text)
            .into_iter()
            .filter(|region| !region.has_open)
            .map(|region| region.open),
    );
    removed.sort_by_key(|cut| cut.start);

    let mut clean = String::with_capacity(text.len());
    let mut cursor = 0;
    for cut in &removed {
        clean.push_str(&text[cursor..cut.start]);
        cursor = cut.end;
    }
    clean.push_str(&text[cursor..]);
    (clean, OffsetMap { removed })
}

/// Maps offsets in a text to offsets after some ranges were cut out of it.
#[derive(Debug, Clone, Default)]
pub struct OffsetMap {
    removed: Vec<TextRange>,
}

impl OffsetMap {
    pub fn map(&self, offset: usize) -> usize {
        let mut shift = 0;
        for cut in &self.removed {
            if offset >= cut.end {
                shift += cut.len();
            } else if offset > cut.start {
                shift += offset - cut.start;
                break;
            } else {
                break;
            }
        }
        offset - shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Span, SpanKind, SpanTag};

    fn hl(index: usize, content: &str) -> String {
        format!("{}{content}{HL_CLOSE}", open_token(index))
    }

    #[test]
    fn test_markers_are_scanned_leftmost_first() {
        let text = format!("a{}b{QUOTE}c{QUOTE}", hl(3, "x"));
        let kinds: Vec<_> = markers(&text).iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MarkerKind::HighlightOpen,
                MarkerKind::HighlightClose,
                MarkerKind::Quote,
                MarkerKind::Quote
            ]
        );
        assert_eq!(markers(&text)[0].range, TextRange::new(1, 7));
    }

    #[test]
    fn test_highlight_regions_lazy_and_multiline() {
        let text = format!("{} and {}", hl(0, "one\ntwo"), hl(12, "three"));
        let regions = highlight_regions(&text);
        assert_eq!(regions.len(), 2);
        assert_eq!(&text[regions[0].content.as_range()], "one\ntwo");
        assert_eq!(regions[1].index, Some(12));
        assert!(regions.iter().all(|r| r.has_open));
    }

    #[test]
    fn test_orphan_region_does_not_swallow_real_region() {
        let text = format!("{{5}} plain {} tail {{1}}lost{HL_CLOSE}", hl(0, "real"));
        let regions = highlight_regions(&text);
        assert_eq!(regions.len(), 2);
        assert_eq!(&text[regions[0].content.as_range()], "real");
        assert!(regions[0].has_open);
        assert_eq!(&text[regions[1].content.as_range()], "lost");
        assert!(!regions[1].has_open);
    }

    #[test]
    fn test_unparsable_index_is_reported_not_dropped() {
        let text = hl(usize::MAX, "x").replace(&usize::MAX.to_string(), "99999999999999999999999");
        let regions = highlight_regions(&text);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].index, None);
    }

    #[test]
    fn test_migrate_legacy_rewrites_bare_open() {
        let legacy = format!("{}x{HL_OPEN} y", open_token(0));
        let migrated = migrate_legacy(&legacy).unwrap();
        assert_eq!(migrated, format!("{}x{HL_CLOSE} y", open_token(0)));
        assert_eq!(migrated.len(), legacy.len());
        assert_eq!(migrate_legacy(&migrated), None);
    }

    #[test]
    fn test_expand_range_pulls_start_out_of_token() {
        let text = format!("a{}d", hl(0, "bc"));
        let token_start = 1;
        let content_start = text.find('b').unwrap();
        let close = text.find(HL_CLOSE).unwrap();

        for start in [token_start + 3, token_start + 4, content_start] {
            let expanded = expand_range(&text, TextRange::new(start, close));
            assert_eq!(expanded.start, token_start, "start {start}");
            assert_eq!(expanded.end, close + 3);
        }
        // a start on the token itself is left alone
        let expanded = expand_range(&text, TextRange::new(token_start, content_start + 1));
        assert_eq!(expanded, TextRange::new(token_start, content_start + 1));
    }

    #[test]
    fn test_expand_range_end_inside_token() {
        let text = format!("ab{}", hl(7, "c"));
        let expanded = expand_range(&text, TextRange::new(0, 2 + 4));
        assert_eq!(expanded, TextRange::new(0, 2 + open_token(7).len()));
    }

    #[test]
    fn test_wrap_and_unwrap_highlight() {
        let mut doc = Document::from_text("hello world");
        let edit = wrap_highlight(&mut doc, TextRange::new(6, 11), 2).unwrap().unwrap();
        assert_eq!(doc.text(), format!("hello {}", hl(2, "world")));
        assert_eq!(doc.slice(edit.content), Some("world"));

        let edit = unwrap_highlight(&mut doc, edit.content).unwrap().unwrap();
        assert_eq!(doc.text(), "hello world");
        assert_eq!(doc.slice(edit.content), Some("world"));
    }

    #[test]
    fn test_rehighlight_from_inside_token_leaves_one_region() {
        let mut doc = Document::from_text(format!("a{}d", hl(0, "bc")));
        let start = 1 + HL_OPEN.len_utf8();
        let end = doc.text().len();
        wrap_highlight(&mut doc, TextRange::new(start, end), 1).unwrap();

        assert_eq!(doc.text(), format!("a{}", hl(1, "bcd")));
        assert_eq!(strict_highlight_regions(doc.text()).len(), 1);
        assert_eq!(markers(doc.text()).len(), 2);
    }

    #[test]
    fn test_partial_highlight_splits_region() {
        let mut doc = Document::from_text(hl(0, "abcd"));
        let b = doc.text().find('b').unwrap();
        wrap_highlight(&mut doc, TextRange::new(b, b + 2), 4).unwrap();
        assert_eq!(doc.text(), format!("{}{}{}", hl(0, "a"), hl(4, "bc"), hl(0, "d")));

        let mut doc = Document::from_text(hl(0, "abcd"));
        unwrap_highlight(&mut doc, TextRange::new(b, b + 2)).unwrap();
        assert_eq!(doc.text(), format!("{}bc{}", hl(0, "a"), hl(0, "d")));
    }

    #[test]
    fn test_same_index_extends_neighbouring_region() {
        let mut doc = Document::from_text(format!("{}xyz", hl(3, "ab")));
        let x = doc.text().find('x').unwrap();
        let b = doc.text().find('b').unwrap();
        wrap_highlight(&mut doc, TextRange::new(b, x + 1), 3).unwrap();
        assert_eq!(doc.text(), format!("{}yz", hl(3, "abx")));
    }

    #[test]
    fn test_highlight_keeps_user_spans_on_content() {
        let mut doc = Document::from_text("one two");
        doc.add_span(Span::user(SpanKind::Bold, 4, 7)).unwrap();
        wrap_highlight(&mut doc, TextRange::new(4, 7), 0).unwrap();
        let bold = doc.spans_in(SpanTag::Bold, 0, doc.len());
        assert_eq!(doc.slice(bold[0].range), Some("two"));
    }

    #[test]
    fn test_quote_markers_survive_highlight_edits() {
        let mut doc = Document::from_text(format!("x {QUOTE}verse{QUOTE} y"));
        let len = doc.len();
        wrap_highlight(&mut doc, TextRange::new(0, len), 0).unwrap();
        assert_eq!(quote_regions(doc.text()).len(), 1);
        let len = doc.len();
        unwrap_highlight(&mut doc, TextRange::new(0, len)).unwrap();
        assert_eq!(doc.text(), format!("x {QUOTE}verse{QUOTE} y"));
    }

    #[test]
    fn test_strip_markers_maps_offsets() {
        let text = format!("a{}d", hl(0, "bc"));
        let (clean, map) = strip_highlight_markers(&text);
        assert_eq!(clean, "abcd");
        let b = text.find('b').unwrap();
        let d = text.find('d').unwrap();
        assert_eq!(map.map(0), 0);
        assert_eq!(map.map(1), 1);
        assert_eq!(map.map(b), 1);
        assert_eq!(map.map(3), 1);
        assert_eq!(map.map(d), 3);
        assert_eq!(map.map(text.len()), 4);
    }
}
