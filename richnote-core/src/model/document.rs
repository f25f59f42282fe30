use tracing::trace;

use super::{Boundary, Origin, Span, SpanTag, TextRange};
use crate::error::EditError;

/// Text buffer plus the formatting spans laid over it.
///
/// Offsets are byte offsets into `text` and must sit on `char` boundaries.
/// Every mutation keeps the span table consistent with the text: spans are
/// shifted on insert, clipped on delete, and never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    text: String,
    spans: Vec<Span>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spans: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Spans ordered by start, end, then kind.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn slice(&self, range: TextRange) -> Option<&str> {
        self.text.get(range.as_range())
    }

    pub fn check_offset(&self, offset: usize) -> Result<(), EditError> {
        if offset > self.text.len() {
            return Err(EditError::OutOfBounds {
                start: offset,
                end: offset,
                len: self.text.len(),
            });
        }
        if !self.text.is_char_boundary(offset) {
            return Err(EditError::NotCharBoundary { offset });
        }
        Ok(())
    }

    pub fn check_range(&self, start: usize, end: usize) -> Result<(), EditError> {
        if start > end || end > self.text.len() {
            return Err(EditError::OutOfBounds {
                start,
                end,
                len: self.text.len(),
            });
        }
        self.check_offset(start)?;
        self.check_offset(end)
    }

    /// Insert `s` at `pos`, shifting or growing spans according to their boundary mode.
    pub fn insert(&mut self, pos: usize, s: &str) -> Result<(), EditError> {
        self.check_offset(pos)?;
        if s.is_empty() {
            return Ok(());
        }
        let n = s.len();
        self.text.insert_str(pos, s);

        for span in &mut self.spans {
            let inclusive = span.boundary == Boundary::Inclusive;
            let TextRange { start, end } = span.range;
            if start > pos || (start == pos && !inclusive) {
                span.range = TextRange::new(start + n, end + n);
            } else if pos < end || (pos == end && inclusive) {
                span.range = TextRange::new(start, end + n);
            }
        }
        self.sort_spans();
        trace!(pos, len = n, "inserted text");
        Ok(())
    }

    /// Delete `[start, end)`, clipping overlapping spans and dropping the ones fully removed.
    pub fn delete(&mut self, start: usize, end: usize) -> Result<(), EditError> {
        self.check_range(start, end)?;
        if start == end {
            return Ok(());
        }
        let removed = end - start;
        self.text.replace_range(start..end, "");

        let map = |offset: usize| {
            if offset <= start {
                offset
            } else if offset >= end {
                offset - removed
            } else {
                start
            }
        };
        for span in &mut self.spans {
            span.range = TextRange::new(map(span.range.start), map(span.range.end));
        }
        self.spans.retain(|span| !span.range.is_empty());
        self.sort_spans();
        trace!(start, end, "deleted text");
        Ok(())
    }

    /// Replace `[start, end)` with `s`.
    pub fn replace(&mut self, start: usize, end: usize, s: &str) -> Result<(), EditError> {
        self.check_range(start, end)?;
        self.delete(start, end)?;
        self.insert(start, s)
    }

    /// Swap the buffer for text of identical length, leaving every span in place.
    ///
    /// Only valid for rewrites that replace characters with characters of the
    /// same encoded width at the same offsets.
    pub(crate) fn rewrite_in_place(&mut self, text: String) {
        debug_assert_eq!(text.len(), self.text.len());
        self.text = text;
    }

    /// Add a span, merging it with touching spans of identical style.
    pub fn add_span(&mut self, span: Span) -> Result<(), EditError> {
        let TextRange { start, end } = span.range;
        self.check_range(start, end)?;
        if start == end {
            return Err(EditError::EmptyRange { offset: start });
        }

        let mut merged = span;
        self.spans.retain(|existing| {
            if existing.same_style(&merged) && existing.range.touches(&merged.range) {
                merged.range = TextRange::new(
                    existing.range.start.min(merged.range.start),
                    existing.range.end.max(merged.range.end),
                );
                if existing.boundary == Boundary::Inclusive {
                    merged.boundary = Boundary::Inclusive;
                }
                false
            } else {
                true
            }
        });
        self.spans.push(merged);
        self.sort_spans();
        Ok(())
    }

    /// Remove every span matching `predicate`, returning how many were dropped.
    pub fn remove_spans(&mut self, mut predicate: impl FnMut(&Span) -> bool) -> usize {
        let before = self.spans.len();
        self.spans.retain(|span| !predicate(span));
        before - self.spans.len()
    }

    /// Strip formatting of kind `tag` owned by `origin` from `[start, end)`.
    ///
    /// Spans reaching outside the range are cut down to their surviving left
    /// and right remainders. Returns true when anything was removed.
    pub fn clear_range(
        &mut self,
        tag: SpanTag,
        origin: Origin,
        start: usize,
        end: usize,
    ) -> Result<bool, EditError> {
        self.check_range(start, end)?;
        let target = TextRange::new(start, end);
        let mut remainders = Vec::new();
        let removed = self.remove_spans(|span| {
            let hit = span.tag() == tag && span.origin == origin && span.range.overlaps(&target);
            if hit {
                if span.range.start < start {
                    remainders.push(span.with_range(span.range.start, start));
                }
                if span.range.end > end {
                    remainders.push(span.with_range(end, span.range.end));
                }
            }
            hit
        });
        self.spans.extend(remainders);
        self.sort_spans();
        Ok(removed > 0)
    }

    /// Spans of kind `tag` overlapping `[start, end)`.
    pub fn spans_in(&self, tag: SpanTag, start: usize, end: usize) -> Vec<Span> {
        let target = TextRange::new(start, end);
        self.spans
            .iter()
            .filter(|span| span.tag() == tag && span.range.overlaps(&target))
            .copied()
            .collect()
    }

    /// Spans covering the character that starts at `offset`.
    pub fn spans_at(&self, offset: usize) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(move |span| span.range.contains(offset))
    }

    pub fn has_span_in(&self, tag: SpanTag, origin: Origin, start: usize, end: usize) -> bool {
        let target = TextRange::new(start, end);
        self.spans
            .iter()
            .any(|span| span.tag() == tag && span.origin == origin && span.range.overlaps(&target))
    }

    /// Byte offset of the character before `offset`, if any.
    pub fn prev_char_boundary(&self, offset: usize) -> Option<usize> {
        self.text.get(..offset)?.char_indices().next_back().map(|(i, _)| i)
    }

    fn sort_spans(&mut self) {
        self.spans
            .sort_by_key(|span| (span.range.start, span.range.end, span.tag()));
    }
}
