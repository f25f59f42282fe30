//! Offset helpers for cursor placement and display.

use crate::model::{Document, SpanTag, TextRange};

/// Line start offsets for coordinate translation
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in text.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Convert a byte offset to (row, col), with `col` counted in characters.
    pub fn offset_to_position(&self, text: &str, offset: usize) -> (usize, usize) {
        let row = self
            .line_starts
            .iter()
            .rposition(|&start| start <= offset)
            .unwrap_or(0);
        let start = self.line_starts[row];
        let col = text
            .get(start..offset.min(text.len()))
            .map(|line| line.chars().count())
            .unwrap_or(0);
        (row, col)
    }

    /// Convert (row, col) back to a byte offset, clamping to the line end.
    pub fn position_to_offset(&self, text: &str, row: usize, col: usize) -> usize {
        let Some(&start) = self.line_starts.get(row) else {
            return text.len();
        };
        let line_end = self
            .line_starts
            .get(row + 1)
            .map(|next| next - 1)
            .unwrap_or(text.len());
        text[start..line_end]
            .char_indices()
            .nth(col)
            .map(|(i, _)| start + i)
            .unwrap_or(line_end)
    }
}

/// The closest character before `offset` that is not hidden.
pub fn prev_visible_char(doc: &Document, offset: usize) -> Option<TextRange> {
    let before = doc.text().get(..offset)?;
    before
        .char_indices()
        .rev()
        .find(|&(i, _)| !doc.spans_at(i).any(|span| span.tag() == SpanTag::Hidden))
        .map(|(i, c)| TextRange::new(i, i + c.len_utf8()))
}
