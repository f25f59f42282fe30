//! Pending ("sticky") formatting and the edit transaction that suppresses it.

use std::cell::Cell;
use std::rc::Rc;

use crate::model::{Color, Document, Origin, SpanKind};

/// Styles that newly inserted text will receive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingStyles {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub text_color: Option<Color>,
    pub highlight: Option<usize>,
}

impl PendingStyles {
    /// Styles of the character just before `offset`.
    ///
    /// Only user colors and palette highlights are adopted; colors the
    /// reconciler derives for excerpts are not.
    pub fn at(doc: &Document, offset: usize) -> Self {
        let mut pending = Self::default();
        let Some(prev) = doc.prev_char_boundary(offset) else {
            return pending;
        };
        for span in doc.spans_at(prev) {
            match span.kind {
                SpanKind::Bold => pending.bold = true,
                SpanKind::Italic => pending.italic = true,
                SpanKind::Underline => pending.underline = true,
                SpanKind::TextColor { color } if span.origin == Origin::User => {
                    pending.text_color = Some(color);
                }
                SpanKind::Highlight {
                    index: Some(index), ..
                } => pending.highlight = Some(index),
                SpanKind::TextColor { .. }
                | SpanKind::Highlight { index: None, .. }
                | SpanKind::AutoColor { .. }
                | SpanKind::Hidden => {}
            }
        }
        pending
    }
}

/// Why sticky formatting is currently switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// The editor is performing its own multi-step mutation.
    Programmatic,
    /// A document is being loaded.
    ContentLoad,
}

/// Advisory reentrancy guard for editor-driven mutations.
///
/// Holding an [`EditTransaction`] marks the gate; dropping it restores the
/// previous state, on early returns and unwinding alike.
#[derive(Debug, Clone, Default)]
pub struct EditGate {
    programmatic: Rc<Cell<bool>>,
    content_load: Rc<Cell<bool>>,
}

impl EditGate {
    pub fn begin(&self, kind: EditKind) -> EditTransaction {
        let flag = match kind {
            EditKind::Programmatic => Rc::clone(&self.programmatic),
            EditKind::ContentLoad => Rc::clone(&self.content_load),
        };
        let previous = flag.replace(true);
        EditTransaction { flag, previous }
    }

    pub fn in_programmatic_edit(&self) -> bool {
        self.programmatic.get()
    }

    pub fn in_content_load(&self) -> bool {
        self.content_load.get()
    }

    pub fn is_suppressed(&self) -> bool {
        self.in_programmatic_edit() || self.in_content_load()
    }
}

#[must_use = "the gate is released as soon as the transaction is dropped"]
#[derive(Debug)]
pub struct EditTransaction {
    flag: Rc<Cell<bool>>,
    previous: bool,
}

impl Drop for EditTransaction {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}
