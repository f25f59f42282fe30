use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::codec;
use crate::config::StyleConfig;
use crate::cursor::{self, LineIndex};
use crate::error::{CodecError, EditError, ExcerptError};
use crate::excerpt::{self, ExcerptRef, ExcerptSource};
use crate::markers;
use crate::model::{Color, Document, Origin, Span, SpanKind, SpanTag, TextRange};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::sticky::{EditGate, EditKind, PendingStyles};
use crate::store::Note;

/// Styles that flip on and off as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleStyle {
    Bold,
    Italic,
    Underline,
}

impl ToggleStyle {
    pub fn kind(&self) -> SpanKind {
        match self {
            ToggleStyle::Bold => SpanKind::Bold,
            ToggleStyle::Italic => SpanKind::Italic,
            ToggleStyle::Underline => SpanKind::Underline,
        }
    }
}

/// Editing session over a single document
///
/// Owns the document, the cursor and selection, and the pending styles that
/// newly inserted text picks up. Every mutation leaves the computed spans
/// reconciled with the markers in the text.
pub struct Editor {
    document: Document,
    config: StyleConfig,
    cursor: usize,
    selection: Option<TextRange>,
    pending: PendingStyles,
    manual_override: Option<usize>,
    gate: EditGate,

    // Storage identity of the note being edited
    note_id: Uuid,
    pinned: bool,
}

impl Editor {
    pub fn new(config: StyleConfig) -> Self {
        let pending = PendingStyles {
            highlight: config.initial_highlight(),
            ..PendingStyles::default()
        };
        Self {
            document: Document::new(),
            config,
            cursor: 0,
            selection: None,
            pending,
            manual_override: None,
            gate: EditGate::default(),
            note_id: Uuid::new_v4(),
            pinned: false,
        }
    }

    /// Create an editor and load serialized `content` into it.
    pub fn with_content(config: StyleConfig, content: &str) -> Self {
        let mut editor = Self::new(config);
        editor.load(content);
        editor
    }

    /// Open a stored note; later snapshots keep its identity.
    pub fn open(config: StyleConfig, note: &Note) -> Self {
        let mut editor = Self::with_content(config, &note.content);
        editor.note_id = note.id;
        editor.pinned = note.pinned;
        editor
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &StyleConfig {
        &self.config
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Cursor as (row, col), with columns counted in characters.
    pub fn cursor_position(&self) -> (usize, usize) {
        let text = self.document.text();
        LineIndex::new(text).offset_to_position(text, self.cursor)
    }

    pub fn selection(&self) -> Option<TextRange> {
        self.selection
    }

    pub fn pending(&self) -> &PendingStyles {
        &self.pending
    }

    pub fn manual_override(&self) -> Option<usize> {
        self.manual_override
    }

    pub fn gate(&self) -> &EditGate {
        &self.gate
    }

    pub fn note_id(&self) -> Uuid {
        self.note_id
    }

    /// Replace the document with decoded `content`.
    pub fn load(&mut self, content: &str) -> ReconcileReport {
        let report = {
            let _tx = self.gate.begin(EditKind::ContentLoad);
            self.document = codec::decode(content, &self.config);
            self.reconcile()
        };
        self.cursor = 0;
        self.selection = None;
        self.manual_override = None;
        self.pending = PendingStyles {
            highlight: self.config.initial_highlight(),
            ..PendingStyles::default()
        };
        debug!(len = self.document.len(), ?report, "loaded document");
        report
    }

    /// Rebuild computed spans from the markers in the text.
    pub fn reconcile(&mut self) -> ReconcileReport {
        Reconciler::new(&self.config).reconcile(&mut self.document)
    }

    /// Type `text` at the cursor, replacing the selection if there is one.
    pub fn insert(&mut self, text: &str) -> Result<TextRange, EditError> {
        match self.selection {
            Some(range) => {
                let range = markers::expand_range(self.document.text(), range);
                self.delete(range)?;
                self.insert_at(range.start, text)
            }
            None => self.insert_at(self.cursor, text),
        }
    }

    /// Insert `text` at `pos`, giving it the pending styles.
    ///
    /// Returns the range of the inserted text after any highlight markers were
    /// placed around it. The cursor ends up after the inserted text, inside
    /// the highlight region when one was applied.
    pub fn insert_at(&mut self, pos: usize, text: &str) -> Result<TextRange, EditError> {
        self.document.check_offset(pos)?;
        if text.is_empty() {
            return Ok(TextRange::new(pos, pos));
        }

        let suppressed = self.gate.is_suppressed();
        let content = {
            let _tx = self.gate.begin(EditKind::Programmatic);
            self.document.insert(pos, text)?;
            let inserted = TextRange::new(pos, pos + text.len());
            let content = if suppressed {
                inserted
            } else {
                let pending = self.pending.clone();
                let content =
                    markers::apply_highlight(&mut self.document, inserted, pending.highlight)?
                        .map(|edit| edit.content)
                        .unwrap_or(inserted);
                self.apply_pending(&pending, content)?;
                content
            };
            self.reconcile();
            content
        };

        self.selection = None;
        self.move_cursor(content.end);
        Ok(content)
    }

    /// Remove `range` from the text.
    pub fn delete(&mut self, range: TextRange) -> Result<(), EditError> {
        self.document.check_range(range.start, range.end)?;
        {
            let _tx = self.gate.begin(EditKind::Programmatic);
            self.document.delete(range.start, range.end)?;
            self.reconcile();
        }
        self.selection = None;
        self.move_cursor(range.start);
        Ok(())
    }

    /// Delete the selection, or the closest visible character before the cursor.
    ///
    /// Returns false when there was nothing to delete.
    pub fn backspace(&mut self) -> Result<bool, EditError> {
        if let Some(range) = self.selection {
            self.delete(range)?;
            return Ok(true);
        }
        match cursor::prev_visible_char(&self.document, self.cursor) {
            Some(range) => {
                self.delete(range)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn set_cursor(&mut self, pos: usize) -> Result<(), EditError> {
        self.document.check_offset(pos)?;
        self.selection = None;
        self.move_cursor(pos);
        Ok(())
    }

    /// Select `[start, end)`; the cursor moves to `end`. An empty range only moves the cursor.
    pub fn select(&mut self, start: usize, end: usize) -> Result<(), EditError> {
        let range = TextRange::new(start, end);
        self.document.check_range(range.start, range.end)?;
        if range.is_empty() {
            return self.set_cursor(range.start);
        }
        self.selection = Some(range);
        self.cursor = range.end;
        Ok(())
    }

    pub fn toggle_bold(&mut self) -> Result<(), EditError> {
        self.toggle(ToggleStyle::Bold)
    }

    pub fn toggle_italic(&mut self) -> Result<(), EditError> {
        self.toggle(ToggleStyle::Italic)
    }

    pub fn toggle_underline(&mut self) -> Result<(), EditError> {
        self.toggle(ToggleStyle::Underline)
    }

    /// Flip a style over the selection, or the pending style when nothing is selected.
    ///
    /// A selection that already carries the style anywhere loses it; otherwise
    /// the whole selection gains it with inclusive edges.
    pub fn toggle(&mut self, style: ToggleStyle) -> Result<(), EditError> {
        let Some(range) = self.selection else {
            let flag = match style {
                ToggleStyle::Bold => &mut self.pending.bold,
                ToggleStyle::Italic => &mut self.pending.italic,
                ToggleStyle::Underline => &mut self.pending.underline,
            };
            *flag = !*flag;
            self.manual_override = Some(self.cursor);
            return Ok(());
        };

        let kind = style.kind();
        let TextRange { start, end } = range;
        let _tx = self.gate.begin(EditKind::Programmatic);
        if self.document.has_span_in(kind.tag(), Origin::User, start, end) {
            self.document.clear_range(kind.tag(), Origin::User, start, end)?;
        } else {
            self.document.add_span(Span::user(kind, start, end).inclusive())?;
        }
        Ok(())
    }

    /// Set (or with `None` remove) the text color of the selection, or the pending color.
    pub fn choose_text_color(&mut self, color: Option<Color>) -> Result<(), EditError> {
        let Some(TextRange { start, end }) = self.selection else {
            self.pending.text_color = color;
            self.manual_override = Some(self.cursor);
            return Ok(());
        };

        let _tx = self.gate.begin(EditKind::Programmatic);
        self.document.clear_range(SpanTag::TextColor, Origin::User, start, end)?;
        if let Some(color) = color {
            self.document.add_span(Span::user(SpanKind::TextColor { color }, start, end))?;
        }
        // excerpt auto color depends on user color
        self.reconcile();
        Ok(())
    }

    /// Highlight the selection with palette slot `index`, or clear it with `None`.
    /// Without a selection this sets the pending highlight.
    ///
    /// Indices outside the palette are ignored.
    pub fn choose_highlight(&mut self, index: Option<usize>) -> Result<(), EditError> {
        if let Some(index) = index {
            if !self.config.is_valid_highlight(index) {
                warn!(index, "ignoring highlight outside the palette");
                return Ok(());
            }
        }

        let Some(range) = self.selection else {
            self.pending.highlight = index;
            self.manual_override = Some(self.cursor);
            return Ok(());
        };

        let edit = {
            let _tx = self.gate.begin(EditKind::Programmatic);
            let edit = markers::apply_highlight(&mut self.document, range, index)?;
            self.reconcile();
            edit
        };
        if let Some(edit) = edit {
            self.selection = Some(edit.content);
            self.cursor = edit.content.end;
        }
        Ok(())
    }

    /// Insert a quoted excerpt block at `pos`.
    ///
    /// The block never lands inside a highlight region: a region around `pos`
    /// is closed before the block and re-opened after it.
    pub fn insert_excerpt(&mut self, pos: usize, label: &str, text: &str) -> Result<TextRange, EditError> {
        let block = excerpt::format_block(label, text);
        self.insert_block(pos, &block)
    }

    /// Replace an `@Reference ` trigger just before the cursor with the passage it names.
    ///
    /// Returns `Ok(None)` when there is no trigger. On lookup failure the
    /// trigger text is left as typed.
    pub fn expand_reference(
        &mut self,
        source: &dyn ExcerptSource,
    ) -> Result<Option<TextRange>, ExcerptError> {
        let before = self.document.text().get(..self.cursor).unwrap_or_default();
        let Some(trigger) = excerpt::find_trigger(before) else {
            return Ok(None);
        };

        let reference = ExcerptRef::parse(source.source_id(), &trigger.reference)?;
        let verses = source.lookup(&reference)?;
        let passage = excerpt::format_passage(&reference, &verses);
        if passage.is_empty() {
            return Err(ExcerptError::NotFound(reference.to_string()));
        }

        {
            let _tx = self.gate.begin(EditKind::Programmatic);
            self.document.delete(trigger.range.start, trigger.range.end)?;
        }
        let range = self.insert_block(trigger.range.start, &passage)?;
        debug!(%reference, verses = verses.len(), "expanded reference");
        Ok(Some(range))
    }

    /// The document in its serialized interchange form.
    pub fn serialize(&self) -> Result<String, CodecError> {
        codec::encode(&self.document, &self.config)
    }

    /// An immutable copy of the document for storage.
    pub fn snapshot(&self, title: &str) -> Result<Note, CodecError> {
        Ok(Note {
            id: self.note_id,
            title: title.to_string(),
            content: self.serialize()?,
            updated_at: Utc::now(),
            pinned: self.pinned,
        })
    }

    fn insert_block(&mut self, pos: usize, block: &str) -> Result<TextRange, EditError> {
        self.document.check_offset(pos)?;
        if block.is_empty() {
            return Ok(TextRange::new(pos, pos));
        }

        let content = {
            let _tx = self.gate.begin(EditKind::Programmatic);
            self.document.insert(pos, block)?;
            let inserted = TextRange::new(pos, pos + block.len());
            let content = markers::unwrap_highlight(&mut self.document, inserted)?
                .map(|edit| edit.content)
                .unwrap_or(inserted);
            let pending = PendingStyles {
                highlight: None,
                ..self.pending.clone()
            };
            self.apply_pending(&pending, content)?;
            self.reconcile();
            content
        };

        self.selection = None;
        self.move_cursor(content.end);
        Ok(content)
    }

    /// Lay the pending styles over `range`, removing the ones not pending.
    fn apply_pending(&mut self, pending: &PendingStyles, range: TextRange) -> Result<(), EditError> {
        if range.is_empty() {
            return Ok(());
        }
        let TextRange { start, end } = range;
        let toggles = [
            (SpanKind::Bold, pending.bold),
            (SpanKind::Italic, pending.italic),
            (SpanKind::Underline, pending.underline),
        ];
        for (kind, on) in toggles {
            self.document.clear_range(kind.tag(), Origin::User, start, end)?;
            if on {
                self.document.add_span(Span::user(kind, start, end))?;
            }
        }

        self.document.clear_range(SpanTag::TextColor, Origin::User, start, end)?;
        if let Some(color) = pending.text_color {
            self.document.add_span(Span::user(SpanKind::TextColor { color }, start, end))?;
        }
        Ok(())
    }

    /// Move the cursor and re-derive the pending styles from the text before it.
    fn move_cursor(&mut self, pos: usize) {
        self.cursor = pos;
        if self.gate.is_suppressed() || self.manual_override == Some(pos) {
            return;
        }
        self.manual_override = None;
        self.pending = PendingStyles::at(&self.document, pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excerpt::MemoryExcerptSource;
    use crate::markers::{highlight_regions, open_token, quote_regions, HL_CLOSE, QUOTE};

    fn editor(text: &str) -> Editor {
        Editor::with_content(StyleConfig::default(), text)
    }

    fn ranges(editor: &Editor, tag: SpanTag) -> Vec<TextRange> {
        let doc = editor.document();
        doc.spans_in(tag, 0, doc.len()).iter().map(|s| s.range).collect()
    }

    #[test]
    fn test_sticky_bold_insert() {
        let mut ed = editor("xy");
        ed.set_cursor(1).unwrap();
        ed.toggle_bold().unwrap();
        assert_eq!(ed.manual_override(), Some(1));

        ed.insert("ab").unwrap();
        assert_eq!(ed.document().text(), "xaby");
        assert_eq!(ranges(&ed, SpanTag::Bold), vec![TextRange::new(1, 3)]);
        assert_eq!(ed.cursor(), 3);
        assert_eq!(ed.cursor_position(), (0, 3));
        assert!(ed.pending().bold);
    }

    #[test]
    fn test_sticky_off_inside_bold_splits_span() {
        let mut ed = editor("abcdef");
        ed.select(0, 6).unwrap();
        ed.toggle_bold().unwrap();
        ed.set_cursor(3).unwrap();
        assert!(ed.pending().bold);

        ed.toggle_bold().unwrap();
        ed.insert("x").unwrap();
        assert_eq!(ed.document().text(), "abcxdef");
        assert_eq!(
            ranges(&ed, SpanTag::Bold),
            vec![TextRange::new(0, 3), TextRange::new(4, 7)]
        );
        assert!(!ed.pending().bold);
    }

    #[test]
    fn test_sticky_text_color_insert() {
        let red = Color(0xFFD3_2F2F);
        let mut ed = editor("ab");
        ed.set_cursor(2).unwrap();
        ed.choose_text_color(Some(red)).unwrap();
        ed.insert("cd").unwrap();

        let doc = ed.document();
        let colors: Vec<_> = doc
            .spans_in(SpanTag::TextColor, 0, doc.len())
            .iter()
            .map(|s| (s.range, s.kind.color()))
            .collect();
        assert_eq!(colors, vec![(TextRange::new(2, 4), Some(red))]);
        assert_eq!(ed.pending().text_color, Some(red));
    }

    #[test]
    fn test_excerpt_takes_pending_text_color() {
        let red = Color(0xFFD3_2F2F);
        let mut ed = editor("");
        ed.choose_text_color(Some(red)).unwrap();
        let range = ed.insert_excerpt(0, "John 3:16", "For God").unwrap();

        assert_eq!(ranges(&ed, SpanTag::TextColor), vec![range]);
        assert!(ranges(&ed, SpanTag::AutoColor).is_empty());
    }

    #[test]
    fn test_replacing_selection_with_nothing_reconciles() {
        let mut ed = editor(&format!("{}ab{HL_CLOSE}cd", open_token(0)));
        let b = ed.document().text().find('b').unwrap();
        let c = ed.document().text().find('c').unwrap();
        ed.select(b, c + 1).unwrap();

        let range = ed.insert("").unwrap();
        assert_eq!(ed.document().text(), format!("{}ad", open_token(0)));
        assert_eq!(range, TextRange::new(b, b));
        assert_eq!(ed.cursor(), b);
        assert_eq!(ed.selection(), None);

        let mut fresh = ed.document().clone();
        Reconciler::new(ed.config()).reconcile(&mut fresh);
        assert_eq!(&fresh, ed.document());
        assert!(ranges(&ed, SpanTag::Highlight).is_empty());
    }

    #[test]
    fn test_manual_override_holds_until_cursor_leaves() {
        let mut ed = editor("hello");
        ed.set_cursor(5).unwrap();
        ed.toggle_bold().unwrap();
        ed.set_cursor(5).unwrap();
        assert!(ed.pending().bold);

        ed.set_cursor(2).unwrap();
        assert!(!ed.pending().bold);
        assert_eq!(ed.manual_override(), None);
    }

    #[test]
    fn test_pending_follows_cursor() {
        let mut ed = editor("hello world");
        ed.select(0, 5).unwrap();
        ed.toggle_italic().unwrap();
        ed.set_cursor(3).unwrap();
        assert!(ed.pending().italic);
        ed.set_cursor(8).unwrap();
        assert!(!ed.pending().italic);
    }

    #[test]
    fn test_selection_toggle_adds_then_removes() {
        let mut ed = editor("hello world");
        ed.select(6, 11).unwrap();
        ed.toggle_underline().unwrap();
        let spans = ed.document().spans_in(SpanTag::Underline, 0, 11);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].boundary, crate::model::Boundary::Inclusive);

        ed.select(6, 11).unwrap();
        ed.toggle_underline().unwrap();
        assert!(ranges(&ed, SpanTag::Underline).is_empty());
    }

    #[test]
    fn test_sticky_highlight_across_keystrokes() {
        let mut ed = editor("");
        ed.choose_highlight(Some(1)).unwrap();
        ed.insert("a").unwrap();
        ed.insert("b").unwrap();
        assert_eq!(ed.document().text(), format!("{}ab{HL_CLOSE}", open_token(1)));
        assert_eq!(highlight_regions(ed.document().text()).len(), 1);
        assert_eq!(ed.pending().highlight, Some(1));

        ed.choose_highlight(None).unwrap();
        ed.insert("c").unwrap();
        assert_eq!(ed.document().text(), format!("{}ab{HL_CLOSE}c", open_token(1)));
    }

    #[test]
    fn test_out_of_palette_highlight_is_ignored() {
        let mut ed = editor("abc");
        ed.select(0, 3).unwrap();
        ed.choose_highlight(Some(42)).unwrap();
        assert_eq!(ed.document().text(), "abc");
    }

    #[test]
    fn test_selection_highlight_selects_content() {
        let mut ed = editor("hello world");
        ed.select(6, 11).unwrap();
        ed.choose_highlight(Some(0)).unwrap();
        let selection = ed.selection().unwrap();
        assert_eq!(ed.document().slice(selection), Some("world"));
        assert_eq!(ranges(&ed, SpanTag::Highlight), vec![selection]);
    }

    #[test]
    fn test_suppressed_insert_gets_no_sticky_styles() {
        let config = StyleConfig {
            default_highlight: Some(0),
            ..StyleConfig::default()
        };
        let mut ed = Editor::with_content(config, "plain");
        assert_eq!(ed.document().text(), "plain");
        assert_eq!(ed.pending().highlight, Some(0));

        let tx = ed.gate().begin(EditKind::Programmatic);
        ed.insert_at(5, "!").unwrap();
        drop(tx);
        assert_eq!(ed.document().text(), "plain!");
        assert!(!ed.gate().is_suppressed());
    }

    #[test]
    fn test_user_color_suppresses_excerpt_color() {
        let mut ed = editor(&format!("Hello {QUOTE}World{QUOTE}"));
        assert_eq!(ranges(&ed, SpanTag::AutoColor).len(), 1);

        let world = ed.document().text().find("World").unwrap();
        ed.select(world, world + 5).unwrap();
        ed.choose_text_color(Some(Color(0xFFFF_0000))).unwrap();
        assert!(ranges(&ed, SpanTag::AutoColor).is_empty());

        ed.choose_text_color(None).unwrap();
        assert_eq!(ranges(&ed, SpanTag::AutoColor).len(), 1);
    }

    #[test]
    fn test_excerpt_inside_highlight_is_flattened() {
        let mut ed = editor(&format!("{}abcd{HL_CLOSE}", open_token(0)));
        let c = ed.document().text().find('c').unwrap();
        ed.insert_excerpt(c, "John 3:16", "For God").unwrap();

        let block = excerpt::format_block("John 3:16", "For God");
        let expected = format!(
            "{}ab{HL_CLOSE}{block}{}cd{HL_CLOSE}",
            open_token(0),
            open_token(0)
        );
        assert_eq!(ed.document().text(), expected);
        assert_eq!(highlight_regions(ed.document().text()).len(), 2);
        assert_eq!(quote_regions(ed.document().text()).len(), 1);
        assert_eq!(ranges(&ed, SpanTag::AutoColor).len(), 1);
    }

    #[test]
    fn test_backspace_skips_hidden_markers() {
        let mut ed = editor(&format!("{}ab{HL_CLOSE}c", open_token(0)));
        let c = ed.document().text().find('c').unwrap();
        ed.set_cursor(c).unwrap();
        assert!(ed.backspace().unwrap());
        assert_eq!(ed.document().text(), format!("{}a{HL_CLOSE}c", open_token(0)));

        let mut empty = editor("");
        assert!(!empty.backspace().unwrap());
    }

    #[test]
    fn test_expand_reference() {
        let source = MemoryExcerptSource::new("KJV").with_verse("John", 3, 16, "For God so loved");
        let mut ed = editor("See @John 3:16 ");
        ed.set_cursor(ed.document().len()).unwrap();

        let range = ed.expand_reference(&source).unwrap().unwrap();
        assert_eq!(
            ed.document().text(),
            format!("See John 3:16\n{QUOTE}\"For God so loved\"{QUOTE}")
        );
        assert_eq!(range.end, ed.document().len());

        let mut missing = editor("@John 9:99 ");
        missing.set_cursor(missing.document().len()).unwrap();
        assert!(matches!(missing.expand_reference(&source), Err(ExcerptError::NotFound(_))));
        assert_eq!(missing.document().text(), "@John 9:99 ");

        let mut plain = editor("no trigger");
        assert_eq!(plain.expand_reference(&source), Ok(None));
    }

    #[test]
    fn test_rejected_edits_leave_document_untouched() {
        let mut ed = editor("héllo");
        let before = ed.document().clone();
        assert!(ed.insert_at(2, "x").is_err());
        assert!(ed.delete(TextRange::new(0, 99)).is_err());
        assert!(ed.set_cursor(99).is_err());
        assert_eq!(ed.document(), &before);
    }

    #[test]
    fn test_snapshot_keeps_note_identity() {
        let note = Note::new("Sermon", "hello");
        let mut ed = Editor::open(StyleConfig::default(), &note);
        ed.set_cursor(5).unwrap();
        ed.insert(" world").unwrap();

        let snapshot = ed.snapshot("Sermon").unwrap();
        assert_eq!(snapshot.id, note.id);
        let reloaded = editor(&snapshot.content);
        assert_eq!(reloaded.document().text(), "hello world");
    }
}
