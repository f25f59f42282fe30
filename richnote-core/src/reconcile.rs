//! Derives computed spans from the marker characters in a document.

use tracing::{debug, warn};

use crate::config::StyleConfig;
use crate::markers;
use crate::model::{Document, Origin, Span, SpanKind, SpanTag, TextRange};

/// Upper bound on legacy-migration rewrites in a single pass.
pub const MAX_MIGRATION_PASSES: usize = 3;

/// What a reconciliation pass found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub migrated: bool,
    pub hidden: usize,
    pub excerpts: usize,
    pub highlights: usize,
    /// Highlight regions ignored because their index is unusable.
    pub skipped: usize,
}

/// Rebuilds every [`Origin::Computed`] span of a document from its markers.
///
/// User spans are never touched. Running it twice in a row yields the same
/// span table both times.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    config: &'a StyleConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a StyleConfig) -> Self {
        Self { config }
    }

    pub fn reconcile(&self, doc: &mut Document) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let mut passes = 0;
        while let Some(migrated) = markers::migrate_legacy(doc.text()) {
            if passes == MAX_MIGRATION_PASSES {
                warn!(passes, "legacy marker migration did not settle, continuing as is");
                break;
            }
            doc.rewrite_in_place(migrated);
            report.migrated = true;
            passes += 1;
        }

        doc.remove_spans(Span::is_computed);

        let text = doc.text().to_owned();
        let mut hidden = HiddenRanges::default();

        for token in markers::markers(&text) {
            hidden.hide(doc, token.range);
        }

        for quote in markers::quote_regions(&text) {
            if quote.content.is_empty() {
                continue;
            }
            let TextRange { start, end } = quote.content;
            if !doc.has_span_in(SpanTag::TextColor, Origin::User, start, end) {
                let kind = SpanKind::AutoColor {
                    color: self.config.excerpt_color,
                };
                add_computed(doc, kind, quote.content);
            }
            if let Some(color) = self.config.excerpt_background {
                add_computed(doc, SpanKind::Highlight { color, index: None }, quote.content);
            }
            report.excerpts += 1;
        }

        for region in markers::highlight_regions(&text) {
            hidden.hide(doc, region.open);
            hidden.hide(doc, region.close);

            let resolved = region
                .index
                .and_then(|index| Some((index, self.config.highlight_color(index)?)));
            let Some((index, color)) = resolved else {
                warn!(
                    digits = &text[region.open.as_range()],
                    "skipping highlight with unknown palette index"
                );
                report.skipped += 1;
                continue;
            };
            if !region.content.is_empty() {
                let kind = SpanKind::Highlight {
                    color,
                    index: Some(index),
                };
                add_computed(doc, kind, region.content);
            }
            report.highlights += 1;
        }

        report.hidden = hidden.count;
        debug!(?report, "reconciled document styling");
        report
    }
}

fn add_computed(doc: &mut Document, kind: SpanKind, range: TextRange) {
    if let Err(err) = doc.add_span(Span::computed(kind, range.start, range.end)) {
        warn!(%err, ?range, "dropping computed span");
    }
}

/// Hidden ranges already laid down in this pass.
#[derive(Default)]
struct HiddenRanges {
    ranges: Vec<TextRange>,
    count: usize,
}

impl HiddenRanges {
    fn hide(&mut self, doc: &mut Document, range: TextRange) {
        if range.is_empty() || self.ranges.iter().any(|hidden| hidden.covers(&range)) {
            return;
        }
        self.ranges.push(range);
        self.count += 1;
        add_computed(doc, SpanKind::Hidden, range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::{open_token, HL_CLOSE, HL_OPEN, QUOTE};
    use crate::model::Color;

    fn reconciled(text: &str) -> Document {
        let config = StyleConfig::default();
        let mut doc = Document::from_text(text);
        Reconciler::new(&config).reconcile(&mut doc);
        doc
    }

    fn texts_of(doc: &Document, tag: SpanTag) -> Vec<String> {
        doc.spans()
            .iter()
            .filter(|span| span.tag() == tag)
            .filter_map(|span| doc.slice(span.range).map(str::to_string))
            .collect()
    }

    #[test]
    fn test_highlight_region_gets_palette_color() {
        let config = StyleConfig::default();
        let doc = reconciled(&format!("say {}hi{HL_CLOSE}!", open_token(1)));
        let highlights = doc.spans_in(SpanTag::Highlight, 0, doc.len());
        assert_eq!(highlights.len(), 1);
        assert_eq!(doc.slice(highlights[0].range), Some("hi"));
        assert_eq!(
            highlights[0].kind,
            SpanKind::Highlight {
                color: config.highlight_color(1).unwrap(),
                index: Some(1)
            }
        );
        assert_eq!(texts_of(&doc, SpanTag::Hidden), vec![open_token(1), HL_CLOSE.to_string()]);
    }

    #[test]
    fn test_quote_gets_auto_color_and_hidden_markers() {
        let doc = reconciled(&format!("Hello {QUOTE}World{QUOTE}"));
        assert_eq!(texts_of(&doc, SpanTag::AutoColor), vec!["World"]);
        assert_eq!(texts_of(&doc, SpanTag::Hidden).len(), 2);
    }

    #[test]
    fn test_user_color_takes_precedence_over_auto_color() {
        let config = StyleConfig::default();
        let text = format!("Hello {QUOTE}World{QUOTE}");
        let world = text.find("World").unwrap();
        let mut doc = Document::from_text(text);
        let red = SpanKind::TextColor { color: Color(0xFFFF_0000) };
        doc.add_span(Span::user(red, world, world + 5)).unwrap();

        Reconciler::new(&config).reconcile(&mut doc);
        assert!(doc.spans_in(SpanTag::AutoColor, 0, doc.len()).is_empty());
        assert_eq!(doc.spans_in(SpanTag::TextColor, 0, doc.len()).len(), 1);
    }

    #[test]
    fn test_out_of_palette_index_is_skipped() {
        let config = StyleConfig::default();
        let mut doc = Document::from_text(format!("{}x{HL_CLOSE} and {}y{HL_CLOSE}", open_token(9), open_token(0)));
        let report = Reconciler::new(&config).reconcile(&mut doc);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.highlights, 1);
        assert_eq!(texts_of(&doc, SpanTag::Highlight), vec!["y"]);
        // the markers of the skipped region are still hidden
        assert_eq!(report.hidden, 4);
    }

    #[test]
    fn test_missing_open_marker_is_tolerated() {
        let doc = reconciled(&format!("a {{2}}lost{HL_CLOSE} b"));
        assert_eq!(texts_of(&doc, SpanTag::Highlight), vec!["lost"]);
        assert_eq!(texts_of(&doc, SpanTag::Hidden), vec!["{2}".to_string(), HL_CLOSE.to_string()]);
    }

    #[test]
    fn test_legacy_open_marker_is_migrated_first() {
        let config = StyleConfig::default();
        let mut doc = Document::from_text(format!("{}old{HL_OPEN} text", open_token(0)));
        let report = Reconciler::new(&config).reconcile(&mut doc);
        assert!(report.migrated);
        assert_eq!(doc.text(), format!("{}old{HL_CLOSE} text", open_token(0)));
        assert_eq!(texts_of(&doc, SpanTag::Highlight), vec!["old"]);

        let again = Reconciler::new(&config).reconcile(&mut doc);
        assert!(!again.migrated);
    }

    #[test]
    fn test_reconcile_is_idempotent_and_keeps_user_spans() {
        let config = StyleConfig {
            excerpt_background: Some(Color(0xFF11_2233)),
            ..StyleConfig::default()
        };
        let mut doc = Document::from_text(format!(
            "{}bold{HL_CLOSE} {QUOTE}a\nb{QUOTE} {QUOTE}{QUOTE}",
            open_token(3)
        ));
        doc.add_span(Span::user(SpanKind::Bold, 0, 4)).unwrap();

        let reconciler = Reconciler::new(&config);
        let first_report = reconciler.reconcile(&mut doc);
        let first = doc.clone();
        let second_report = reconciler.reconcile(&mut doc);

        assert_eq!(first, doc);
        assert_eq!(first_report, second_report);
        assert_eq!(doc.spans_in(SpanTag::Bold, 0, doc.len()).len(), 1);
        // the empty quote pair is hidden but styles nothing
        assert_eq!(first_report.excerpts, 1);
        assert_eq!(texts_of(&doc, SpanTag::Highlight), vec!["bold", "a\nb"]);
    }
}
