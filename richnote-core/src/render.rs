//! Layout-facing view of a document: runs of visible text with resolved style.
//!
//! Hidden characters never reach a run.

use crate::model::{Color, Document, Origin, SpanKind, TextRange};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub foreground: Option<Color>,
    pub background: Option<Color>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    pub text: String,
    /// Offsets of the run in the document, markers between merged pieces included.
    pub range: TextRange,
    pub style: RunStyle,
}

/// Style at a character, or `None` if it is hidden.
///
/// User text color wins over the excerpt color; a palette highlight wins
/// over a configured excerpt background.
pub fn style_at(doc: &Document, offset: usize) -> Option<RunStyle> {
    let mut style = RunStyle::default();
    let mut auto_color = None;
    let mut plain_background = None;
    for span in doc.spans_at(offset) {
        match span.kind {
            SpanKind::Hidden => return None,
            SpanKind::Bold => style.bold = true,
            SpanKind::Italic => style.italic = true,
            SpanKind::Underline => style.underline = true,
            SpanKind::TextColor { color } => {
                if span.origin == Origin::User || style.foreground.is_none() {
                    style.foreground = Some(color);
                }
            }
            SpanKind::AutoColor { color } => auto_color = Some(color),
            SpanKind::Highlight { color, index: Some(_) } => style.background = Some(color),
            SpanKind::Highlight { color, index: None } => plain_background = Some(color),
        }
    }
    style.foreground = style.foreground.or(auto_color);
    style.background = style.background.or(plain_background);
    Some(style)
}

/// Visible text of the document, split into maximal runs of equal style.
pub fn styled_runs(doc: &Document) -> Vec<StyledRun> {
    let mut breaks: Vec<usize> = doc
        .spans()
        .iter()
        .flat_map(|span| [span.range.start, span.range.end])
        .chain([0, doc.len()])
        .collect();
    breaks.sort_unstable();
    breaks.dedup();

    let mut runs: Vec<StyledRun> = Vec::new();
    for pair in breaks.windows(2) {
        let range = TextRange::new(pair[0], pair[1]);
        let (Some(text), Some(style)) = (doc.slice(range), style_at(doc, range.start)) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        match runs.last_mut() {
            Some(last) if last.style == style => {
                last.text.push_str(text);
                last.range = TextRange::new(last.range.start, range.end);
            }
            _ => runs.push(StyledRun {
                text: text.to_string(),
                range,
                style,
            }),
        }
    }
    runs
}

/// [`styled_runs`] split at line breaks; every line is a list of runs.
pub fn styled_lines(doc: &Document) -> Vec<Vec<StyledRun>> {
    let mut lines = vec![Vec::new()];
    for run in styled_runs(doc) {
        let mut offset = run.range.start;
        for (i, piece) in run.text.split('\n').enumerate() {
            if i > 0 {
                lines.push(Vec::new());
                offset += 1;
            }
            if !piece.is_empty() {
                if let Some(line) = lines.last_mut() {
                    line.push(StyledRun {
                        text: piece.to_string(),
                        range: TextRange::new(offset, offset + piece.len()),
                        style: run.style,
                    });
                }
            }
            offset += piece.len();
        }
    }
    lines
}

/// The document as displayed, markers removed.
pub fn visible_text(doc: &Document) -> String {
    styled_runs(doc).into_iter().map(|run| run.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleConfig;
    use crate::markers::{is_marker, open_token, HL_CLOSE, QUOTE};
    use crate::model::Span;
    use crate::reconcile::Reconciler;

    fn reconciled(text: &str) -> Document {
        let mut doc = Document::from_text(text);
        Reconciler::new(&StyleConfig::default()).reconcile(&mut doc);
        doc
    }

    #[test]
    fn test_markers_never_reach_runs() {
        let doc = reconciled(&format!("a {}hi{HL_CLOSE} {QUOTE}v{QUOTE}\nz", open_token(0)));
        let runs = styled_runs(&doc);
        assert!(runs.iter().all(|run| !run.text.chars().any(is_marker)));
        assert_eq!(visible_text(&doc), "a hi v\nz");
    }

    #[test]
    fn test_highlight_and_excerpt_styles() {
        let config = StyleConfig::default();
        let doc = reconciled(&format!("{}hi{HL_CLOSE} {QUOTE}v{QUOTE}", open_token(1)));
        let runs = styled_runs(&doc);
        let texts: Vec<_> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["hi", " ", "v"]);
        assert_eq!(runs[0].style.background, config.highlight_color(1));
        assert_eq!(runs[2].style.foreground, Some(config.excerpt_color));
    }

    #[test]
    fn test_user_color_beats_excerpt_color() {
        let text = format!("{QUOTE}World{QUOTE}");
        let mut doc = Document::from_text(text);
        let red = Color(0xFFFF_0000);
        // computed AutoColor alongside a user color, as a stale document might carry
        doc.add_span(Span::computed(SpanKind::AutoColor { color: Color(0xFF00_00FF) }, 3, 8)).unwrap();
        doc.add_span(Span::user(SpanKind::TextColor { color: red }, 3, 8)).unwrap();
        assert_eq!(style_at(&doc, 3).unwrap().foreground, Some(red));
    }

    #[test]
    fn test_runs_merge_across_equal_style_and_split_lines() {
        let mut doc = Document::from_text("ab\ncd");
        doc.add_span(Span::user(SpanKind::Bold, 1, 4)).unwrap();
        let lines = styled_lines(&doc);
        assert_eq!(lines.len(), 2);
        let first: Vec<_> = lines[0].iter().map(|r| (r.text.as_str(), r.style.bold)).collect();
        assert_eq!(first, vec![("a", false), ("b", true)]);
        let second: Vec<_> = lines[1].iter().map(|r| (r.text.as_str(), r.style.bold)).collect();
        assert_eq!(second, vec![("c", true), ("d", false)]);
        assert_eq!(lines[1][0].range, TextRange::new(3, 4));
    }
}
