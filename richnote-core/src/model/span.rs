use serde::{Deserialize, Serialize};

use super::{Color, TextRange};

/// Formatting carried by a span, with its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpanKind {
    Bold,
    Italic,
    Underline,
    TextColor { color: Color },
    /// Background highlight. `index` is the palette slot the color came from,
    /// absent for backgrounds derived from configuration rather than markers.
    Highlight { color: Color, index: Option<usize> },
    /// Foreground applied to quoted excerpts.
    AutoColor { color: Color },
    /// Marker characters that must not be rendered.
    Hidden,
}

impl SpanKind {
    pub fn tag(&self) -> SpanTag {
        match self {
            SpanKind::Bold => SpanTag::Bold,
            SpanKind::Italic => SpanTag::Italic,
            SpanKind::Underline => SpanTag::Underline,
            SpanKind::TextColor { .. } => SpanTag::TextColor,
            SpanKind::Highlight { .. } => SpanTag::Highlight,
            SpanKind::AutoColor { .. } => SpanTag::AutoColor,
            SpanKind::Hidden => SpanTag::Hidden,
        }
    }

    pub fn color(&self) -> Option<Color> {
        match self {
            SpanKind::TextColor { color }
            | SpanKind::Highlight { color, .. }
            | SpanKind::AutoColor { color } => Some(*color),
            SpanKind::Bold | SpanKind::Italic | SpanKind::Underline | SpanKind::Hidden => None,
        }
    }
}

/// Payload-free discriminant of [`SpanKind`], used for "same kind" queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanTag {
    Bold,
    Italic,
    Underline,
    TextColor,
    Highlight,
    AutoColor,
    Hidden,
}

impl SpanTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanTag::Bold => "Bold",
            SpanTag::Italic => "Italic",
            SpanTag::Underline => "Underline",
            SpanTag::TextColor => "Text Color",
            SpanTag::Highlight => "Highlight",
            SpanTag::AutoColor => "Excerpt Color",
            SpanTag::Hidden => "Hidden",
        }
    }
}

/// Who owns a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Applied through a formatting action; survives reconciliation.
    User,
    /// Derived from markers; cleared and rebuilt by every reconciliation pass.
    Computed,
}

/// Whether text inserted exactly at a span's edge joins the span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    #[default]
    Exclusive,
    Inclusive,
}

/// A formatting annotation over a range of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub kind: SpanKind,
    #[serde(flatten)]
    pub range: TextRange,
    pub origin: Origin,
    #[serde(default)]
    pub boundary: Boundary,
}

impl Span {
    pub fn new(kind: SpanKind, range: TextRange, origin: Origin) -> Self {
        Self {
            kind,
            range,
            origin,
            boundary: Boundary::Exclusive,
        }
    }

    pub fn user(kind: SpanKind, start: usize, end: usize) -> Self {
        Self::new(kind, TextRange::new(start, end), Origin::User)
    }

    pub fn computed(kind: SpanKind, start: usize, end: usize) -> Self {
        Self::new(kind, TextRange::new(start, end), Origin::Computed)
    }

    pub fn inclusive(mut self) -> Self {
        self.boundary = Boundary::Inclusive;
        self
    }

    pub fn start(&self) -> usize {
        self.range.start
    }

    pub fn end(&self) -> usize {
        self.range.end
    }

    pub fn tag(&self) -> SpanTag {
        self.kind.tag()
    }

    pub fn is_computed(&self) -> bool {
        self.origin == Origin::Computed
    }

    /// Same formatting and owner, so the two may be merged when they touch.
    pub fn same_style(&self, other: &Span) -> bool {
        self.kind == other.kind && self.origin == other.origin
    }

    /// Copy of this span over a different range.
    pub fn with_range(&self, start: usize, end: usize) -> Self {
        Self {
            range: TextRange::new(start, end),
            ..*self
        }
    }
}
