pub mod color;
pub mod document;
pub mod span;
pub mod text_range;

pub use color::{Color, ParseColorError};
pub use document::Document;
pub use span::{Boundary, Origin, Span, SpanKind, SpanTag};
pub use text_range::TextRange;
