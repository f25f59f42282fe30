//! Richnote Core - Rich text notes stored as plain text
//!
//! This crate provides the document model, the invisible-marker codec for
//! highlights and quoted excerpts, the reconciler that derives display spans
//! from those markers, and the editing session that decides which styles new
//! text receives. Storage and excerpt lookup are reached through traits.

pub mod codec;
pub mod config;
pub mod cursor;
pub mod editor;
pub mod error;
pub mod excerpt;
pub mod legacy;
pub mod markers;
pub mod model;
pub mod reconcile;
pub mod render;
pub mod sticky;
pub mod store;

pub use codec::{decode, encode, is_json, SerializedDocument, SerializedSpan};
pub use config::{NamedColor, StyleConfig};
pub use editor::{Editor, ToggleStyle};
pub use error::{CodecError, EditError, ExcerptError};
pub use excerpt::{ExcerptRef, ExcerptSource, ExcerptVerse, MemoryExcerptSource};
pub use model::{Boundary, Color, Document, Origin, Span, SpanKind, SpanTag, TextRange};
pub use reconcile::{ReconcileReport, Reconciler};
pub use render::{styled_lines, styled_runs, visible_text, RunStyle, StyledRun};
pub use sticky::{EditGate, EditKind, EditTransaction, PendingStyles};
pub use store::{JsonDirStore, Note, NoteStore, SaveWorker};
