use thiserror::Error;

/// Rejected edits. The document is left untouched whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("range {start}..{end} is out of bounds for text of length {len}")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("offset {offset} is not on a character boundary")]
    NotCharBoundary { offset: usize },

    #[error("empty range at offset {offset}")]
    EmptyRange { offset: usize },
}

/// Failures while reading the serialized document format.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed document JSON: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Failures reported by excerpt lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExcerptError {
    #[error("not a valid reference: {0:?}")]
    InvalidReference(String),

    #[error("no excerpt found for {0}")]
    NotFound(String),

    #[error("excerpt lookup failed: {0}")]
    Lookup(String),

    #[error(transparent)]
    Edit(#[from] EditError),
}
