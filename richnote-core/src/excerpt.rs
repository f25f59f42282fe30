//! Quoted excerpts looked up by reference, e.g. `John 3:16` or `1 Samuel 2:10-12`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ExcerptError;
use crate::markers::{is_marker, QUOTE};
use crate::model::TextRange;

static TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(@([a-zA-Z0-9\s]+ [0-9]+:[0-9]+(?:-[0-9]+)?))\s+$").expect("valid regex")
});

/// A passage address within one source (translation).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExcerptRef {
    pub source_id: String,
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub end_verse: Option<u32>,
}

impl ExcerptRef {
    /// Parse `Book Chapter:Verse` or `Book Chapter:Start-End`.
    pub fn parse(source_id: &str, reference: &str) -> Result<Self, ExcerptError> {
        let invalid = || ExcerptError::InvalidReference(reference.to_string());

        let (book, location) = reference.trim().rsplit_once(char::is_whitespace).ok_or_else(invalid)?;
        let book = book.split_whitespace().collect::<Vec<_>>().join(" ");
        if book.is_empty() {
            return Err(invalid());
        }

        let (chapter, verses) = location.split_once(':').ok_or_else(invalid)?;
        let chapter = chapter.parse().map_err(|_| invalid())?;
        let (verse, end_verse) = match verses.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start.parse().map_err(|_| invalid())?;
                let end: u32 = end.parse().map_err(|_| invalid())?;
                if end < start {
                    return Err(invalid());
                }
                (start, (end > start).then_some(end))
            }
            None => (verses.parse().map_err(|_| invalid())?, None),
        };

        Ok(Self {
            source_id: source_id.to_string(),
            book,
            chapter,
            verse,
            end_verse,
        })
    }

    /// Verse numbers covered, inclusive.
    pub fn verses(&self) -> std::ops::RangeInclusive<u32> {
        self.verse..=self.end_verse.unwrap_or(self.verse)
    }

    pub fn is_range(&self) -> bool {
        self.end_verse.is_some()
    }
}

impl fmt::Display for ExcerptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.book, self.chapter, self.verse)?;
        if let Some(end) = self.end_verse {
            write!(f, "-{end}")?;
        }
        Ok(())
    }
}

/// One verse returned by a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcerptVerse {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

impl ExcerptVerse {
    pub fn label(&self) -> String {
        format!("{} {}:{}", self.book, self.chapter, self.verse)
    }
}

/// Supplies excerpt text for references.
pub trait ExcerptSource {
    /// Identifier of the translation this source serves.
    fn source_id(&self) -> &str;

    /// Every verse of `reference`, in order. Partial results are an error.
    fn lookup(&self, reference: &ExcerptRef) -> Result<Vec<ExcerptVerse>, ExcerptError>;
}

/// Excerpt source backed by a map, for tests and offline use.
#[derive(Debug, Clone, Default)]
pub struct MemoryExcerptSource {
    source_id: String,
    verses: BTreeMap<(String, u32, u32), ExcerptVerse>,
}

impl MemoryExcerptSource {
    pub fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            verses: BTreeMap::new(),
        }
    }

    pub fn with_verse(mut self, book: &str, chapter: u32, verse: u32, text: &str) -> Self {
        self.add_verse(book, chapter, verse, text);
        self
    }

    pub fn add_verse(&mut self, book: &str, chapter: u32, verse: u32, text: &str) {
        self.verses.insert(
            (book.to_lowercase(), chapter, verse),
            ExcerptVerse {
                book: book.to_string(),
                chapter,
                verse,
                text: text.to_string(),
            },
        );
    }
}

impl ExcerptSource for MemoryExcerptSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn lookup(&self, reference: &ExcerptRef) -> Result<Vec<ExcerptVerse>, ExcerptError> {
        if reference.source_id != self.source_id {
            return Err(ExcerptError::Lookup(format!(
                "source {} cannot serve {}",
                self.source_id, reference.source_id
            )));
        }
        let book = reference.book.to_lowercase();
        reference
            .verses()
            .map(|verse| {
                self.verses
                    .get(&(book.clone(), reference.chapter, verse))
                    .cloned()
                    .ok_or_else(|| ExcerptError::NotFound(reference.to_string()))
            })
            .collect()
    }
}

/// An `@Reference` typed just before the cursor, trailing whitespace included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Everything to replace: the `@`, the reference and the whitespace after it.
    pub range: TextRange,
    pub reference: String,
}

/// Look for a trigger at the very end of `before_cursor`.
pub fn find_trigger(before_cursor: &str) -> Option<Trigger> {
    let caps = TRIGGER.captures(before_cursor)?;
    let whole = caps.get(0)?;
    let reference = caps.get(2)?.as_str().trim().to_string();
    Some(Trigger {
        range: TextRange::new(whole.start(), whole.end()),
        reference,
    })
}

/// The excerpt block: a label line followed by the quoted text.
///
/// Marker characters in the inputs are dropped so the block holds exactly one quote pair.
pub fn format_block(label: &str, text: &str) -> String {
    format!(
        "{}\n{QUOTE}\"{}\"{QUOTE}",
        sanitize(label),
        sanitize(text)
    )
}

/// Blocks for every verse of a lookup, separated by blank lines.
///
/// A single verse is labelled with the reference as written.
pub fn format_passage(reference: &ExcerptRef, verses: &[ExcerptVerse]) -> String {
    match verses {
        [] => String::new(),
        [verse] if !reference.is_range() => format_block(&reference.to_string(), &verse.text),
        _ => verses
            .iter()
            .map(|verse| format_block(&verse.label(), &verse.text))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn sanitize(text: &str) -> String {
    text.chars().filter(|&c| !is_marker(c)).collect()
}
