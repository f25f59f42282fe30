//! File I/O for the CLI

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use richnote_core::StyleConfig;

/// Read a document file
pub fn load_file(path: &Path) -> Result<String> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve path: {}", path.display()))?;

    fs::read_to_string(&canonical)
        .with_context(|| format!("Failed to read file: {}", canonical.display()))
}

/// Title derived from the file name
pub fn title_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string())
}

/// Load the style config from `path`, or from ~/.richnote/config.toml
pub fn load_config(path: Option<&Path>) -> Result<StyleConfig> {
    match path {
        Some(path) => StyleConfig::load_from(path),
        None => StyleConfig::load(),
    }
}

/// Write `content` to `path`, or to stdout
pub fn write_output(path: Option<&PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{content}").context("Failed to write to stdout")
        }
    }
}
