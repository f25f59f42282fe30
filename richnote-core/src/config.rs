//! Style configuration.
//!
//! Palettes and excerpt colors are passed explicitly to the reconciler and the
//! editor. Loaded from `~/.richnote/config.toml`; every field has a default.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::Color;

/// A palette entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedColor {
    pub name: String,
    pub color: Color,
}

impl NamedColor {
    pub fn new(name: &str, color: Color) -> Self {
        Self {
            name: name.to_string(),
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Foreground for quoted excerpts that carry no user color.
    pub excerpt_color: Color,
    /// Optional background laid under quoted excerpts.
    pub excerpt_background: Option<Color>,
    /// Highlight colors addressed by the index stored in highlight markers.
    pub highlight_palette: Vec<NamedColor>,
    /// Colors offered for user text color.
    pub text_palette: Vec<NamedColor>,
    /// Highlight index that is pending when a document is opened.
    pub default_highlight: Option<usize>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            excerpt_color: Color::rgb(0xB8, 0x86, 0x0B),
            excerpt_background: None,
            highlight_palette: vec![
                NamedColor::new("Gold", Color::rgb(0xFF, 0xE0, 0x82)),
                NamedColor::new("Blue", Color::rgb(0xB3, 0xE5, 0xFC)),
                NamedColor::new("Green", Color::rgb(0xC8, 0xE6, 0xC9)),
                NamedColor::new("Pink", Color::rgb(0xF8, 0xBB, 0xD0)),
                NamedColor::new("Purple", Color::rgb(0xE1, 0xBE, 0xE7)),
                NamedColor::new("Peach", Color::rgb(0xFF, 0xCC, 0xBC)),
            ],
            text_palette: vec![
                NamedColor::new("Black", Color::rgb(0x21, 0x21, 0x21)),
                NamedColor::new("Grey", Color::rgb(0x75, 0x75, 0x75)),
                NamedColor::new("Red", Color::rgb(0xD3, 0x2F, 0x2F)),
                NamedColor::new("Orange", Color::rgb(0xF5, 0x7C, 0x00)),
                NamedColor::new("Yellow", Color::rgb(0xFB, 0xC0, 0x2D)),
                NamedColor::new("Green", Color::rgb(0x38, 0x8E, 0x3C)),
                NamedColor::new("Teal", Color::rgb(0x00, 0x79, 0x6B)),
                NamedColor::new("Blue", Color::rgb(0x19, 0x76, 0xD2)),
                NamedColor::new("Indigo", Color::rgb(0x30, 0x3F, 0x9F)),
                NamedColor::new("Purple", Color::rgb(0x7B, 0x1F, 0xA2)),
                NamedColor::new("Pink", Color::rgb(0xC2, 0x18, 0x5B)),
                NamedColor::new("Brown", Color::rgb(0x5D, 0x40, 0x37)),
            ],
            default_highlight: None,
        }
    }
}

impl StyleConfig {
    /// Loads configuration from `~/.richnote/config.toml`.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(StyleConfig::default())
        }
    }

    pub fn highlight_color(&self, index: usize) -> Option<Color> {
        self.highlight_palette.get(index).map(|entry| entry.color)
    }

    /// Palette slot holding `color`, if any.
    pub fn highlight_index(&self, color: Color) -> Option<usize> {
        self.highlight_palette
            .iter()
            .position(|entry| entry.color == color)
    }

    pub fn is_valid_highlight(&self, index: usize) -> bool {
        index < self.highlight_palette.len()
    }

    /// The configured default sticky highlight, if it names a real palette slot.
    pub fn initial_highlight(&self) -> Option<usize> {
        self.default_highlight
            .filter(|&index| self.is_valid_highlight(index))
    }
}

/// Get the ~/.richnote directory path, creating it if needed
pub fn richnote_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    let dir = home.join(".richnote");

    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(richnote_dir()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = StyleConfig::load_from(&dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config, StyleConfig::default());
        assert_eq!(config.highlight_palette.len(), 6);
        assert_eq!(config.text_palette.len(), 12);
    }

    #[test]
    fn test_load_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r##"
excerpt_color = "#FF0000"
excerpt_background = "#80FFFF00"
default_highlight = 2

[[highlight_palette]]
name = "Mint"
color = "#AAF0D1"
"##,
        )
        .unwrap();

        let config = StyleConfig::load_from(&path).unwrap();
        assert_eq!(config.excerpt_color, Color(0xFFFF_0000));
        assert_eq!(config.excerpt_background, Some(Color(0x80FF_FF00)));
        assert_eq!(config.highlight_palette.len(), 1);
        assert_eq!(config.text_palette.len(), 12);
        // index 2 does not exist in a one-entry palette
        assert_eq!(config.initial_highlight(), None);
    }

    #[test]
    fn test_load_invalid_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "excerpt_color = \"gold\"").unwrap();

        let err = StyleConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn test_palette_lookup() {
        let config = StyleConfig::default();
        let blue = config.highlight_color(1).unwrap();
        assert_eq!(config.highlight_index(blue), Some(1));
        assert_eq!(config.highlight_color(6), None);
        assert!(!config.is_valid_highlight(6));
    }
}
