use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

#[derive(Deserialize)]
struct RawPatternFile {
    #[serde(default, rename = "pattern")]
    patterns: Vec<RawPattern>,
}

#[derive(Deserialize)]
struct RawPattern {
    label: String,
    pattern: String,
}

struct PatternEntry {
    label: String,
    regex: Regex,
}

/// Static ordered list of named risk markers scanned against verified
/// source text. Loaded once at start, read-only thereafter. Entries
/// whose regex fails to compile are dropped, not fatal.
pub struct PatternSet {
    entries: Vec<PatternEntry>,
}

impl PatternSet {
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("pattern file {} unreadable", path.display()))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let file: RawPatternFile = toml::from_str(raw).context("pattern file parse failed")?;
        let mut entries = Vec::with_capacity(file.patterns.len());
        for p in file.patterns {
            match Regex::new(&p.pattern) {
                Ok(regex) => entries.push(PatternEntry { label: p.label, regex }),
                Err(e) => warn!(?e, label = %p.label, "bad pattern skipped"),
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels of every matching entry, in file order.
    pub fn scan(&self, source: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.regex.is_match(source))
            .map(|e| e.label.clone())
            .collect()
    }
}
