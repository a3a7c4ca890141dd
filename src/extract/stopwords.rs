//! Stopword sets
//!
//! Stopwords are matched case-insensitively against whole keys. The set is
//! stored lower-cased so lookups against already case-folded keys are a single
//! hash probe.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Built-in stopword list (Portuguese and English function words)
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "o", "os", "as", "de", "da", "do", "das", "dos", "e", "ou", "um", "uma", "uns", "umas",
    "the", "and", "or", "to", "of", "in", "on", "for", "is", "it", "that", "this", "i", "you",
];

/// Set of words dropped before they reach an aggregator
#[derive(Debug, Clone, Default)]
pub struct Stopwords {
    words: HashSet<String>,
}

impl Stopwords {
    /// Empty set (nothing is filtered)
    pub fn none() -> Self {
        Self::default()
    }

    /// Built-in list
    pub fn builtin() -> Self {
        Self::from_words(DEFAULT_STOPWORDS.iter().copied())
    }

    /// Build a set from arbitrary words; case is folded on insertion
    pub fn from_words<'a>(words: impl IntoIterator<Item = &'a str>) -> Self {
        let words = words
            .into_iter()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        Self { words }
    }

    /// Load a stopword file: one word per line, blank lines and `#` comments ignored
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read stopword file: {}", path.display()))?;

        Ok(Self::from_words(
            contents
                .lines()
                .filter(|line| !line.trim_start().starts_with('#')),
        ))
    }

    /// Case-insensitive exact match
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        if self.words.is_empty() {
            return false;
        }
        if key.bytes().any(|b| b.is_ascii_uppercase()) {
            self.words.contains(&key.to_ascii_lowercase())
        } else {
            self.words.contains(key)
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in the set, sorted
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut words: Vec<String> = self.words.iter().cloned().collect();
        words.sort();
        words
    }
}
