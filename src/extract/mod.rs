//! Key extraction
//!
//! Turns the text of one work unit into the keys that are counted. Two kinds
//! of keys exist:
//!
//! - **Words**: maximal runs of ASCII alphanumeric bytes, case-folded, with
//!   stopwords removed
//! - **Artists**: the artist field of the record, verbatim
//!
//! Extraction is lazy: [`Keys`] walks the text on demand and never allocates
//! more than the key it is about to yield. Calling [`KeyExtractor::words`]
//! again on the same text starts a fresh walk.
//!
//! # Example
//!
//! ```
//! use corpuscount::extract::{KeyExtractor, Stopwords};
//!
//! let extractor = KeyExtractor::new(Stopwords::builtin());
//! let keys: Vec<String> = extractor.words("The War, and LOVE!").collect();
//! assert_eq!(keys, vec!["war", "love"]);
//! ```

pub mod stopwords;

pub use stopwords::Stopwords;

use serde::{Deserialize, Serialize};

/// What to do with keys longer than a byte limit
///
/// Growable buffers mean no key is ever cut implicitly; this policy is the
/// only place a key length limit applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "max_bytes")]
pub enum KeyLengthPolicy {
    /// Keys of any length are kept
    Unlimited,
    /// Keys are cut to at most N bytes, at a char boundary
    Truncate(usize),
    /// Keys longer than N bytes are dropped
    Reject(usize),
}

impl Default for KeyLengthPolicy {
    fn default() -> Self {
        KeyLengthPolicy::Reject(4096)
    }
}

impl KeyLengthPolicy {
    /// Apply the policy to a candidate key
    ///
    /// Returns `None` when the key must be dropped.
    pub fn apply<'a>(&self, key: &'a str) -> Option<&'a str> {
        match *self {
            KeyLengthPolicy::Unlimited => Some(key),
            KeyLengthPolicy::Reject(max) if key.len() > max => None,
            KeyLengthPolicy::Reject(_) => Some(key),
            KeyLengthPolicy::Truncate(max) if key.len() > max => {
                let mut end = max;
                while !key.is_char_boundary(end) {
                    end -= 1;
                }
                Some(&key[..end])
            }
            KeyLengthPolicy::Truncate(_) => Some(key),
        }
    }
}

/// Normalizes text into countable keys
#[derive(Debug, Clone, Default)]
pub struct KeyExtractor {
    stopwords: Stopwords,
    length_policy: KeyLengthPolicy,
}

impl KeyExtractor {
    pub fn new(stopwords: Stopwords) -> Self {
        Self {
            stopwords,
            length_policy: KeyLengthPolicy::default(),
        }
    }

    pub fn with_length_policy(mut self, policy: KeyLengthPolicy) -> Self {
        self.length_policy = policy;
        self
    }

    pub fn stopwords(&self) -> &Stopwords {
        &self.stopwords
    }

    pub fn length_policy(&self) -> KeyLengthPolicy {
        self.length_policy
    }

    /// Lazily split `text` into case-folded words, skipping stopwords
    pub fn words<'a>(&'a self, text: &'a str) -> Keys<'a> {
        Keys {
            text,
            pos: 0,
            extractor: self,
        }
    }

    /// Normalize an artist field into a key
    ///
    /// Artist names are counted verbatim. Stopwords do not apply.
    pub fn artist<'a>(&self, artist: &'a str) -> Option<&'a str> {
        if artist.is_empty() {
            return None;
        }
        self.length_policy.apply(artist).filter(|k| !k.is_empty())
    }
}

/// Lazy iterator over the words of a text
///
/// Produced by [`KeyExtractor::words`].
#[derive(Debug, Clone)]
pub struct Keys<'a> {
    text: &'a str,
    pos: usize,
    extractor: &'a KeyExtractor,
}

impl<'a> Iterator for Keys<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let bytes = self.text.as_bytes();

        loop {
            // Skip to the start of the next run
            while self.pos < bytes.len() && !bytes[self.pos].is_ascii_alphanumeric() {
                self.pos += 1;
            }
            if self.pos >= bytes.len() {
                return None;
            }

            let start = self.pos;
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_alphanumeric() {
                self.pos += 1;
            }

            // Run boundaries sit on ASCII bytes, so the slice is valid UTF-8
            let mut key = self.text[start..self.pos].to_ascii_lowercase();
            // Stopwords match the whole run, never a truncated prefix
            if self.extractor.stopwords.contains(&key) {
                continue;
            }

            let kept = match self.extractor.length_policy.apply(&key) {
                Some(cut) if !cut.is_empty() => cut.len(),
                _ => continue,
            };
            key.truncate(kept);
            return Some(key);
        }
    }
}
