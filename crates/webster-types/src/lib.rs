//! Shared entry types for the 1913 Webster's Unabridged Dictionary pipeline.
//!
//! The record unit is [`Word`]: one dictionary entry with its alternate
//! spellings, grammatical info, etymology, numbered meanings, and leftover
//! text. Entries are produced once by the parser and never mutated, so the
//! in-memory [`WordMap`] hands out shared `Arc<Word>` values; a headword and
//! its variants all point at the same allocation, which the on-disk writer
//! relies on to deduplicate payloads.
//!
//! [`Store`] is the capability both backends implement (the parser's
//! `WordMap` and the on-disk reader). Lookup normalization builds on top of
//! it in the `webster-lookup` crate.
//!
//! # Example
//! ```rust
//! use std::sync::Arc;
//! use webster_types::{Store, Word, WordMap};
//!
//! let mut wm = WordMap::new();
//! wm.push("cat", Arc::new(Word::with_headword("cat")));
//! assert!(wm.has_word("cat"));
//! assert_eq!(wm.num_words(), 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attribution carried by every entry emitted from the parser.
pub const CREDIT: &str = "Webster's Unabridged Dictionary (1913)";

/// One numbered or single definition, optionally with an example quotation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct WordMeaning {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub example: String,
    #[serde(default)]
    pub referenced_words: Vec<String>,
}

/// A dictionary entry.
///
/// `word` is the lowercased canonical headword; `alternates` are the
/// lowercased variant spellings filed under the same entry. All text fields
/// keep the source's prose as-is apart from whitespace trimming.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Word {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub word: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub info: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub etymology: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meanings: Vec<WordMeaning>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extra: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub credit: String,
    // Entry-level cross-references only; references inside meanings live on
    // each WordMeaning.
    #[serde(default)]
    pub referenced_words: Vec<String>,
}

impl Word {
    /// New entry with the headword and credit set, everything else empty.
    pub fn with_headword(word: impl Into<String>) -> Self {
        Word {
            word: word.into(),
            credit: CREDIT.to_string(),
            ..Word::default()
        }
    }
}

/// Failures surfaced by dictionary backends.
///
/// A missing word is not an error; `Store::get_words` reports it as
/// `Ok(None)`.
#[derive(Debug, Error)]
pub enum DictError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("incompatible dict version: expected {expected:?}, got {actual:?}")]
    Version { expected: [u8; 6], actual: [u8; 6] },
    #[error("incomplete dict file: write did not finish")]
    Incomplete,
    #[error("decode {context}: {source}")]
    Codec {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl DictError {
    /// Codec failure tagged with the offending record or key.
    pub fn codec(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DictError::Codec {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Capability set shared by dictionary backends.
///
/// `has_word` takes the key as-is (no trimming or case folding); the
/// normalization ladder in `webster-lookup` is responsible for producing
/// candidate keys.
pub trait Store {
    /// Number of keys in the store.
    fn num_words(&self) -> usize;

    /// Whether the exact key is present. Never touches entry payloads.
    fn has_word(&self, word: &str) -> bool;

    /// All entries filed under the exact key, in insertion order.
    /// `Ok(None)` means the key is absent.
    fn get_words(&self, word: &str) -> Result<Option<Vec<Word>>, DictError>;
}

/// In-memory store produced by the parser.
///
/// A key may hold several entries: homographs share a headword, and variant
/// spellings file the same entry under additional keys. Within one key,
/// insertion order is preserved. Fast but heavy (hundreds of MB for the full
/// dictionary); prefer the on-disk reader for serving.
#[derive(Debug, Default)]
pub struct WordMap {
    entries: HashMap<String, Vec<Arc<Word>>>,
}

impl WordMap {
    pub fn new() -> Self {
        WordMap::default()
    }

    /// File `word` under `key`, appending to any entries already there.
    pub fn push(&mut self, key: impl Into<String>, word: Arc<Word>) {
        self.entries.entry(key.into()).or_default().push(word);
    }

    /// Shared entries under the exact key.
    pub fn get(&self, key: &str) -> Option<&[Arc<Word>]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Iterate over `(key, entries)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Arc<Word>])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store for WordMap {
    fn num_words(&self) -> usize {
        self.entries.len()
    }

    fn has_word(&self, word: &str) -> bool {
        self.entries.contains_key(word)
    }

    fn get_words(&self, word: &str) -> Result<Option<Vec<Word>>, DictError> {
        Ok(self
            .entries
            .get(word)
            .map(|ws| ws.iter().map(|w| (**w).clone()).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_map_files_variants_under_shared_entry() {
        let entry = Arc::new(Word {
            alternates: vec!["colour".to_string()],
            ..Word::with_headword("color")
        });
        let mut wm = WordMap::new();
        wm.push("color", Arc::clone(&entry));
        wm.push("colour", Arc::clone(&entry));

        assert_eq!(wm.num_words(), 2);
        assert!(wm.has_word("color"));
        assert!(wm.has_word("colour"));
        assert!(!wm.has_word("Color"));

        let direct = wm.get_words("color").unwrap().unwrap();
        let variant = wm.get_words("colour").unwrap().unwrap();
        assert_eq!(direct, variant);
        assert!(Arc::ptr_eq(&wm.get("color").unwrap()[0], &wm.get("colour").unwrap()[0]));
    }

    #[test]
    fn word_map_keeps_homographs_in_insertion_order() {
        let mut wm = WordMap::new();
        wm.push("bear", Arc::new(Word {
            info: "n.".to_string(),
            ..Word::with_headword("bear")
        }));
        wm.push("bear", Arc::new(Word {
            info: "v. t.".to_string(),
            ..Word::with_headword("bear")
        }));

        let words = wm.get_words("bear").unwrap().unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].info, "n.");
        assert_eq!(words[1].info, "v. t.");
    }

    #[test]
    fn missing_key_is_not_an_error() {
        let wm = WordMap::new();
        assert!(wm.get_words("absent").unwrap().is_none());
    }

    #[test]
    fn json_omits_empty_fields_but_keeps_referenced_words() {
        let word = Word::with_headword("cat");
        let json = serde_json::to_value(&word).unwrap();
        assert_eq!(json["word"], "cat");
        assert_eq!(json["credit"], CREDIT);
        assert!(json.get("info").is_none());
        assert!(json.get("alternates").is_none());
        assert_eq!(json["referenced_words"], serde_json::json!([]));
    }

    #[test]
    fn json_round_trips_a_full_entry() {
        let word = Word {
            alternates: vec!["abandoned".to_string()],
            info: "v. t.".to_string(),
            etymology: "See Band.".to_string(),
            meanings: vec![WordMeaning {
                text: "To relinquish.".to_string(),
                example: "Abandon hope.".to_string(),
                referenced_words: vec![],
            }],
            notes: vec!["note".to_string()],
            extra: "leftover".to_string(),
            referenced_words: vec!["band".to_string()],
            ..Word::with_headword("abandon")
        };
        let json = serde_json::to_string(&word).unwrap();
        let back: Word = serde_json::from_str(&json).unwrap();
        assert_eq!(back, word);
    }
}
