//! Query normalization over a dictionary [`Store`].
//!
//! Users rarely type a headword exactly as filed: queries arrive with stray
//! whitespace, typographic dashes and quotes, inflected endings, or accented
//! characters. [`lookup`] runs a ladder of normalizations against the store,
//! stopping at the first key the store recognizes. Each rung relaxes a
//! different surface divergence without touching lexical identity, ordered
//! cheap-and-common first: whitespace, then typographic punctuation, then
//! stemming. The crate is deliberately ignorant of any concrete backend; it
//! only needs the [`Store`] capability.
//!
//! [`StoreExt`] hangs `lookup_word` off every store, so callers holding a
//! `dyn Store` can normalize without naming this crate's function directly.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use webster_types::{DictError, Store, Word};

static SPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
/// Any unicode dash-like character.
static DASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Pd}").unwrap());
static DASH_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());
/// Leading opening and trailing closing punctuation, plain quotes, and
/// sentence-final marks.
static OPEN_CLOSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:\p{Pi}|\p{Ps}|["'])+|(?:\p{Pf}|\p{Pe}|["'!?.,;:])+$"#).unwrap()
});
static STEMMER: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::English));

/// Extends every [`Store`] with normalized lookup.
pub trait StoreExt: Store {
    /// Look up a query, applying the normalization ladder on a miss.
    fn lookup_word(&self, word: &str) -> Result<Option<Vec<Word>>, DictError> {
        lookup(self, word)
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// Resolve `word` against the store, normalizing until something matches.
///
/// Returns `Ok(None)` when no rung of the ladder produces a known key. A
/// store that answers `has_word` but then comes back empty from `get_words`
/// is broken; that surfaces as [`DictError::Invariant`].
pub fn lookup<S: Store + ?Sized>(store: &S, word: &str) -> Result<Option<Vec<Word>>, DictError> {
    for pass in 0..2 {
        let mut ws = word.trim().to_lowercase();
        if store.has_word(&ws) {
            return fetch(store, &ws);
        }

        // Collapse whitespace runs into single spaces.
        ws = SPACE_RUN_RE.replace_all(&ws, " ").into_owned();
        if store.has_word(&ws) {
            return fetch(store, &ws);
        }

        // Trim leading opening and trailing closing punctuation.
        ws = OPEN_CLOSE_RE.replace_all(&ws, "").into_owned();
        if store.has_word(&ws) {
            return fetch(store, &ws);
        }

        // Fold typographic dashes into '-' and collapse runs.
        ws = DASH_RE.replace_all(&ws, "-").into_owned();
        if store.has_word(&ws) {
            return fetch(store, &ws);
        }
        ws = DASH_RUN_RE.replace_all(&ws, "-").into_owned();
        if store.has_word(&ws) {
            return fetch(store, &ws);
        }

        for fold in 0..2 {
            let stemmed = STEMMER.stem(&ws);
            if store.has_word(stemmed.as_ref()) {
                return fetch(store, stemmed.as_ref());
            }

            // Sometimes stemming removes too much.
            let unpluraled = ws.trim_end_matches('s');
            if store.has_word(unpluraled) {
                return fetch(store, unpluraled);
            }

            let unsuffixed = {
                let t = ws.strip_suffix("ly").unwrap_or(&ws);
                t.strip_suffix("ing").unwrap_or(t)
            };
            if store.has_word(unsuffixed) {
                return fetch(store, unsuffixed);
            }

            // Second attempt runs the same rungs with diacritics removed.
            if fold == 0 {
                ws = strip_marks(&ws);
                if store.has_word(&ws) {
                    return fetch(store, &ws);
                }
            }
        }

        // Last resort of the first pass: drop dashes entirely.
        if pass == 0 {
            ws = ws.replace('-', "");
            if store.has_word(&ws) {
                return fetch(store, &ws);
            }
        }
    }

    Ok(None)
}

fn fetch<S: Store + ?Sized>(store: &S, key: &str) -> Result<Option<Vec<Word>>, DictError> {
    match store.get_words(key)? {
        Some(words) => Ok(Some(words)),
        None => {
            debug_assert!(false, "store said '{key}' exists but returned nothing");
            Err(DictError::Invariant(format!(
                "store reported '{key}' present but returned nothing"
            )))
        }
    }
}

/// NFD-decompose, drop combining marks, recompose.
fn strip_marks(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .nfc()
        .collect()
}
