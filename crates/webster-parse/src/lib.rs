//! Parser for the Project Gutenberg edition of Webster's Unabridged
//! Dictionary (1913).
//!
//! The source is a typographically conventional plain-text stream: headwords
//! are full-caps lines, definitions are numbered paragraphs, etymologies hide
//! inside the grammatical info line behind an `Etym:` marker, and example
//! quotations are only distinguishable from definition prose by line-wrap
//! heuristics. [`parse`] reconstructs structured [`Word`] entries from that
//! stream with a line-driven state machine and files them into a [`WordMap`].
//!
//! The parser never fails on malformed text; anything that fits no rule ends
//! up in the entry's `extra` field. The only error source is the underlying
//! reader.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::info;

use webster_types::{Word, WordMap, WordMeaning};

/// Numbered definition category, e.g. `1. (Arch.)`. Categories contain only
/// lettered definitions; the capture keeps the parentheses.
static DEFN_CATEGORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+\.\s*(\([^) ]+\))\s*$").unwrap());
/// Single-definition marker, e.g. `Defn: To forsake utterly.`
static SINGLE_DEFN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Defn:\s*(.+)").unwrap());
/// Numbered definition, e.g. `1. To relinquish.`
static DEFN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+\.\s*(.+)").unwrap());
/// Splits an accumulated info line into info + etymology.
static INFO_ETYM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)\s*Etym:\s*(.+)\s*$").unwrap());
/// Cross-reference marker, e.g. `See Band.` or `See under Fall.`
static SEE_OTHER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*See(?: under)? ([A-Z][a-z]+)\.\s*$").unwrap());

/// Separator between the segments of a synonym or phrase-definition note.
const NOTE_SEPARATOR: &str = "\u{a0}\u{a0}\u{a0}";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read dictionary text: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse the dictionary text into a [`WordMap`].
///
/// Results on corrupt input are best-effort, never an error. Expect heavy
/// memory use for the full dictionary; this is a batch tool, serving should
/// go through the on-disk store.
pub fn parse<R: BufRead>(reader: R) -> Result<WordMap, ParseError> {
    let mut wm = WordMap::new();
    let mut pending: Option<PendingEntry> = None;

    for line in reader.lines() {
        let line = line?;
        let s = line.trim_matches(|c| matches!(c, '\r' | '\n' | '\t' | ' '));

        // A full-caps line starts a new entry and seals the previous one.
        if !s.is_empty() && s.to_uppercase() == s {
            if let Some(entry) = pending.take() {
                entry.emit(&mut wm);
            }
            pending = Some(PendingEntry::new(s));
            continue;
        }

        if let Some(entry) = pending.as_mut() {
            entry.lines.push(s.to_string());
        }
    }

    if let Some(entry) = pending.take() {
        entry.emit(&mut wm);
    }

    Ok(wm)
}

/// Open `path` and [`parse`] it, logging the entry count.
pub fn parse_path(path: impl AsRef<Path>) -> Result<WordMap, ParseError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let wm = parse(std::io::BufReader::new(file))?;
    info!("parsed {} keys from {}", wm.len(), path.display());
    Ok(wm)
}

/// A headword line plus the raw lines accumulated until the next headword.
struct PendingEntry {
    headword: String,
    alternates: Vec<String>,
    lines: Vec<String>,
}

impl PendingEntry {
    fn new(headword_line: &str) -> Self {
        let lowered = headword_line.to_lowercase();
        let mut parts = lowered.split(';');
        let headword = parts.next().unwrap_or_default().trim().to_string();
        let alternates = parts
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .map(str::to_string)
            .collect();
        PendingEntry {
            headword,
            alternates,
            lines: Vec::new(),
        }
    }

    /// Run the substate machine over the buffered lines and file the result
    /// under the headword and every alternate.
    fn emit(self, wm: &mut WordMap) {
        let word = Arc::new(build_word(self.headword, self.alternates, &self.lines));
        wm.push(word.word.clone(), Arc::clone(&word));
        for alt in &word.alternates {
            wm.push(alt.clone(), Arc::clone(&word));
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Info,
    DefnCategory,
    Defn,
    DefnExample,
    SingleDefn,
    Neutral,
}

fn build_word(headword: String, alternates: Vec<String>, lines: &[String]) -> Word {
    let mut word = Word {
        alternates,
        ..Word::with_headword(headword)
    };
    let mut info = String::new();
    let mut state = State::Info;
    // Open synonym / phrase-definition block, closed by a blank line or a new
    // definition.
    let mut note: Option<Vec<String>> = None;

    for (i, line) in lines.iter().enumerate() {
        let s = line.as_str();

        // Categories cannot contain numbered definitions; one ends the
        // category and is then re-evaluated as a fresh definition below.
        if state == State::DefnCategory && DEFN_RE.is_match(s) {
            state = State::Neutral;
        }

        // Rule order matters; this mirrors the source conventions.
        if s.is_empty() {
            // A blank line ends the current paragraph, whatever it is.
            if state == State::Info {
                let (inf, etym) = split_info(&info);
                word.info = inf;
                word.etymology = etym;
            }
            state = State::Neutral;
            flush_note(&mut note, &mut word.notes);
        } else if state == State::Info {
            info.push_str(s);
            info.push(' ');
        } else if let Some(caps) = DEFN_CATEGORY_RE.captures(s) {
            flush_note(&mut note, &mut word.notes);
            state = State::DefnCategory;
            word.meanings.push(WordMeaning {
                text: caps[1].to_string(),
                ..WordMeaning::default()
            });
        } else if state == State::DefnCategory {
            let starts_example = example_break(&word.meanings, lines, i, s);
            let meaning = word.meanings.last_mut().expect("category opened a meaning");
            if let Some(caps) = SINGLE_DEFN_RE.captures(s) {
                meaning.text.push(' ');
                meaning.text.push_str(&caps[1]);
            } else if starts_example {
                state = State::DefnExample;
                meaning.example = s.to_string();
            } else {
                meaning.text.push(' ');
                meaning.text.push_str(s);
            }
        } else if let Some(caps) = DEFN_RE.captures(s) {
            flush_note(&mut note, &mut word.notes);
            state = State::Defn;
            word.meanings.push(WordMeaning {
                text: caps[1].to_string(),
                ..WordMeaning::default()
            });
        } else if state == State::Defn {
            let starts_example = example_break(&word.meanings, lines, i, s);
            let meaning = word.meanings.last_mut().expect("defn opened a meaning");
            if starts_example {
                state = State::DefnExample;
                meaning.example = s.to_string();
            } else {
                meaning.text.push(' ');
                meaning.text.push_str(s);
            }
        } else if state == State::DefnExample {
            let meaning = word.meanings.last_mut().expect("example follows a meaning");
            meaning.example.push(' ');
            meaning.example.push_str(s);
        } else if let Some(caps) = SINGLE_DEFN_RE.captures(s) {
            flush_note(&mut note, &mut word.notes);
            state = State::SingleDefn;
            word.meanings.push(WordMeaning {
                text: caps[1].to_string(),
                ..WordMeaning::default()
            });
        } else if state == State::SingleDefn {
            let meaning = word.meanings.last_mut().expect("defn opened a meaning");
            meaning.text.push(' ');
            meaning.text.push_str(s);
        } else if let Some(rest) = s.strip_prefix("Syn.") {
            // Synonym block: `Syn.` on its own line, segments on `-- ` lines.
            flush_note(&mut note, &mut word.notes);
            let mut block = Vec::new();
            let rest = rest.trim_start();
            let rest = rest.strip_prefix("-- ").unwrap_or(rest);
            if !rest.is_empty() {
                block.push(rest.to_string());
            }
            note = Some(block);
        } else if let Some(block) = note.as_mut() {
            if let Some(rest) = s.strip_prefix("-- ") {
                block.push(rest.to_string());
            } else if let Some(segment) = block.last_mut() {
                segment.push(' ');
                segment.push_str(s);
            } else {
                block.push(s.to_string());
            }
        } else if let Some(rest) = s.strip_prefix("-- ") {
            // Phrase definitions trail the numbered meanings.
            note = Some(vec![rest.to_string()]);
        } else {
            word.extra.push('\n');
            word.extra.push_str(s);
        }
    }

    if state == State::Info {
        // Entry ended before the first blank line.
        let (inf, etym) = split_info(&info);
        word.info = inf;
        word.etymology = etym;
    }
    flush_note(&mut note, &mut word.notes);

    collect_references(&mut word);
    word
}

/// Example detection heuristic: definition prose is hard-wrapped near column
/// 55, so a short previous line ending in a period signals that the paragraph
/// ended and a quotation follows. `Note:` paragraphs and `-- ` phrase lines
/// are never examples.
fn example_break(meanings: &[WordMeaning], lines: &[String], i: usize, s: &str) -> bool {
    let text_len = meanings.last().map(|m| m.text.len()).unwrap_or(0);
    if text_len <= 5 || i == 0 {
        return false;
    }
    let prev = lines[i - 1].as_str();
    prev.len() < 55
        && prev.trim().ends_with('.')
        && !s.contains("Note: ")
        && !s.contains("-- ")
}

fn split_info(info: &str) -> (String, String) {
    match INFO_ETYM_RE.captures(info) {
        Some(caps) => (caps[1].trim().to_string(), caps[2].trim().to_string()),
        None => (info.trim_end().to_string(), String::new()),
    }
}

fn flush_note(note: &mut Option<Vec<String>>, notes: &mut Vec<String>) {
    if let Some(block) = note.take() {
        if !block.is_empty() {
            notes.push(block.join(NOTE_SEPARATOR));
        }
    }
}

fn collect_references(word: &mut Word) {
    for meaning in &mut word.meanings {
        let referenced = SEE_OTHER_RE
            .captures(&meaning.text)
            .map(|caps| caps[1].to_lowercase());
        if let Some(referenced) = referenced {
            meaning.referenced_words.push(referenced);
        }
    }
    if let Some(caps) = SEE_OTHER_RE.captures(&word.etymology) {
        word.referenced_words.push(caps[1].to_lowercase());
    }
}
