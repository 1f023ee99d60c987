//! On-disk container for dictionary entries.
//!
//! A dict file is a single self-describing blob: a six-byte version tag, the
//! absolute offset of the index trailer, a data region of independently
//! compressed records, and finally the compressed index itself. Entries are
//! msgpack-encoded (short field tags keep the payloads small) and zlib
//! compressed one by one, so a reader can open the file, keep only the index
//! in memory (~15 MB for the full 1913 dictionary), and decode entries on
//! demand with stateless positional reads. [`DictFile::get_words`] is safe to
//! call from many threads at once; there is no shared seek position.
//!
//! ```text
//! [0..6)    version tag, exactly "DICT6\0"
//! [6..14)   idxOffset (absolute offset of the index trailer, i64 LE)
//! [14..D)   records: sizeOf(record) i64 LE + zlib(msgpack(entry))
//! [D..D+8)  idxSize (size field + compressed index, i64 LE)
//! [D+8..)   zlib(msgpack(index)), index = map<string, list<i64>>
//! ```
//!
//! The version tag is written last, so a crashed write leaves an all-zero
//! header that [`DictFile::open`] reports as an incomplete file rather than a
//! version mismatch. Files tagged `"DICT5\0"` are still readable: their index
//! maps each key to a single offset, which is lifted to a one-element list on
//! open. Multiple keys may share one record offset; the writer deduplicates
//! entries reachable through both a headword and its variants.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::info;

use webster_types::{DictError, Store, Word, WordMap, WordMeaning};

/// Current compatibility level of dict files.
pub const FILE_VERSION: &[u8; 6] = b"DICT6\0";
/// Previous level, accepted read-only.
pub const FILE_VERSION_COMPAT: &[u8; 6] = b"DICT5\0";

const VERSION_LEN: usize = 6;
const IDX_OFFSET_POS: u64 = VERSION_LEN as u64;
const SIZE_PREFIX_LEN: i64 = 8;

/// Export a [`WordMap`] to a dict file, overwriting any existing file.
///
/// Entries shared between keys (a headword and its variants point at the same
/// `Arc`) are written once; every key's index slot records the shared offset.
/// Not crash-atomic: a partial write is detectable via the zeroed version
/// tag, cleanup is the caller's business.
pub fn create(wm: &WordMap, path: impl AsRef<Path>) -> Result<(), DictError> {
    let path = path.as_ref();
    let mut file = File::create(path)?;
    file.write_all(&[0u8; VERSION_LEN])?;
    file.write_all(&0i64.to_le_bytes())?;

    let mut index: HashMap<String, Vec<i64>> = HashMap::new();
    // Entry identity -> record offset, so a Word reachable through several
    // keys lands in the file exactly once.
    let mut payload_offset: HashMap<usize, i64> = HashMap::new();

    for (key, words) in wm.iter() {
        for word in words {
            let identity = Arc::as_ptr(word) as usize;
            let offset = match payload_offset.get(&identity) {
                Some(offset) => *offset,
                None => {
                    let offset = write_record(&mut file, word)?;
                    payload_offset.insert(identity, offset);
                    offset
                }
            };
            index.entry(key.to_string()).or_default().push(offset);
        }
    }

    let idx_offset = file.stream_position()? as i64;
    write_index(&mut file, &index)?;

    file.seek(SeekFrom::Start(IDX_OFFSET_POS))?;
    file.write_all(&idx_offset.to_le_bytes())?;
    // The version tag goes in last; until this write the file reads as
    // incomplete.
    file.seek(SeekFrom::Start(0))?;
    file.write_all(FILE_VERSION)?;
    file.flush()?;
    file.sync_all()?;

    info!(
        "wrote {} keys ({} records) to {}",
        index.len(),
        payload_offset.len(),
        path.display()
    );
    Ok(())
}

/// Write one length-prefixed compressed record, returning its offset.
fn write_record(file: &mut File, word: &Word) -> Result<i64, DictError> {
    let start = file.stream_position()?;
    file.write_all(&0i64.to_le_bytes())?;

    let mut encoder = ZlibEncoder::new(&mut *file, Compression::best());
    let mut serializer = rmp_serde::Serializer::new(&mut encoder).with_struct_map();
    WireWord::from(word)
        .serialize(&mut serializer)
        .map_err(|err| DictError::codec(format!("record for '{}'", word.word), err))?;
    encoder.finish()?;

    let end = file.stream_position()?;
    // The size covers the prefix itself plus the compressed payload.
    file.seek(SeekFrom::Start(start))?;
    file.write_all(&((end - start) as i64).to_le_bytes())?;
    file.seek(SeekFrom::Start(end))?;
    Ok(start as i64)
}

fn write_index(file: &mut File, index: &HashMap<String, Vec<i64>>) -> Result<(), DictError> {
    let start = file.stream_position()?;
    file.write_all(&0i64.to_le_bytes())?;

    let mut encoder = ZlibEncoder::new(&mut *file, Compression::best());
    let mut serializer = rmp_serde::Serializer::new(&mut encoder).with_struct_map();
    index
        .serialize(&mut serializer)
        .map_err(|err| DictError::codec("index", err))?;
    encoder.finish()?;

    let end = file.stream_position()?;
    file.seek(SeekFrom::Start(start))?;
    file.write_all(&((end - start) as i64).to_le_bytes())?;
    file.seek(SeekFrom::Start(end))?;
    Ok(())
}

/// Read-only store backed by a dict file.
///
/// Opening decodes the index into memory and keeps the data file open for
/// random reads; entry payloads are decoded on demand and dropped with the
/// response. All accessors take `&self` and perform positional reads, so the
/// reader can be shared across request threads without locks.
#[derive(Debug)]
pub struct DictFile {
    index: HashMap<String, Vec<i64>>,
    file: File,
}

impl DictFile {
    /// Open a dict file and load its index.
    pub fn open(path: impl AsRef<Path>) -> Result<DictFile, DictError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;

        let mut tag = [0u8; VERSION_LEN];
        file.read_exact(&mut tag)?;
        if tag == [0u8; VERSION_LEN] {
            return Err(DictError::Incomplete);
        }
        let legacy = if &tag == FILE_VERSION {
            false
        } else if &tag == FILE_VERSION_COMPAT {
            true
        } else {
            return Err(DictError::Version {
                expected: *FILE_VERSION,
                actual: tag,
            });
        };

        let mut raw = [0u8; 8];
        file.read_exact(&mut raw)?;
        let idx_offset = i64::from_le_bytes(raw);
        file.seek(SeekFrom::Start(idx_offset as u64))?;
        file.read_exact(&mut raw)?;
        let idx_size = i64::from_le_bytes(raw);
        if idx_size < SIZE_PREFIX_LEN {
            return Err(DictError::codec(
                format!("index trailer at {idx_offset}"),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("bad index size {idx_size}"),
                ),
            ));
        }

        let mut compressed = vec![0u8; (idx_size - SIZE_PREFIX_LEN) as usize];
        file.read_exact(&mut compressed)?;
        let decoder = ZlibDecoder::new(compressed.as_slice());
        let index: HashMap<String, Vec<i64>> = if legacy {
            // DICT5 stored a single offset per key.
            let single: HashMap<String, i64> = rmp_serde::from_read(decoder)
                .map_err(|err| DictError::codec("legacy index", err))?;
            single
                .into_iter()
                .map(|(key, offset)| (key, vec![offset]))
                .collect()
        } else {
            rmp_serde::from_read(decoder).map_err(|err| DictError::codec("index", err))?
        };

        info!("opened {} with {} keys", path.display(), index.len());
        Ok(DictFile { index, file })
    }

    /// Decode every record and check it carries a headword.
    ///
    /// Takes a few seconds on the full dictionary.
    pub fn verify(&self) -> Result<(), DictError> {
        for (key, offsets) in &self.index {
            for &offset in offsets {
                let word = self.read_record(offset).map_err(|err| match err {
                    DictError::Codec { context, source } => DictError::Codec {
                        context: format!("'{key}': {context}"),
                        source,
                    },
                    other => other,
                })?;
                if word.word.is_empty() {
                    return Err(DictError::Invariant(format!(
                        "'{key}'@{offset}: empty headword"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Drop the index and release the file handle.
    pub fn close(self) -> Result<(), DictError> {
        Ok(())
    }

    fn read_record(&self, offset: i64) -> Result<Word, DictError> {
        let mut prefix = [0u8; 8];
        read_exact_at(&self.file, &mut prefix, offset as u64)?;
        let rec_size = i64::from_le_bytes(prefix);
        if rec_size < SIZE_PREFIX_LEN {
            return Err(DictError::codec(
                format!("record at {offset}"),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("bad record size {rec_size}"),
                ),
            ));
        }

        let mut compressed = vec![0u8; (rec_size - SIZE_PREFIX_LEN) as usize];
        read_exact_at(&self.file, &mut compressed, offset as u64 + 8)?;
        let wire: WireWord = rmp_serde::from_read(ZlibDecoder::new(compressed.as_slice()))
            .map_err(|err| DictError::codec(format!("record at {offset}"), err))?;
        Ok(wire.into())
    }
}

impl Store for DictFile {
    fn num_words(&self) -> usize {
        self.index.len()
    }

    fn has_word(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    fn get_words(&self, word: &str) -> Result<Option<Vec<Word>>, DictError> {
        let Some(offsets) = self.index.get(word) else {
            return Ok(None);
        };
        let mut words = Vec::with_capacity(offsets.len());
        for &offset in offsets {
            words.push(self.read_record(offset)?);
        }
        Ok(Some(words))
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut done = 0;
    while done < buf.len() {
        let n = file.seek_read(&mut buf[done..], offset + done as u64)?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        done += n;
    }
    Ok(())
}

/// Wire representation of an entry. The single-letter tags are the msgpack
/// field names; JSON serialization of [`Word`] keeps the long names.
#[derive(Serialize, Deserialize)]
struct WireWord {
    #[serde(rename = "w", default)]
    word: String,
    #[serde(rename = "a", default)]
    alternates: Vec<String>,
    #[serde(rename = "i", default)]
    info: String,
    #[serde(rename = "e", default)]
    etymology: String,
    #[serde(rename = "m", default)]
    meanings: Vec<WireMeaning>,
    #[serde(rename = "n", default)]
    notes: Vec<String>,
    #[serde(rename = "x", default)]
    extra: String,
    #[serde(rename = "c", default)]
    credit: String,
    #[serde(rename = "r", default)]
    referenced_words: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct WireMeaning {
    #[serde(rename = "t", default)]
    text: String,
    #[serde(rename = "e", default)]
    example: String,
    #[serde(rename = "r", default)]
    referenced_words: Vec<String>,
}

impl From<&Word> for WireWord {
    fn from(word: &Word) -> Self {
        WireWord {
            word: word.word.clone(),
            alternates: word.alternates.clone(),
            info: word.info.clone(),
            etymology: word.etymology.clone(),
            meanings: word.meanings.iter().map(WireMeaning::from).collect(),
            notes: word.notes.clone(),
            extra: word.extra.clone(),
            credit: word.credit.clone(),
            referenced_words: word.referenced_words.clone(),
        }
    }
}

impl From<WireWord> for Word {
    fn from(wire: WireWord) -> Self {
        Word {
            word: wire.word,
            alternates: wire.alternates,
            info: wire.info,
            etymology: wire.etymology,
            meanings: wire.meanings.into_iter().map(WordMeaning::from).collect(),
            notes: wire.notes,
            extra: wire.extra,
            credit: wire.credit,
            referenced_words: wire.referenced_words,
        }
    }
}

impl From<&WordMeaning> for WireMeaning {
    fn from(meaning: &WordMeaning) -> Self {
        WireMeaning {
            text: meaning.text.clone(),
            example: meaning.example.clone(),
            referenced_words: meaning.referenced_words.clone(),
        }
    }
}

impl From<WireMeaning> for WordMeaning {
    fn from(wire: WireMeaning) -> Self {
        WordMeaning {
            text: wire.text,
            example: wire.example,
            referenced_words: wire.referenced_words,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_word(headword: &str, info: &str) -> Word {
        Word {
            info: info.to_string(),
            meanings: vec![WordMeaning {
                text: format!("Meaning of {headword}."),
                example: String::new(),
                referenced_words: vec![],
            }],
            referenced_words: vec!["band".to_string()],
            ..Word::with_headword(headword)
        }
    }

    fn dict_path(dir: &TempDir) -> std::path::PathBuf {
        dir.path().join("webster.dict")
    }

    #[test]
    fn round_trips_entries_and_shares_deduplicated_offsets() {
        let shared = Arc::new(sample_word("alpha", "n."));
        let distinct = Arc::new(sample_word("gamma", "v. t."));
        let mut wm = WordMap::new();
        wm.push("alpha", Arc::clone(&shared));
        wm.push("beta", Arc::clone(&shared));
        wm.push("gamma", Arc::clone(&distinct));

        let dir = TempDir::new().unwrap();
        let path = dict_path(&dir);
        create(&wm, &path).unwrap();

        let dict = DictFile::open(&path).unwrap();
        assert_eq!(dict.num_words(), 3);
        assert!(dict.has_word("alpha"));
        assert!(!dict.has_word("delta"));

        // Identity sharing collapses to a single record offset.
        assert_eq!(dict.index["alpha"], dict.index["beta"]);
        assert_ne!(dict.index["alpha"], dict.index["gamma"]);

        let alpha = dict.get_words("alpha").unwrap().unwrap();
        let beta = dict.get_words("beta").unwrap().unwrap();
        assert_eq!(alpha, beta);
        assert_eq!(alpha[0], *shared);
        let gamma = dict.get_words("gamma").unwrap().unwrap();
        assert_eq!(gamma[0], *distinct);
    }

    #[test]
    fn preserves_homograph_order_within_a_key() {
        let mut wm = WordMap::new();
        wm.push("bear", Arc::new(sample_word("bear", "n.")));
        wm.push("bear", Arc::new(sample_word("bear", "v. t.")));

        let dir = TempDir::new().unwrap();
        let path = dict_path(&dir);
        create(&wm, &path).unwrap();

        let dict = DictFile::open(&path).unwrap();
        let words = dict.get_words("bear").unwrap().unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].info, "n.");
        assert_eq!(words[1].info, "v. t.");
    }

    #[test]
    fn missing_key_reads_as_absent_not_error() {
        let dir = TempDir::new().unwrap();
        let path = dict_path(&dir);
        create(&WordMap::new(), &path).unwrap();
        let dict = DictFile::open(&path).unwrap();
        assert!(dict.get_words("nope").unwrap().is_none());
    }

    #[test]
    fn version_tag_lands_at_the_start_of_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dict_path(&dir);
        create(&WordMap::new(), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..6], FILE_VERSION);
    }

    #[test]
    fn zeroed_version_reads_as_incomplete() {
        let dir = TempDir::new().unwrap();
        let path = dict_path(&dir);
        std::fs::write(&path, [0u8; 32]).unwrap();
        match DictFile::open(&path) {
            Err(DictError::Incomplete) => {}
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn unknown_version_is_rejected_with_both_tags() {
        let dir = TempDir::new().unwrap();
        let path = dict_path(&dir);
        let mut bytes = vec![0u8; 32];
        bytes[..6].copy_from_slice(b"DICT9\0");
        std::fs::write(&path, bytes).unwrap();
        match DictFile::open(&path) {
            Err(DictError::Version { expected, actual }) => {
                assert_eq!(&expected, FILE_VERSION);
                assert_eq!(&actual, b"DICT9\0");
            }
            other => panic!("expected Version, got {other:?}"),
        }
    }

    #[test]
    fn verify_accepts_a_well_formed_file_and_rejects_empty_headwords() {
        let dir = TempDir::new().unwrap();
        let good = dict_path(&dir);
        let mut wm = WordMap::new();
        wm.push("alpha", Arc::new(sample_word("alpha", "n.")));
        create(&wm, &good).unwrap();
        DictFile::open(&good).unwrap().verify().unwrap();

        let bad = dir.path().join("bad.dict");
        let mut wm = WordMap::new();
        wm.push("ghost", Arc::new(Word::default()));
        create(&wm, &bad).unwrap();
        match DictFile::open(&bad).unwrap().verify() {
            Err(DictError::Invariant(msg)) => assert!(msg.contains("empty headword")),
            other => panic!("expected Invariant, got {other:?}"),
        }
    }

    #[test]
    fn legacy_dict5_files_read_like_current_ones() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.dict");
        let word = sample_word("alpha", "n.");
        write_legacy_file(&path, &[("alpha", &word), ("beta", &word)]);

        let dict = DictFile::open(&path).unwrap();
        assert_eq!(dict.num_words(), 2);
        // Single offsets are lifted to one-element lists.
        assert_eq!(dict.index["alpha"].len(), 1);
        let words = dict.get_words("alpha").unwrap().unwrap();
        assert_eq!(words, vec![word.clone()]);
        dict.verify().unwrap();
    }

    #[test]
    fn parallel_reads_match_serial_reads() {
        let mut wm = WordMap::new();
        let keys: Vec<String> = (0..16).map(|i| format!("word{i}")).collect();
        for key in &keys {
            wm.push(key.clone(), Arc::new(sample_word(key, "n.")));
        }

        let dir = TempDir::new().unwrap();
        let path = dict_path(&dir);
        create(&wm, &path).unwrap();
        let dict = DictFile::open(&path).unwrap();

        let serial: Vec<Vec<Word>> = keys
            .iter()
            .map(|k| dict.get_words(k).unwrap().unwrap())
            .collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = keys
                .iter()
                .map(|key| {
                    let dict = &dict;
                    scope.spawn(move || dict.get_words(key).unwrap().unwrap())
                })
                .collect();
            for (handle, expected) in handles.into_iter().zip(&serial) {
                assert_eq!(&handle.join().unwrap(), expected);
            }
        });
    }

    /// Hand-rolls the DICT5 layout: same record framing, but the index maps
    /// each key to a single i64 offset.
    fn write_legacy_file(path: &Path, entries: &[(&str, &Word)]) {
        let mut file = File::create(path).unwrap();
        file.write_all(&[0u8; VERSION_LEN]).unwrap();
        file.write_all(&0i64.to_le_bytes()).unwrap();

        let mut index: HashMap<String, i64> = HashMap::new();
        for (key, word) in entries {
            let offset = write_record(&mut file, word).unwrap();
            index.insert((*key).to_string(), offset);
        }

        let idx_offset = file.stream_position().unwrap() as i64;
        file.write_all(&0i64.to_le_bytes()).unwrap();
        let mut encoder = ZlibEncoder::new(&mut file, Compression::best());
        let mut serializer = rmp_serde::Serializer::new(&mut encoder).with_struct_map();
        index.serialize(&mut serializer).unwrap();
        encoder.finish().unwrap();
        let end = file.stream_position().unwrap();
        file.seek(SeekFrom::Start(idx_offset as u64)).unwrap();
        file.write_all(&(end as i64 - idx_offset).to_le_bytes())
            .unwrap();

        file.seek(SeekFrom::Start(IDX_OFFSET_POS)).unwrap();
        file.write_all(&idx_offset.to_le_bytes()).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        file.write_all(FILE_VERSION_COMPAT).unwrap();
    }
}
