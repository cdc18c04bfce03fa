//! Load CC-CEDICT lexicons with a sorted, binary-searchable headword index.
//!
//! This crate ingests the flat `cedict_ts.u8` lexicon (one entry per line,
//! `TRAD SIMP [pin1 yin1] /gloss/gloss/`) and, optionally, a pre-built index
//! file (`HEADWORD,OFFSET[,OFFSET...]`, one line per headword, sorted by the
//! UTF-8 bytes of the headword). All text is exposed as `&str` slices borrowed
//! from the original bytes. Callers choose between memory-mapped files or owned
//! buffers at runtime via [`LoadMode`].
//!
//! Loading is forgiving per line and strict about structure:
//! - malformed lexicon or index lines are skipped and counted in [`LoadStats`];
//! - a pre-built index that is not strictly sorted, points at entries that do
//!   not carry its headwords, or leaves entries unreachable is rejected
//!   ([`CedictDb::index_rejection`]) and the index is derived from the lexicon;
//! - a lexicon that yields no entries at all fails the load.
//!
//! # Example
//! ```no_run
//! use std::path::Path;
//! use cedict_db::{CedictDb, LoadMode};
//! use cedict_types::Script;
//!
//! # fn main() -> anyhow::Result<()> {
//! let db = CedictDb::load_with_mode(
//!     "data/cedict_ts.u8",
//!     Some(Path::new("data/cedict.idx")),
//!     LoadMode::Mmap,
//! )?;
//! for entry in db.locate_script(Script::Simplified, "你好") {
//!     println!("{} [{}] {:?}", entry.simplified, entry.pinyin_text(), entry.definitions);
//! }
//! # Ok(()) }
//! ```
//!
//! For a runnable demo, see `cargo run -p cedict-db --example stats -- <lexicon> [index]`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use cedict_types::{DictionaryEntry, IndexRecord, Script, char_len, parse_syllable};
use memmap2::Mmap;
use thiserror::Error;
use tracing::{debug, warn};

const BOM: &[u8] = "\u{feff}".as_bytes();

/// Strategy for loading dictionary files.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map each file (fast, zero-copy).
    Mmap,
    /// Read each file into an owned buffer (portable fallback).
    Owned,
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FileKind {
    Lexicon,
    Index,
}

#[derive(Clone, Copy)]
struct TextRef {
    file: FileKind,
    start: usize,
    len: usize,
}

struct DictFiles {
    lexicon: Buffer,
    index: Option<Buffer>,
}

impl DictFiles {
    fn load(lexicon: &Path, index: Option<&Path>, mode: LoadMode) -> Result<Self> {
        let lexicon = load_file(lexicon, mode)?;
        let index = match index {
            Some(path) => match load_optional_file(path, mode) {
                Ok(buffer) => buffer,
                Err(err) => {
                    warn!("ignoring unreadable pre-built index: {err:#}");
                    None
                }
            },
            None => None,
        };
        Ok(Self { lexicon, index })
    }

    fn bytes(&self, file: FileKind) -> &[u8] {
        match file {
            FileKind::Lexicon => self.lexicon.as_slice(),
            FileKind::Index => self.index.as_ref().map(Buffer::as_slice).unwrap_or(&[]),
        }
    }

    fn text(&self, r: TextRef) -> &str {
        let bytes = self.bytes(r.file);
        // Every TextRef is cut from a line that already passed UTF-8 validation.
        std::str::from_utf8(&bytes[r.start..r.start + r.len]).unwrap_or_default()
    }
}

struct EntryData {
    offset: u32,
    raw: TextRef,
    traditional: TextRef,
    simplified: TextRef,
    pinyin: Vec<TextRef>,
    definitions: Vec<TextRef>,
}

struct HeadwordSlot {
    headword: TextRef,
    offsets: Vec<u32>,
}

/// Where the headword index in use came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexSource {
    /// Parsed from a pre-built index file.
    Prebuilt,
    /// Sorted from the parsed lexicon at load time.
    Derived,
}

/// Diagnostic counters collected while loading. None of them are fatal.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LoadStats {
    pub entries: usize,
    pub skipped_lines: usize,
    pub skipped_index_lines: usize,
    pub toneless_syllables: usize,
    pub pinyin_mismatches: usize,
}

/// Structural problems with a pre-built index file.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index line {line}: headword {current:?} does not sort after {previous:?}")]
    Unsorted {
        line: usize,
        previous: String,
        current: String,
    },
    #[error("index contains no usable lines")]
    Empty,
    #[error("index headword {headword:?} points at offset {offset}, which holds no entry for it")]
    Stale { headword: String, offset: u32 },
    #[error("index leaves {missing} headword/entry pairs of the lexicon unreachable")]
    Incomplete { missing: usize },
}

/// Result of validating a pre-built index without a lexicon.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IndexSummary {
    pub headwords: usize,
    pub skipped_lines: usize,
}

#[derive(Debug, Error)]
enum LineError {
    #[error("missing headwords")]
    MissingHeadword,
    #[error("missing bracketed pinyin")]
    MissingPinyin,
    #[error("missing definitions")]
    MissingDefinitions,
    #[error("offset does not fit in 32 bits")]
    OffsetOverflow,
}

/// In-memory view of a CC-CEDICT lexicon backed by mmap or owned buffers.
pub struct CedictDb {
    files: DictFiles,
    entries: Vec<EntryData>,
    index: Vec<HeadwordSlot>,
    index_source: IndexSource,
    index_rejection: Option<IndexError>,
    max_headword_chars: usize,
    stats: LoadStats,
}

impl CedictDb {
    /// Load a lexicon and optional pre-built index, memory-mapping both.
    pub fn load(lexicon: impl AsRef<Path>, index: Option<&Path>) -> Result<Self> {
        Self::load_with_mode(lexicon, index, LoadMode::Mmap)
    }

    /// Load choosing between mmap and owned buffers at runtime.
    ///
    /// A missing or unreadable index file is not an error; the index is then
    /// derived from the lexicon.
    pub fn load_with_mode(
        lexicon: impl AsRef<Path>,
        index: Option<&Path>,
        mode: LoadMode,
    ) -> Result<Self> {
        let lexicon = lexicon.as_ref();
        if !lexicon.exists() {
            anyhow::bail!("missing lexicon file: {}", lexicon.display());
        }
        let files = DictFiles::load(lexicon, index, mode)?;
        Self::build(files).with_context(|| format!("building lexicon {}", lexicon.display()))
    }

    /// Build from in-memory lexicon text and optional index text.
    pub fn from_text(lexicon: impl Into<String>, index: Option<String>) -> Result<Self> {
        let files = DictFiles {
            lexicon: Buffer::Owned(lexicon.into().into_bytes()),
            index: index.map(|text| Buffer::Owned(text.into_bytes())),
        };
        Self::build(files)
    }

    fn build(files: DictFiles) -> Result<Self> {
        let mut stats = LoadStats::default();
        let entries = parse_lexicon(files.bytes(FileKind::Lexicon), &mut stats);
        if entries.is_empty() {
            anyhow::bail!(
                "lexicon contains no entries ({} malformed lines)",
                stats.skipped_lines
            );
        }
        stats.entries = entries.len();

        let mut index_rejection = None;
        let prebuilt = if files.index.is_some() {
            let checked = parse_index(files.bytes(FileKind::Index), FileKind::Index).and_then(
                |(slots, skipped)| {
                    check_coverage(&files, &entries, &slots)?;
                    Ok((slots, skipped))
                },
            );
            match checked {
                Ok((slots, skipped)) => {
                    stats.skipped_index_lines = skipped;
                    Some(slots)
                }
                Err(err) => {
                    warn!("pre-built index rejected, deriving from lexicon: {err}");
                    index_rejection = Some(err);
                    None
                }
            }
        } else {
            None
        };
        let (index, index_source) = match prebuilt {
            Some(slots) => (slots, IndexSource::Prebuilt),
            None => (derive_index(&files, &entries), IndexSource::Derived),
        };

        let max_headword_chars = entries
            .iter()
            .flat_map(|e| [e.traditional, e.simplified])
            .map(|r| char_len(files.text(r)))
            .max()
            .unwrap_or(0);

        Ok(Self {
            files,
            entries,
            index,
            index_source,
            index_rejection,
            max_headword_chars,
            stats,
        })
    }

    /// Fetch the index record for an exact headword in either script.
    pub fn index_record(&self, headword: &str) -> Option<IndexRecord<'_>> {
        let pos = self
            .index
            .binary_search_by(|slot| self.files.text(slot.headword).cmp(headword))
            .ok()?;
        let slot = &self.index[pos];
        Some(IndexRecord {
            headword: self.files.text(slot.headword),
            offsets: slot.offsets.as_slice(),
        })
    }

    /// Check whether a headword is indexed.
    pub fn headword_exists(&self, headword: &str) -> bool {
        self.index_record(headword).is_some()
    }

    /// All entries indexed under `headword`, in index order.
    ///
    /// Offsets that do not resolve to a parsed entry are skipped.
    pub fn locate(&self, headword: &str) -> Vec<DictionaryEntry<'_>> {
        self.resolve(headword)
            .map(|data| self.make_entry_view(data))
            .collect()
    }

    /// Entries whose headword in `script` is exactly `headword`.
    pub fn locate_script(&self, script: Script, headword: &str) -> Vec<DictionaryEntry<'_>> {
        self.resolve(headword)
            .filter(|data| {
                let text = match script {
                    Script::Simplified => data.simplified,
                    Script::Traditional => data.traditional,
                };
                self.files.text(text) == headword
            })
            .map(|data| self.make_entry_view(data))
            .collect()
    }

    /// Fetch the entry whose line starts at `offset`.
    pub fn entry_at(&self, offset: u32) -> Option<DictionaryEntry<'_>> {
        self.entry_data(offset).map(|data| self.make_entry_view(data))
    }

    /// Iterate over all entries in lexicon order.
    pub fn iter_entries(&self) -> impl Iterator<Item = DictionaryEntry<'_>> + '_ {
        self.entries.iter().map(|data| self.make_entry_view(data))
    }

    /// Iterate over index records in sorted headword order.
    pub fn iter_index(&self) -> impl Iterator<Item = IndexRecord<'_>> + '_ {
        self.index.iter().map(|slot| IndexRecord {
            headword: self.files.text(slot.headword),
            offsets: slot.offsets.as_slice(),
        })
    }

    /// Number of parsed entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of distinct indexed headwords.
    pub fn headword_count(&self) -> usize {
        self.index.len()
    }

    /// Longest headword, in characters, observed in the lexicon.
    pub fn max_headword_chars(&self) -> usize {
        self.max_headword_chars
    }

    pub fn index_source(&self) -> IndexSource {
        self.index_source
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// Why the pre-built index was not used, if one was supplied and rejected.
    pub fn index_rejection(&self) -> Option<&IndexError> {
        self.index_rejection.as_ref()
    }

    /// Write the index in the pre-built `HEADWORD,OFFSET[,OFFSET...]` format.
    pub fn write_index(&self, mut out: impl Write) -> Result<()> {
        for record in self.iter_index() {
            out.write_all(record.headword.as_bytes())?;
            for offset in record.offsets {
                write!(out, ",{offset}")?;
            }
            out.write_all(b"\n")?;
        }
        out.flush().context("flush index output")
    }

    fn resolve<'a>(&'a self, headword: &str) -> impl Iterator<Item = &'a EntryData> + 'a {
        let (headword, offsets): (&'a str, &'a [u32]) = self
            .index_record(headword)
            .map(|record| (record.headword, record.offsets))
            .unwrap_or_default();
        offsets
            .iter()
            .filter_map(move |offset| self.entry_data(*offset))
            .filter(move |data| {
                self.files.text(data.simplified) == headword
                    || self.files.text(data.traditional) == headword
            })
    }

    fn entry_data(&self, offset: u32) -> Option<&EntryData> {
        self.entries
            .binary_search_by_key(&offset, |e| e.offset)
            .ok()
            .map(|pos| &self.entries[pos])
    }

    fn make_entry_view<'a>(&'a self, data: &'a EntryData) -> DictionaryEntry<'a> {
        DictionaryEntry {
            offset: data.offset,
            traditional: self.files.text(data.traditional),
            simplified: self.files.text(data.simplified),
            pinyin: data
                .pinyin
                .iter()
                .map(|r| parse_syllable(self.files.text(*r)))
                .collect(),
            definitions: data
                .definitions
                .iter()
                .map(|r| self.files.text(*r))
                .collect(),
            raw: self.files.text(data.raw),
        }
    }
}

/// Validate a pre-built index on its own: sorted order and line syntax.
pub fn validate_index(bytes: &[u8]) -> Result<IndexSummary, IndexError> {
    parse_index(bytes, FileKind::Index).map(|(slots, skipped_lines)| IndexSummary {
        headwords: slots.len(),
        skipped_lines,
    })
}

fn load_file(path: &Path, mode: LoadMode) -> Result<Buffer> {
    match mode {
        LoadMode::Mmap => {
            let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            unsafe { Mmap::map(&file) }
                .map(Buffer::Mmap)
                .with_context(|| format!("mmap {}", path.display()))
        }
        LoadMode::Owned => {
            let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)
                .with_context(|| format!("read {}", path.display()))?;
            Ok(Buffer::Owned(buf))
        }
    }
}

fn load_optional_file(path: &Path, mode: LoadMode) -> Result<Option<Buffer>> {
    if !path.exists() {
        debug!("no pre-built index at {}", path.display());
        return Ok(None);
    }
    load_file(path, mode).map(Some)
}

fn parse_lexicon(bytes: &[u8], stats: &mut LoadStats) -> Vec<EntryData> {
    let mut entries = Vec::new();
    for (lineno, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line = strip_bom(lineno, strip_cr(raw_line));
        if line.iter().all(u8::is_ascii_whitespace) || line.starts_with(b"#") {
            continue;
        }
        let Ok(line_str) = std::str::from_utf8(line) else {
            stats.skipped_lines += 1;
            debug!("lexicon:{} skipped: invalid utf-8", lineno + 1);
            continue;
        };
        match parse_entry(bytes, line_str, stats) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                stats.skipped_lines += 1;
                debug!("lexicon:{} skipped: {reason}", lineno + 1);
            }
        }
    }
    entries
}

fn parse_entry(root: &[u8], line: &str, stats: &mut LoadStats) -> Result<EntryData, LineError> {
    let offset = u32::try_from(line.as_ptr() as usize - root.as_ptr() as usize)
        .map_err(|_| LineError::OffsetOverflow)?;

    let (traditional, rest) = line.split_once(' ').ok_or(LineError::MissingHeadword)?;
    let (simplified, rest) = rest
        .trim_start()
        .split_once(' ')
        .ok_or(LineError::MissingHeadword)?;
    if traditional.is_empty() || simplified.is_empty() || simplified.starts_with('[') {
        return Err(LineError::MissingHeadword);
    }

    let rest = rest
        .trim_start()
        .strip_prefix('[')
        .ok_or(LineError::MissingPinyin)?;
    let (pinyin, rest) = rest.split_once(']').ok_or(LineError::MissingPinyin)?;

    let glosses = rest
        .trim()
        .strip_prefix('/')
        .ok_or(LineError::MissingDefinitions)?;
    let definitions: Vec<TextRef> = glosses
        .split('/')
        .map(str::trim)
        .filter(|gloss| !gloss.is_empty())
        .map(|gloss| text_ref_str(FileKind::Lexicon, root, gloss))
        .collect();
    if definitions.is_empty() {
        return Err(LineError::MissingDefinitions);
    }

    let syllables: Vec<&str> = pinyin.split_ascii_whitespace().collect();
    stats.toneless_syllables += syllables
        .iter()
        .filter(|token| parse_syllable(token).toneless)
        .count();
    if syllables.len() != char_len(simplified) {
        stats.pinyin_mismatches += 1;
        debug!(
            "{simplified}: {} syllables for {} characters",
            syllables.len(),
            char_len(simplified)
        );
    }

    Ok(EntryData {
        offset,
        raw: text_ref_str(FileKind::Lexicon, root, line),
        traditional: text_ref_str(FileKind::Lexicon, root, traditional),
        simplified: text_ref_str(FileKind::Lexicon, root, simplified),
        pinyin: syllables
            .into_iter()
            .map(|token| text_ref_str(FileKind::Lexicon, root, token))
            .collect(),
        definitions,
    })
}

fn parse_index(bytes: &[u8], file: FileKind) -> Result<(Vec<HeadwordSlot>, usize), IndexError> {
    let mut slots = Vec::new();
    let mut skipped = 0usize;
    let mut previous: Option<&str> = None;

    for (lineno, raw_line) in bytes.split(|b| *b == b'\n').enumerate() {
        let line = strip_bom(lineno, strip_cr(raw_line));
        if line.is_empty() {
            continue;
        }
        let Some((headword, offsets)) = std::str::from_utf8(line)
            .ok()
            .and_then(parse_index_line)
        else {
            skipped += 1;
            debug!("index:{} skipped: malformed line", lineno + 1);
            continue;
        };

        if let Some(prev) = previous
            && headword <= prev
        {
            return Err(IndexError::Unsorted {
                line: lineno + 1,
                previous: prev.to_string(),
                current: headword.to_string(),
            });
        }
        previous = Some(headword);

        slots.push(HeadwordSlot {
            headword: text_ref_str(file, bytes, headword),
            offsets,
        });
    }

    if slots.is_empty() {
        return Err(IndexError::Empty);
    }
    Ok((slots, skipped))
}

fn parse_index_line(line: &str) -> Option<(&str, Vec<u32>)> {
    let (headword, rest) = line.split_once(',')?;
    if headword.is_empty() {
        return None;
    }
    let offsets = rest
        .split(',')
        .map(|token| token.trim().parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    Some((headword, offsets))
}

/// Check a parsed pre-built index against the lexicon it claims to cover.
///
/// Every offset must land on an entry carrying the slot's headword in one of
/// its scripts, and every entry must be reachable from each of its headwords.
fn check_coverage(
    files: &DictFiles,
    entries: &[EntryData],
    slots: &[HeadwordSlot],
) -> Result<(), IndexError> {
    let entry_at = |offset: u32| {
        entries
            .binary_search_by_key(&offset, |e| e.offset)
            .ok()
            .map(|pos| &entries[pos])
    };

    let mut covered = 0usize;
    for slot in slots {
        let headword = files.text(slot.headword);
        let mut offsets = slot.offsets.clone();
        offsets.sort_unstable();
        offsets.dedup();
        for offset in offsets {
            let matches = entry_at(offset).is_some_and(|entry| {
                files.text(entry.simplified) == headword
                    || files.text(entry.traditional) == headword
            });
            if !matches {
                return Err(IndexError::Stale {
                    headword: headword.to_string(),
                    offset,
                });
            }
            covered += 1;
        }
    }

    // Slot headwords are unique, so each counted pair is a distinct
    // (headword, entry) and equal totals mean full coverage.
    let required: usize = entries
        .iter()
        .map(|e| {
            if files.text(e.simplified) == files.text(e.traditional) {
                1
            } else {
                2
            }
        })
        .sum();
    if covered < required {
        return Err(IndexError::Incomplete {
            missing: required - covered,
        });
    }
    Ok(())
}

fn derive_index(files: &DictFiles, entries: &[EntryData]) -> Vec<HeadwordSlot> {
    let mut keys: Vec<(TextRef, u32)> = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        keys.push((entry.simplified, entry.offset));
        if files.text(entry.traditional) != files.text(entry.simplified) {
            keys.push((entry.traditional, entry.offset));
        }
    }
    keys.sort_by(|a, b| {
        files
            .text(a.0)
            .cmp(files.text(b.0))
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut slots: Vec<HeadwordSlot> = Vec::new();
    for (headword, offset) in keys {
        match slots.last_mut() {
            Some(slot) if files.text(slot.headword) == files.text(headword) => {
                slot.offsets.push(offset)
            }
            _ => slots.push(HeadwordSlot {
                headword,
                offsets: vec![offset],
            }),
        }
    }
    slots
}

fn text_ref_str(file: FileKind, root: &[u8], token: &str) -> TextRef {
    let start = token.as_ptr() as usize - root.as_ptr() as usize;
    TextRef {
        file,
        start,
        len: token.len(),
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    if line.ends_with(b"\r") {
        &line[..line.len() - 1]
    } else {
        line
    }
}

fn strip_bom(lineno: usize, line: &[u8]) -> &[u8] {
    if lineno == 0 {
        line.strip_prefix(BOM).unwrap_or(line)
    } else {
        line
    }
}
