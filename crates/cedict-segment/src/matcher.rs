use std::collections::HashSet;

use cedict_types::{DictionaryEntry, Script};

use crate::grammar::GrammarAnnotation;

/// Cap on reported entries when alternates are requested.
pub const DEFAULT_MAX_ENTRIES: usize = 7;

/// A dictionary entry matched at the cursor, with the script it matched in.
#[derive(Clone, Debug)]
pub struct Candidate<'a> {
    pub entry: DictionaryEntry<'a>,
    /// The matched headword, equal to `entry.headword(script)`.
    pub word: &'a str,
    pub script: Script,
}

/// Outcome of one lookup. An empty result means no headword starts at the cursor.
#[derive(Clone, Debug, Default)]
pub struct MatchResult<'a> {
    pub matched_text: String,
    /// Length of the match in characters; 0 on a miss.
    pub match_length: usize,
    /// Entries at the winning length: simplified hits, then traditional hits.
    pub candidates: Vec<Candidate<'a>>,
    /// Shorter matches at the same cursor, longest first. Only filled when
    /// [`SearchOptions::alternates`] is set.
    pub alternates: Vec<Candidate<'a>>,
    /// Set when alternates were cut off at [`SearchOptions::max_entries`].
    pub truncated: bool,
    pub grammar: Option<GrammarAnnotation<'a>>,
}

impl MatchResult<'_> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.match_length == 0
    }
}

/// Per-query knobs.
#[derive(Clone, Debug)]
pub struct SearchOptions {
    /// Keep scanning shorter lengths after the longest match.
    pub alternates: bool,
    /// Upper bound on `candidates + alternates`. The longest-match candidates
    /// are never cut; only alternates are.
    pub max_entries: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            alternates: false,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Greedy longest-match searcher bounded by the longest headword in the lexicon.
#[derive(Clone, Copy, Debug)]
pub struct Segmenter {
    max_headword_chars: usize,
}

impl Segmenter {
    pub fn new(max_headword_chars: usize) -> Self {
        Self { max_headword_chars }
    }

    pub fn max_headword_chars(&self) -> usize {
        self.max_headword_chars
    }

    /// Find the longest headword starting at character offset `start`.
    ///
    /// `lookup(script, word)` returns the entries whose headword in `script`
    /// is exactly `word`, typically by delegating to
    /// `CedictDb::locate_script`. Empty text or an out-of-range `start`
    /// yields an empty result.
    pub fn search<'a, F>(
        &self,
        text: &str,
        start: usize,
        options: &SearchOptions,
        lookup: F,
    ) -> MatchResult<'a>
    where
        F: Fn(Script, &str) -> Vec<DictionaryEntry<'a>>,
    {
        let mut result = MatchResult::empty();

        // Byte offset of every char boundary, including the end of the text.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(idx, _)| idx)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;
        if start >= total {
            return result;
        }
        let max_len = self.max_headword_chars.min(total - start);

        for length in (1..=max_len).rev() {
            let span = &text[bounds[start]..bounds[start + length]];
            let hits = lookup_both_scripts(span, &lookup);
            if hits.is_empty() {
                continue;
            }

            if result.is_empty() {
                result.match_length = length;
                result.matched_text = span.to_string();
                result.candidates = hits;
                if !options.alternates {
                    break;
                }
                continue;
            }

            let room = options
                .max_entries
                .saturating_sub(result.candidates.len() + result.alternates.len());
            if hits.len() > room {
                result.alternates.extend(hits.into_iter().take(room));
                result.truncated = true;
                break;
            }
            result.alternates.extend(hits);
        }

        result
    }
}

fn lookup_both_scripts<'a, F>(span: &str, lookup: &F) -> Vec<Candidate<'a>>
where
    F: Fn(Script, &str) -> Vec<DictionaryEntry<'a>>,
{
    let mut seen: HashSet<u32> = HashSet::new();
    let mut out = Vec::new();
    for script in Script::ALL {
        for entry in lookup(script, span) {
            if seen.insert(entry.offset) {
                out.push(Candidate {
                    word: entry.headword(script),
                    entry,
                    script,
                });
            }
        }
    }
    out
}
