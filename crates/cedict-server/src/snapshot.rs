use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use cedict_db::{CedictDb, LoadMode};
use cedict_segment::{GrammarKeywords, MatchResult, SearchOptions, Segmenter, classify};
use tracing::info;

/// Where the three dictionary resources live.
#[derive(Debug, Clone)]
pub struct DictionarySources {
    pub lexicon: PathBuf,
    /// Optional pre-built index; the index is derived when absent or invalid.
    pub index: Option<PathBuf>,
    pub keywords: PathBuf,
    pub mode: LoadMode,
}

impl DictionarySources {
    /// Conventional file names inside one data directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            lexicon: dir.join("cedict_ts.u8"),
            index: Some(dir.join("cedict.idx")),
            keywords: dir.join("grammarKeywordsMin.json"),
            mode: LoadMode::Mmap,
        }
    }
}

/// Lexicon, index and keyword set loaded together and never mutated.
///
/// Shared as `Arc<DictionarySnapshot>`; searches need no locking.
pub struct DictionarySnapshot {
    db: CedictDb,
    keywords: GrammarKeywords,
    segmenter: Segmenter,
}

impl DictionarySnapshot {
    pub fn new(db: CedictDb, keywords: GrammarKeywords) -> Self {
        let segmenter = Segmenter::new(db.max_headword_chars());
        Self {
            db,
            keywords,
            segmenter,
        }
    }

    /// Blocking load of all three resources.
    pub fn load(sources: &DictionarySources) -> Result<Self> {
        let start = Instant::now();
        let db = CedictDb::load_with_mode(&sources.lexicon, sources.index.as_deref(), sources.mode)
            .with_context(|| format!("loading lexicon {}", sources.lexicon.display()))?;
        let stats = db.stats();
        info!(
            "lexicon loaded in {} ms: {} entries, {} headwords ({:?} index)",
            start.elapsed().as_millis(),
            stats.entries,
            db.headword_count(),
            db.index_source()
        );
        if stats.skipped_lines > 0 {
            info!("skipped {} malformed lexicon lines", stats.skipped_lines);
        }

        let keywords = GrammarKeywords::load(&sources.keywords)?;
        info!("loaded {} grammar keywords", keywords.len());

        Ok(Self::new(db, keywords))
    }

    /// Longest match at character `offset`, tagged with its grammar keyword.
    pub fn search(&self, text: &str, offset: usize, options: &SearchOptions) -> MatchResult<'_> {
        let mut result = self
            .segmenter
            .search(text, offset, options, |script, word| {
                self.db.locate_script(script, word)
            });
        classify(&mut result, &self.keywords);
        result
    }

    pub fn is_grammar_keyword(&self, word: &str) -> bool {
        self.keywords.contains(word)
    }

    pub fn db(&self) -> &CedictDb {
        &self.db
    }

    pub fn keywords(&self) -> &GrammarKeywords {
        &self.keywords
    }
}
