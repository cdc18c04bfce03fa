//! Longest-match (maximal munch) headword lookup with grammar keyword tagging.
//!
//! Given a text and a cursor position, the [`Segmenter`] finds the longest
//! headword starting at the cursor and returns every entry sharing it. The
//! crate is decoupled from any particular loader; it only depends on
//! `cedict-types` and a lookup callback you supply.
//!
//! # How it works
//! 1. Clamp the candidate length to the longest headword and the remaining text.
//! 2. Try each length from longest to shortest, querying the simplified and
//!    then the traditional script for the same span.
//! 3. Stop at the first length with hits; merge them, simplified first,
//!    de-duplicating entries that match in both scripts.
//! 4. [`classify`] tags the result when a longest-length candidate is a
//!    [`GrammarKeywords`] member. The last qualifying candidate wins.
//!
//! # Example
//! ```no_run
//! use cedict_db::CedictDb;
//! use cedict_segment::{GrammarKeywords, SearchOptions, Segmenter, classify};
//!
//! # fn main() -> anyhow::Result<()> {
//! let db = CedictDb::load("data/cedict_ts.u8", None)?;
//! let keywords = GrammarKeywords::load("data/grammarKeywordsMin.json")?;
//! let segmenter = Segmenter::new(db.max_headword_chars());
//!
//! let mut result = segmenter.search("我的书", 1, &SearchOptions::default(), |script, word| {
//!     db.locate_script(script, word)
//! });
//! classify(&mut result, &keywords);
//! println!("{} ({} chars)", result.matched_text, result.match_length);
//! println!("grammar: {:?}", result.grammar);
//! # Ok(()) }
//! ```
//!
//! For a runnable demo, see
//! `cargo run -p cedict-segment --example lookup -- <dict-dir> <text> [offset]`.

pub mod grammar;
pub mod keywords;
pub mod matcher;

pub use grammar::{GrammarAnnotation, classify};
pub use keywords::{GrammarKeywords, KeywordError};
pub use matcher::{Candidate, DEFAULT_MAX_ENTRIES, MatchResult, SearchOptions, Segmenter};
