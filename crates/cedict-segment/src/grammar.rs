use cedict_types::char_len;

use crate::keywords::GrammarKeywords;
use crate::matcher::MatchResult;

/// Marks the candidate whose headword is a grammar keyword.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GrammarAnnotation<'a> {
    pub keyword: &'a str,
    /// Position in [`MatchResult::candidates`].
    pub candidate_index: usize,
}

/// Attach a grammar annotation to `result` if a longest-length candidate is a keyword.
///
/// Every candidate is scanned and each qualifying one overwrites the previous
/// annotation, so the last qualifying candidate in order is the one kept.
/// Highlighting in existing callers depends on this; it is not a ranking.
pub fn classify<'a>(result: &mut MatchResult<'a>, keywords: &GrammarKeywords) {
    for (idx, candidate) in result.candidates.iter().enumerate() {
        if keywords.contains(candidate.word) && char_len(candidate.word) == result.match_length {
            result.grammar = Some(GrammarAnnotation {
                keyword: candidate.word,
                candidate_index: idx,
            });
        }
    }
}
