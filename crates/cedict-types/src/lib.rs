//! Shared, zero-copy types that mirror the CC-CEDICT line format.
//!
//! A CC-CEDICT line looks like
//! `傳統 传统 [chuan2 tong3] /tradition/traditional/`: traditional headword,
//! simplified headword, bracketed numbered pinyin and slash-delimited glosses.
//! Text fields borrow from a backing buffer (`&str`); the byte `offset` of the
//! line in the lexicon is kept as the entry's identity.
//!
//! Use [`Script`] to say which orthography a headword was matched in,
//! [`DictionaryEntry`] and [`IndexRecord`] to inspect parsed records, and
//! [`parse_syllable`] to split a pinyin token into its base and tone.
//!
//! ```rust
//! use cedict_types::{Script, Tone, parse_syllable};
//!
//! let syl = parse_syllable("hao3");
//! assert_eq!(syl.text, "hao");
//! assert_eq!(syl.tone, Tone::Third);
//! assert_eq!(Script::Traditional.to_string(), "traditional");
//! ```

use std::fmt;

/// Orthography a headword is written in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Script {
    Simplified,
    Traditional,
}

impl Script {
    /// Lookup order used by the matcher: simplified hits come first.
    pub const ALL: [Script; 2] = [Script::Simplified, Script::Traditional];

    pub fn as_str(self) -> &'static str {
        match self {
            Script::Simplified => "simplified",
            Script::Traditional => "traditional",
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mandarin tone carried by a numbered pinyin syllable.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Tone {
    First,
    Second,
    Third,
    Fourth,
    Neutral,
}

impl Tone {
    /// Parse a trailing tone digit. `5` and `0` both mean neutral.
    pub fn from_digit(c: char) -> Option<Self> {
        match c {
            '1' => Some(Tone::First),
            '2' => Some(Tone::Second),
            '3' => Some(Tone::Third),
            '4' => Some(Tone::Fourth),
            '5' | '0' => Some(Tone::Neutral),
            _ => None,
        }
    }

    /// Tone number in the 1-5 range, 5 being neutral.
    pub fn number(self) -> u8 {
        match self {
            Tone::First => 1,
            Tone::Second => 2,
            Tone::Third => 3,
            Tone::Fourth => 4,
            Tone::Neutral => 5,
        }
    }
}

/// One pinyin syllable split into base romanization and tone.
///
/// `toneless` is set when the source token had no tone digit (latin letters
/// inside headwords, punctuation such as `·`). Such syllables are stored with
/// [`Tone::Neutral`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Syllable<'a> {
    pub text: &'a str,
    pub tone: Tone,
    pub toneless: bool,
}

impl fmt::Display for Syllable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.toneless {
            f.write_str(self.text)
        } else {
            write!(f, "{}{}", self.text, self.tone.number())
        }
    }
}

/// Split a numbered pinyin token (`zhong1`, `r5`, `nu:3`) into base and tone.
pub fn parse_syllable(token: &str) -> Syllable<'_> {
    let mut chars = token.chars();
    match chars.next_back().and_then(Tone::from_digit) {
        Some(tone) => Syllable {
            text: chars.as_str(),
            tone,
            toneless: false,
        },
        None => Syllable {
            text: token,
            tone: Tone::Neutral,
            toneless: true,
        },
    }
}

/// Complete lexicon record for one traditional/simplified/pinyin pairing.
#[derive(Clone, Debug)]
pub struct DictionaryEntry<'a> {
    /// Byte offset of the source line; unique per entry.
    pub offset: u32,
    pub traditional: &'a str,
    pub simplified: &'a str,
    pub pinyin: Vec<Syllable<'a>>,
    pub definitions: Vec<&'a str>,
    /// The whole source line, without the line terminator.
    pub raw: &'a str,
}

impl<'a> DictionaryEntry<'a> {
    /// Headword as written in the given script.
    pub fn headword(&self, script: Script) -> &'a str {
        match script {
            Script::Simplified => self.simplified,
            Script::Traditional => self.traditional,
        }
    }

    /// Pinyin joined back into the space-separated numbered form.
    pub fn pinyin_text(&self) -> String {
        self.pinyin
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Index record mapping a headword to the offsets of its homograph entries.
#[derive(Clone, Debug)]
pub struct IndexRecord<'a> {
    pub headword: &'a str,
    pub offsets: &'a [u32],
}

/// Length of `text` in characters, the unit every match length is counted in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_syllables() {
        assert_eq!(
            parse_syllable("zhong1"),
            Syllable {
                text: "zhong",
                tone: Tone::First,
                toneless: false
            }
        );
        assert_eq!(parse_syllable("ma5").tone, Tone::Neutral);
        assert_eq!(parse_syllable("lu:4").text, "lu:");
        assert_eq!(parse_syllable("r5").text, "r");
    }

    #[test]
    fn flags_syllables_without_tone() {
        let syl = parse_syllable("K");
        assert_eq!(syl.text, "K");
        assert_eq!(syl.tone, Tone::Neutral);
        assert!(syl.toneless);
        assert!(parse_syllable("·").toneless);
        assert!(parse_syllable("").toneless);
    }

    #[test]
    fn displays_syllables_and_pinyin() {
        assert_eq!(parse_syllable("ni3").to_string(), "ni3");
        assert_eq!(parse_syllable("O").to_string(), "O");
        assert_eq!(parse_syllable("de0").to_string(), "de5");

        let entry = DictionaryEntry {
            offset: 0,
            traditional: "你好",
            simplified: "你好",
            pinyin: vec![parse_syllable("ni3"), parse_syllable("hao3")],
            definitions: vec!["hello"],
            raw: "你好 你好 [ni3 hao3] /hello/",
        };
        assert_eq!(entry.pinyin_text(), "ni3 hao3");
        assert_eq!(entry.headword(Script::Traditional), "你好");
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(char_len("你好"), 2);
        assert_eq!(char_len("卡拉OK"), 4);
        assert_eq!(char_len(""), 0);
    }
}
