use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeywordError {
    #[error("invalid grammar keyword list: {0}")]
    Parse(#[from] serde_json::Error),
}

// Accepted shapes: `["的", "了"]` or `{"的": true, "了": 1}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum KeywordFile {
    List(Vec<String>),
    Map(HashMap<String, Value>),
}

/// Headwords flagged as grammatical function words.
#[derive(Clone, Debug, Default)]
pub struct GrammarKeywords {
    words: HashSet<String>,
}

impl GrammarKeywords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a keyword list from JSON.
    ///
    /// In the object form only keys with a truthy value count as keywords;
    /// `false`, `null`, `0` and `""` switch a key off.
    pub fn from_json(json: &str) -> Result<Self, KeywordError> {
        let words = match serde_json::from_str::<KeywordFile>(json)? {
            KeywordFile::List(words) => words.into_iter().collect(),
            KeywordFile::Map(map) => map
                .into_iter()
                .filter(|(_, flag)| is_truthy(flag))
                .map(|(word, _)| word)
                .collect(),
        };
        Ok(Self { words })
    }

    /// Load a keyword list from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("read grammar keywords {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("parse {}", path.display()))
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
