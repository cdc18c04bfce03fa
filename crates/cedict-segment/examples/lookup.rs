use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use cedict_db::CedictDb;
use cedict_segment::{GrammarKeywords, SearchOptions, Segmenter, classify};

fn main() -> Result<()> {
    let usage = "usage: cargo run -p cedict-segment --example lookup -- <dict-dir> <text> [offset]";
    let mut args = env::args().skip(1);
    let dict_dir = args.next().map(PathBuf::from).context(usage)?;
    let text = args.next().context(usage)?;
    let offset = match args.next() {
        Some(raw) => raw.parse::<usize>().context("offset must be a number")?,
        None => 0,
    };
    if args.next().is_some() {
        bail!("too many arguments");
    }

    let index = dict_dir.join("cedict.idx");
    let db = CedictDb::load(dict_dir.join("cedict_ts.u8"), Some(&index))
        .with_context(|| format!("loading CC-CEDICT from {}", dict_dir.display()))?;
    let keywords = GrammarKeywords::load(dict_dir.join("grammarKeywordsMin.json"))?;
    let segmenter = Segmenter::new(db.max_headword_chars());

    let options = SearchOptions {
        alternates: true,
        ..SearchOptions::default()
    };
    let mut result = segmenter.search(&text, offset, &options, |script, word| {
        db.locate_script(script, word)
    });
    classify(&mut result, &keywords);

    if result.is_empty() {
        println!("no entry starts at offset {offset}");
        return Ok(());
    }

    println!("Match: {} ({} chars)", result.matched_text, result.match_length);
    for (idx, cand) in result.candidates.iter().enumerate() {
        let marker = match result.grammar {
            Some(g) if g.candidate_index == idx => " [grammar]",
            _ => "",
        };
        println!(
            "  {:<8} [{}] ({}) {}{}",
            cand.word,
            cand.entry.pinyin_text(),
            cand.script,
            cand.entry.definitions.join("; "),
            marker
        );
    }
    for cand in &result.alternates {
        println!("  shorter: {} [{}]", cand.word, cand.entry.pinyin_text());
    }
    if result.truncated {
        println!("  ...");
    }

    Ok(())
}
