use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use cedict_db::{CedictDb, LoadMode};
use cedict_types::Script;

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let lexicon = args.next().map(PathBuf::from).context(
        "usage: cargo run -p cedict-db --example stats -- <cedict_ts.u8> [cedict.idx]",
    )?;
    let index = args.next().map(PathBuf::from);

    let db = CedictDb::load_with_mode(&lexicon, index.as_deref(), LoadMode::Mmap)
        .with_context(|| format!("loading CC-CEDICT from {}", lexicon.display()))?;

    let mut definition_count = 0usize;
    let mut same_script = 0usize;
    for entry in db.iter_entries() {
        definition_count += entry.definitions.len();
        if entry.simplified == entry.traditional {
            same_script += 1;
        }
    }

    let stats = db.stats();
    println!("Lexicon      : {}", lexicon.display());
    println!("Index source : {:?}", db.index_source());
    println!("Entries      : {}", db.entry_count());
    println!("Headwords    : {}", db.headword_count());
    println!("Definitions  : {}", definition_count);
    println!("Same in both scripts: {}", same_script);
    println!("Longest headword (chars): {}", db.max_headword_chars());
    println!("Skipped lexicon lines : {}", stats.skipped_lines);
    println!("Skipped index lines   : {}", stats.skipped_index_lines);
    println!("Toneless syllables    : {}", stats.toneless_syllables);
    println!("Pinyin/char mismatches: {}", stats.pinyin_mismatches);
    if let Some(reason) = db.index_rejection() {
        println!("Pre-built index rejected: {reason}");
    }

    // Spot-check a couple of headwords to confirm lookup.
    for (script, headword) in [(Script::Simplified, "你好"), (Script::Traditional, "圖書館")] {
        println!(
            "Headword '{}' ({}) entries: {}",
            headword,
            script,
            db.locate_script(script, headword).len()
        );
    }

    Ok(())
}
