use std::env;
use std::path::PathBuf;

use cedict_db::{CedictDb, LoadMode};
use cedict_types::Script;

fn cedict_dir() -> Option<PathBuf> {
    env::var("CEDICT_DIR").ok().map(PathBuf::from)
}

#[test]
fn loads_full_cc_cedict() {
    let Some(dir) = cedict_dir() else {
        eprintln!("skipping: CEDICT_DIR not set");
        return;
    };
    let index = dir.join("cedict.idx");
    let db = CedictDb::load_with_mode(dir.join("cedict_ts.u8"), Some(&index), LoadMode::Mmap)
        .expect("load cc-cedict");

    assert!(db.entry_count() > 100_000, "lexicon too small");
    assert!(db.headword_count() > 100_000, "index too small");
    assert!(!db.locate_script(Script::Simplified, "你好").is_empty());
    assert!(!db.locate_script(Script::Traditional, "圖書館").is_empty());
}
