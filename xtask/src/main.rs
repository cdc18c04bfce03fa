use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cedict_db::{CedictDb, IndexSource, LoadMode, validate_index};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Dictionary maintenance utilities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the headword index from a lexicon and write it out.
    BuildIndex {
        #[arg(long)]
        lexicon: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Check that a pre-built index is sorted and matches its lexicon.
    CheckIndex {
        #[arg(long)]
        lexicon: PathBuf,
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::BuildIndex { lexicon, output } => build_index(&lexicon, &output)?,
        Commands::CheckIndex { lexicon, index } => check_index(&lexicon, &index)?,
    }

    Ok(())
}

fn build_index(lexicon: &Path, output: &Path) -> Result<()> {
    let db = CedictDb::load_with_mode(lexicon, None, LoadMode::Owned)?;
    let file = File::create(output).with_context(|| format!("create {}", output.display()))?;
    db.write_index(BufWriter::new(file))?;

    let stats = db.stats();
    println!(
        "Wrote {} headwords for {} entries to {} ({} malformed lines skipped).",
        db.headword_count(),
        stats.entries,
        output.display(),
        stats.skipped_lines
    );
    Ok(())
}

fn check_index(lexicon: &Path, index: &Path) -> Result<()> {
    let bytes = std::fs::read(index).with_context(|| format!("read {}", index.display()))?;
    let summary =
        validate_index(&bytes).with_context(|| format!("validate {}", index.display()))?;
    if summary.skipped_lines > 0 {
        eprintln!("{} malformed index lines ignored", summary.skipped_lines);
    }

    let db = CedictDb::load_with_mode(lexicon, Some(index), LoadMode::Owned)?;
    if let Some(reason) = db.index_rejection() {
        bail!(
            "{} does not match {}: {reason}; rebuild with `xtask build-index`",
            index.display(),
            lexicon.display()
        );
    }
    if db.index_source() != IndexSource::Prebuilt {
        bail!("{} was not loaded", index.display());
    }

    println!(
        "Index {} is sorted and covers all {} headwords.",
        index.display(),
        summary.headwords
    );
    Ok(())
}
