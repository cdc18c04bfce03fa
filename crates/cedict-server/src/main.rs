use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use cedict_db::LoadMode;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cedict_server::{AppState, DictionarySources, SnapshotStore, router};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_DIR: &str = "data";
const DEFAULT_LEXICON: &str = "cedict_ts.u8";
const DEFAULT_INDEX: &str = "cedict.idx";
const DEFAULT_KEYWORDS: &str = "grammarKeywordsMin.json";
const DEFAULT_MAX_QUERY_CHARS: usize = 64;

struct Config {
    host: String,
    port: u16,
    sources: DictionarySources,
    max_query_chars: usize,
    start_disabled: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config(env::args().skip(1))?;
    info!("binding to {}:{}", config.host, config.port);
    info!("using lexicon at {}", config.sources.lexicon.display());

    let store = Arc::new(SnapshotStore::new());
    if config.start_disabled {
        info!("starting with the dictionary disabled");
    } else {
        drop(store.spawn_load(config.sources.clone()));
    }

    let state = AppState {
        store,
        sources: config.sources,
        max_query_chars: config.max_query_chars,
    };

    let app = router(state).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

fn load_config(args: impl Iterator<Item = String>) -> anyhow::Result<Config> {
    let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let max_query_chars = env::var("MAX_QUERY_CHARS")
        .ok()
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_QUERY_CHARS);

    let mut dir = env::var("CEDICT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DIR));
    let mut mode = env::var("CEDICT_LOAD_MODE").unwrap_or_else(|_| "mmap".to_string());
    let mut use_index = true;
    let mut start_disabled = false;

    for arg in args {
        if let Some(value) = arg.strip_prefix("--cedict-dir=") {
            dir = PathBuf::from(value);
        } else if let Some(value) = arg.strip_prefix("--load-mode=") {
            mode = value.to_string();
        } else if arg == "--no-index" {
            use_index = false;
        } else if arg == "--start-disabled" {
            start_disabled = true;
        } else {
            bail!("unknown argument {arg}");
        }
    }

    let mode = match mode.as_str() {
        "mmap" => LoadMode::Mmap,
        "owned" => LoadMode::Owned,
        other => bail!("unknown load mode {other} (expected mmap or owned)"),
    };

    let file = |var: &str, default: &str| {
        dir.join(env::var(var).unwrap_or_else(|_| default.to_string()))
    };
    let sources = DictionarySources {
        lexicon: file("CEDICT_FILE", DEFAULT_LEXICON),
        index: use_index.then(|| file("CEDICT_INDEX_FILE", DEFAULT_INDEX)),
        keywords: file("GRAMMAR_KEYWORDS_FILE", DEFAULT_KEYWORDS),
        mode,
    };

    Ok(Config {
        host,
        port,
        sources,
        max_query_chars,
        start_disabled,
    })
}

fn init_tracing() {
    let env_filter = build_env_filter(env::var("RUST_LOG").ok().as_deref());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .init();
}

fn build_env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn env_filter_defaults_to_info() {
        assert_eq!(build_env_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(
            build_env_filter(Some("cedict_db=loudest")).max_level_hint(),
            Some(LevelFilter::INFO)
        );
    }

    #[test]
    fn env_filter_honours_debug_directives() {
        let filter = build_env_filter(Some("info,cedict_db=debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
