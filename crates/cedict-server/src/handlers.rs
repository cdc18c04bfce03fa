use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cedict_segment::{Candidate, MatchResult, SearchOptions};
use cedict_types::{Syllable, char_len};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::snapshot::DictionarySources;
use crate::store::{EngineStatus, SnapshotStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    /// Resources loaded by `/v1/reload` and `/v1/enable`.
    pub sources: DictionarySources,
    pub max_query_chars: usize,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub text: String,
    pub offset: Option<usize>,
    pub alternates: Option<bool>,
}

#[derive(Serialize)]
struct SyllableView<'a> {
    syllable: &'a str,
    tone: u8,
    toneless: bool,
}

#[derive(Serialize)]
struct CandidateView<'a> {
    traditional: &'a str,
    simplified: &'a str,
    pinyin: Vec<SyllableView<'a>>,
    definitions: &'a [&'a str],
    word: &'a str,
    script: &'static str,
}

#[derive(Serialize)]
struct GrammarView<'a> {
    keyword: &'a str,
    index: usize,
}

#[derive(Serialize)]
struct SearchResponse<'a> {
    ready: bool,
    matched_text: &'a str,
    match_length: usize,
    candidates: Vec<CandidateView<'a>>,
    grammar: Option<GrammarView<'a>>,
    alternates: Vec<CandidateView<'a>>,
    truncated: bool,
}

impl<'a> SearchResponse<'a> {
    fn new(ready: bool, result: &'a MatchResult<'a>) -> Self {
        Self {
            ready,
            matched_text: &result.matched_text,
            match_length: result.match_length,
            candidates: result.candidates.iter().map(candidate_view).collect(),
            grammar: result.grammar.map(|g| GrammarView {
                keyword: g.keyword,
                index: g.candidate_index,
            }),
            alternates: result.alternates.iter().map(candidate_view).collect(),
            truncated: result.truncated,
        }
    }
}

fn candidate_view<'a>(candidate: &'a Candidate<'a>) -> CandidateView<'a> {
    CandidateView {
        traditional: candidate.entry.traditional,
        simplified: candidate.entry.simplified,
        pinyin: candidate.entry.pinyin.iter().map(syllable_view).collect(),
        definitions: &candidate.entry.definitions,
        word: candidate.word,
        script: candidate.script.as_str(),
    }
}

fn syllable_view<'a>(syllable: &Syllable<'a>) -> SyllableView<'a> {
    SyllableView {
        syllable: syllable.text,
        tone: syllable.tone.number(),
        toneless: syllable.toneless,
    }
}

#[derive(Serialize)]
struct KeywordResponse {
    word: String,
    keyword: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/status", get(status))
        .route("/v1/search", get(search))
        .route("/v1/keywords/{word}", get(keyword))
        .route("/v1/reload", post(reload))
        .route("/v1/enable", post(enable))
        .route("/v1/disable", post(disable))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.store.status())
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    if char_len(&params.text) > state.max_query_chars {
        return Err(ApiError::bad_request(format!(
            "text must be at most {} characters",
            state.max_query_chars
        )));
    }

    let options = SearchOptions {
        alternates: params.alternates.unwrap_or(false),
        ..SearchOptions::default()
    };
    let offset = params.offset.unwrap_or(0);

    let Some(snapshot) = state.store.snapshot() else {
        let miss = MatchResult::empty();
        return Ok(Json(SearchResponse::new(false, &miss)).into_response());
    };
    let result = snapshot.search(&params.text, offset, &options);
    Ok(Json(SearchResponse::new(true, &result)).into_response())
}

async fn keyword(State(state): State<AppState>, Path(word): Path<String>) -> Json<KeywordResponse> {
    let keyword = state
        .store
        .snapshot()
        .is_some_and(|snapshot| snapshot.is_grammar_keyword(&word));
    Json(KeywordResponse { word, keyword })
}

async fn reload(State(state): State<AppState>) -> impl IntoResponse {
    // Detached; the store drops this load if a newer one supersedes it.
    drop(state.store.spawn_load(state.sources.clone()));
    (StatusCode::ACCEPTED, Json(state.store.status()))
}

async fn enable(State(state): State<AppState>) -> impl IntoResponse {
    // Nothing to do while a dictionary is ready or already loading.
    let status = if state.store.enable(state.sources.clone()).is_some() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    (status, Json(state.store.status()))
}

async fn disable(State(state): State<AppState>) -> Json<EngineStatus> {
    state.store.disable();
    Json(state.store.status())
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
