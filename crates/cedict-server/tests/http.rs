use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use tempfile::TempDir;
use tower::util::ServiceExt;

use cedict_server::{AppState, DictionarySnapshot, DictionarySources, SnapshotStore, router};

fn fixture_dir() -> TempDir {
    let crates = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..");
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(
        crates.join("cedict-db/tests/fixtures/cedict_ts.u8"),
        dir.path().join("cedict_ts.u8"),
    )
    .unwrap();
    std::fs::copy(
        crates.join("cedict-segment/tests/fixtures/grammarKeywords.json"),
        dir.path().join("grammarKeywordsMin.json"),
    )
    .unwrap();
    dir
}

fn sources(dir: &Path) -> DictionarySources {
    DictionarySources {
        index: None,
        ..DictionarySources::in_dir(dir)
    }
}

fn make_state(dir: &Path) -> AppState {
    let sources = sources(dir);
    let snapshot = DictionarySnapshot::load(&sources).unwrap();
    AppState {
        store: Arc::new(SnapshotStore::with_snapshot(snapshot)),
        sources,
        max_query_chars: 8,
    }
}

fn encode(text: &str) -> String {
    text.bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect()
}

async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

/// Poll `/v1/status` until no load is in flight.
async fn wait_until_settled(state: &AppState) -> serde_json::Value {
    for _ in 0..500 {
        let (_, body) = get(router(state.clone()), "/v1/status").await;
        if body["state"] != "loading" && body["reloading"] == false {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("dictionary load did not finish");
}

async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, Method::GET, uri).await
}

#[tokio::test]
async fn healthz_ok() {
    let dir = fixture_dir();
    let app = router(make_state(dir.path()));
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn search_returns_longest_match() {
    let dir = fixture_dir();
    let app = router(make_state(dir.path()));
    let (status, body) = get(app, &format!("/v1/search?text={}", encode("你好吗"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
    assert_eq!(body["matched_text"], "你好");
    assert_eq!(body["match_length"], 2);
    let candidate = &body["candidates"][0];
    assert_eq!(candidate["word"], "你好");
    assert_eq!(candidate["script"], "simplified");
    assert_eq!(candidate["definitions"][0], "hello");
    assert_eq!(candidate["pinyin"][1]["syllable"], "hao");
    assert_eq!(candidate["pinyin"][1]["tone"], 3);
    assert!(body["grammar"].is_null());
}

#[tokio::test]
async fn search_tags_grammar_keyword() {
    let dir = fixture_dir();
    let app = router(make_state(dir.path()));
    let uri = format!("/v1/search?text={}&offset=1", encode("我的书"));
    let (_, body) = get(app, &uri).await;
    assert_eq!(body["matched_text"], "的");
    assert_eq!(body["candidates"].as_array().unwrap().len(), 2);
    assert_eq!(body["grammar"]["keyword"], "的");
    assert_eq!(body["grammar"]["index"], 1);
}

#[tokio::test]
async fn search_reports_alternates_when_asked() {
    let dir = fixture_dir();
    let app = router(make_state(dir.path()));
    let uri = format!("/v1/search?text={}&alternates=true", encode("你好"));
    let (_, body) = get(app, &uri).await;
    assert_eq!(body["match_length"], 2);
    assert_eq!(body["alternates"][0]["word"], "你");
    assert_eq!(body["truncated"], false);
}

#[tokio::test]
async fn miss_and_empty_text_are_not_errors() {
    let dir = fixture_dir();
    let state = make_state(dir.path());

    let (status, body) = get(router(state.clone()), "/v1/search?text=xyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match_length"], 0);
    assert_eq!(body["matched_text"], "");
    assert!(body["candidates"].as_array().unwrap().is_empty());

    let (status, body) = get(router(state), "/v1/search?text=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match_length"], 0);
}

#[tokio::test]
async fn overlong_text_is_rejected() {
    let dir = fixture_dir();
    let app = router(make_state(dir.path()));
    let uri = format!("/v1/search?text={}", encode(&"你".repeat(9)));
    let (status, body) = get(app, &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("at most 8"));
}

#[tokio::test]
async fn keyword_lookup() {
    let dir = fixture_dir();
    let state = make_state(dir.path());

    let (_, body) = get(router(state.clone()), &format!("/v1/keywords/{}", encode("的"))).await;
    assert_eq!(body["word"], "的");
    assert_eq!(body["keyword"], true);

    let (_, body) = get(router(state), &format!("/v1/keywords/{}", encode("这个"))).await;
    assert_eq!(body["keyword"], false);
}

#[tokio::test]
async fn status_reports_counts() {
    let dir = fixture_dir();
    let app = router(make_state(dir.path()));
    let (status, body) = get(app, "/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ready");
    assert_eq!(body["entries"], 19);
    assert_eq!(body["skipped_lines"], 2);
    assert_eq!(body["index_source"], "derived");
    assert!(body["error"].is_null());
}

#[tokio::test]
async fn disabled_dictionary_answers_with_misses() {
    let dir = fixture_dir();
    let state = make_state(dir.path());

    let (status, body) = send(router(state.clone()), Method::POST, "/v1/disable").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "disabled");

    let uri = format!("/v1/search?text={}", encode("你好"));
    let (status, body) = get(router(state.clone()), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], false);
    assert_eq!(body["match_length"], 0);

    let (_, body) = get(router(state), &format!("/v1/keywords/{}", encode("的"))).await;
    assert_eq!(body["keyword"], false);
}

#[tokio::test]
async fn reload_keeps_serving_until_replaced() {
    let dir = fixture_dir();
    let state = make_state(dir.path());
    let (status, body) = send(router(state.clone()), Method::POST, "/v1/reload").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["state"], "ready");
    assert_eq!(body["reloading"], true);

    let uri = format!("/v1/search?text={}", encode("你好"));
    let (_, body) = get(router(state.clone()), &uri).await;
    assert_eq!(body["ready"], true);
    assert_eq!(body["matched_text"], "你好");

    let body = wait_until_settled(&state).await;
    assert_eq!(body["state"], "ready");
    assert_eq!(body["reloading"], false);
}

#[tokio::test]
async fn failed_reload_leaves_service_unavailable() {
    let dir = fixture_dir();
    let state = make_state(dir.path());
    let missing = sources(&dir.path().join("missing"));

    assert!(state.store.spawn_load(missing).await.unwrap());

    let (_, body) = get(router(state.clone()), "/v1/status").await;
    assert_eq!(body["state"], "unavailable");
    assert!(body["error"].as_str().unwrap().contains("cedict_ts.u8"));

    let (_, body) = get(router(state), &format!("/v1/search?text={}", encode("你好"))).await;
    assert_eq!(body["ready"], false);
}

#[tokio::test]
async fn enable_reloads_after_disable() {
    let dir = fixture_dir();
    let state = make_state(dir.path());
    let (status, _) = send(router(state.clone()), Method::POST, "/v1/disable").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(router(state.clone()), Method::POST, "/v1/enable").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["state"], "loading");

    let body = wait_until_settled(&state).await;
    assert_eq!(body["state"], "ready");

    let (_, body) = get(router(state), &format!("/v1/search?text={}", encode("你好"))).await;
    assert_eq!(body["ready"], true);
    assert_eq!(body["matched_text"], "你好");
}

#[tokio::test]
async fn enable_leaves_a_ready_dictionary_alone() {
    let dir = fixture_dir();
    let state = make_state(dir.path());
    let (status, body) = send(router(state.clone()), Method::POST, "/v1/enable").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ready");
    assert_eq!(body["reloading"], false);
}
