//! End-to-end tests for the HTTP server, with the chat completion API and
//! the Context7 search API replaced by in-process mocks.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use mermaid_docs::config::Config;
use mermaid_docs::server;

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Serves `app` on an ephemeral port and returns its base URL.
async fn spawn_mock(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn mock_chat_completions(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
    let user = body["messages"][1]["content"].as_str().unwrap_or_default();
    let content = if user.contains("круговую") {
        r#"{"search_topic": "pie chart", "style_prefs": "blue tones"}"#
    } else {
        r#"{"search_topic": "sequence diagram", "style_prefs": ""}"#
    };
    Json(serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

async fn mock_context7_search(
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let q = params.get("q").cloned().unwrap_or_default();
    Json(serde_json::json!({
        "results": [
            { "file": "context7/pie.md", "snippet": format!("pie docs for {}", q) },
            { "content": "second hit" },
            { "snippet": "" }
        ]
    }))
}

/// Request details seen by the recording Context7 mock.
#[derive(Default)]
struct SeenRequest {
    authorization: Option<String>,
    accept: Option<String>,
    params: HashMap<String, String>,
}

type Seen = Arc<Mutex<Option<SeenRequest>>>;

async fn recording_context7_search(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    *seen.lock().unwrap() = Some(SeenRequest {
        authorization: header("authorization"),
        accept: header("accept"),
        params,
    });
    Json(serde_json::json!({ "results": [{ "file": "c7.md", "snippet": "from context7" }] }))
}

async fn failing_context7_search() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

fn write_docs(tmp: &TempDir) {
    let syntax = tmp.path().join("docs").join("syntax");
    fs::create_dir_all(&syntax).unwrap();
    fs::write(syntax.join("pie.md"), "# Pie chart diagrams\n\npie title Pets\n").unwrap();
    fs::write(
        syntax.join("sequenceDiagram.md"),
        "# Sequence diagrams\n\nsequenceDiagram\n",
    )
    .unwrap();

    let public = tmp.path().join("public");
    fs::create_dir_all(&public).unwrap();
    fs::write(public.join("index.html"), "<html><body>editor</body></html>").unwrap();
    fs::write(public.join("app.js"), "console.log('editor');").unwrap();
}

fn test_config(
    tmp: &TempDir,
    port: u16,
    normalizer_url: Option<&str>,
    search_url: Option<&str>,
) -> Config {
    let root = tmp.path().display();
    let normalizer = match normalizer_url {
        Some(url) => format!("base_url = \"{}\"\nmodel = \"mock-model\"", url),
        None => "base_url = \"http://127.0.0.1:9\"".to_string(),
    };
    let search_url = search_url
        .map(|url| format!("search_url = \"{}\"", url))
        .unwrap_or_default();

    let toml_str = format!(
        r#"[server]
bind = "127.0.0.1:{port}"
static_dir = "{root}/public"

[normalizer]
{normalizer}

[context7]
mcp_enabled = false
{search_url}

[docs]
root = "{root}/docs"
auto_download = false
"#
    );
    toml::from_str(&toml_str).unwrap()
}

async fn start_server(cfg: Config, port: u16) {
    tokio::spawn(async move {
        server::run_server(&cfg).await.unwrap();
    });
    wait_for_server(port).await;
}

async fn get_json(port: u16, path_and_query: &str) -> serde_json::Value {
    let resp = reqwest::get(format!("http://127.0.0.1:{}{}", port, path_and_query))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_query_returns_empty_response() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let port = find_free_port();
    start_server(test_config(&tmp, port, None, None), port).await;

    for path in ["/docs/search", "/docs/search?q=", "/docs/search?q=%20%20"] {
        let json = get_json(port, path).await;
        assert_eq!(json["query"], "");
        assert_eq!(json["search_query"], "");
        assert_eq!(json["style_prefs"], "");
        assert!(json["results"].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_normalized_query_drives_local_lookup() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let normalizer = spawn_mock(
        Router::new().route("/v1/chat/completions", post(mock_chat_completions)),
    )
    .await;
    let port = find_free_port();
    start_server(test_config(&tmp, port, Some(&normalizer), None), port).await;

    let client = reqwest::Client::new();
    let json: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/docs/search", port))
        .query(&[("q", "нарисуй круговую диаграмму в синих тонах")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["query"], "нарисуй круговую диаграмму в синих тонах");
    assert_eq!(json["search_query"], "pie chart");
    assert_eq!(json["style_prefs"], "blue tones");
    assert_eq!(json["results"][0]["file"], "pie.md");
    assert_eq!(json["results"][0]["source"], "local_docs");
}

#[tokio::test]
async fn test_context7_http_results_win_over_local() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let context7 = spawn_mock(Router::new().route("/search", get(mock_context7_search))).await;
    let search_url = format!("{}/search", context7);
    let port = find_free_port();
    start_server(test_config(&tmp, port, None, Some(&search_url)), port).await;

    let json = get_json(port, "/docs/search?q=pie").await;
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["file"], "context7/pie.md");
    assert_eq!(results[0]["snippet"], "pie docs for pie");
    assert_eq!(results[0]["source"], "context7_http");
    assert_eq!(results[1]["file"], "context7");
    assert_eq!(results[1]["snippet"], "second hit");
}

#[tokio::test]
async fn test_unreachable_context7_falls_back_to_local() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let port = find_free_port();
    let dead = format!("http://127.0.0.1:{}/search", find_free_port());
    start_server(test_config(&tmp, port, None, Some(&dead)), port).await;

    let json = get_json(port, "/docs/search?q=sequence").await;
    assert_eq!(json["search_query"], "sequence");
    assert_eq!(json["results"][0]["file"], "sequenceDiagram.md");
    assert_eq!(json["results"][0]["source"], "local_docs");
}

#[tokio::test]
async fn test_static_files_and_404() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let port = find_free_port();
    start_server(test_config(&tmp, port, None, None), port).await;

    let resp = reqwest::get(format!("http://127.0.0.1:{}/app.js", port))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "console.log('editor');");

    let resp = reqwest::get(format!("http://127.0.0.1:{}/", port))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().contains("editor"));

    let resp = reqwest::get(format!("http://127.0.0.1:{}/missing.css", port))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_cors_headers_present() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let port = find_free_port();
    start_server(test_config(&tmp, port, None, None), port).await;

    let resp = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{}/docs/search?q=pie", port))
        .header("Origin", "http://editor.example")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap()),
        Some("*")
    );
}

#[tokio::test]
async fn test_sources_endpoint() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let port = find_free_port();
    start_server(test_config(&tmp, port, None, None), port).await;

    let json = get_json(port, "/docs/sources").await;
    let sources = json["sources"].as_array().unwrap();
    let names: Vec<&str> = sources.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["normalizer", "context7-mcp", "context7-http", "local-docs"]);
    assert_eq!(sources[1]["configured"], false);
    assert_eq!(sources[2]["configured"], false);
    assert_eq!(sources[3]["configured"], true);
}

#[tokio::test]
async fn test_repeated_query_key_uses_first_value() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let port = find_free_port();
    start_server(test_config(&tmp, port, None, None), port).await;

    let json = get_json(port, "/docs/search?q=pie&q=sequence&model=&model=x").await;
    assert_eq!(json["query"], "pie");
    assert_eq!(json["search_query"], "pie");
    assert_eq!(json["results"][0]["file"], "pie.md");
}

#[tokio::test]
async fn test_context7_error_status_falls_back_to_local() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let context7 = spawn_mock(Router::new().route("/search", get(failing_context7_search))).await;
    let search_url = format!("{}/search", context7);
    let port = find_free_port();
    start_server(test_config(&tmp, port, None, Some(&search_url)), port).await;

    let json = get_json(port, "/docs/search?q=pie").await;
    let results = json["results"].as_array().unwrap();
    assert_eq!(results[0]["file"], "pie.md");
    assert_eq!(results[0]["source"], "local_docs");
    assert!(results
        .iter()
        .all(|r| r["snippet"] != "upstream exploded"));
}

#[tokio::test]
async fn test_context7_request_carries_key_accept_and_page() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let seen: Seen = Arc::new(Mutex::new(None));
    let context7 = spawn_mock(
        Router::new()
            .route("/search", get(recording_context7_search))
            .with_state(seen.clone()),
    )
    .await;
    let search_url = format!("{}/search", context7);
    let port = find_free_port();
    let mut cfg = test_config(&tmp, port, None, Some(&search_url));
    cfg.context7.api_key = Some("c7-secret".to_string());
    cfg.context7.page = Some("2".to_string());
    start_server(cfg, port).await;

    let json = get_json(port, "/docs/search?q=gantt%20chart").await;
    assert_eq!(json["results"][0]["file"], "c7.md");
    assert_eq!(json["results"][0]["source"], "context7_http");

    let seen = seen.lock().unwrap().take().expect("context7 mock was not called");
    assert_eq!(seen.authorization.as_deref(), Some("Bearer c7-secret"));
    assert_eq!(seen.accept.as_deref(), Some("*/*"));
    assert_eq!(seen.params.get("q").map(String::as_str), Some("gantt chart"));
    assert_eq!(seen.params.get("topic").map(String::as_str), Some("gantt chart"));
    assert_eq!(seen.params.get("limit").map(String::as_str), Some("5"));
    assert_eq!(seen.params.get("page").map(String::as_str), Some("2"));
}

#[tokio::test]
async fn test_context7_request_without_key_or_page() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let seen: Seen = Arc::new(Mutex::new(None));
    let context7 = spawn_mock(
        Router::new()
            .route("/search", get(recording_context7_search))
            .with_state(seen.clone()),
    )
    .await;
    let search_url = format!("{}/search", context7);
    let port = find_free_port();
    start_server(test_config(&tmp, port, None, Some(&search_url)), port).await;

    get_json(port, "/docs/search?q=pie").await;

    let seen = seen.lock().unwrap().take().expect("context7 mock was not called");
    assert!(seen.authorization.is_none());
    assert!(!seen.params.contains_key("page"));
}
