//! HTTP server: the docs search endpoint plus static files.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/docs/search?q=<query>&model=<id>` | Normalize the query and look up Mermaid docs |
//! | `GET`  | `/docs/sources` | Lookup sources and whether they are configured |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | anything else | Static file from `[server].static_dir` |
//!
//! `/docs/search` always answers `200` with
//!
//! ```json
//! {
//!   "query": "нарисуй sequence диаграмму",
//!   "search_query": "sequence diagram",
//!   "style_prefs": "",
//!   "results": [{ "file": "sequenceDiagram.md", "snippet": "...", "source": "local_docs" }]
//! }
//! ```
//!
//! Upstream failures only ever show up as an empty `results` array.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a diagram editor
//! served from another origin can call the endpoint directly.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::docs_fetch::syntax_dir;
use crate::models::{SearchParams, SearchResponse, SourceStatus};
use crate::search::DocsSearcher;
use crate::sources::collect_sources;

/// Starts the server on `[server].bind`.
///
/// Resolves the local docs directory first (downloading it when missing and
/// `docs.auto_download` is on), then serves until the process is stopped.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let config = Arc::new(config.clone());
    let searcher = DocsSearcher::from_config(config.clone()).await?;

    let docs_dir = crate::docs_fetch::resolve_docs_dir(&config.docs);
    let syntax = syntax_dir(&config.docs, &docs_dir);
    if !syntax.exists() {
        tracing::warn!("Syntax docs directory {} not found", syntax.display());
    }

    for status in collect_sources(&config, searcher.sources()) {
        tracing::info!(
            "source {:<14} configured={:<5} {}",
            status.name,
            status.configured,
            status.detail
        );
    }

    let app = router(searcher, &config.server.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        "Serving {} at http://{}",
        config.server.static_dir.display(),
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the application router around an existing searcher.
pub fn router(searcher: DocsSearcher, static_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/docs/search", get(handle_search))
        .route("/docs/sources", get(handle_sources))
        .route("/health", get(handle_health))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(searcher)
}

// ============ GET /docs/search ============

/// Handler for `GET /docs/search`.
///
/// Repeated keys keep their first value. A query string that cannot be
/// decoded is treated like an empty query.
async fn handle_search(
    State(searcher): State<DocsSearcher>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Json<SearchResponse> {
    let params = match pairs {
        Ok(Query(pairs)) => SearchParams::from_pairs(pairs),
        Err(e) => {
            tracing::warn!("Unreadable docs search query string: {e}");
            SearchParams::default()
        }
    };

    let query = params.q.unwrap_or_default();
    let model = params.model.unwrap_or_default();
    Json(searcher.search_docs(&query, &model).await)
}

// ============ GET /docs/sources ============

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<SourceStatus>,
}

async fn handle_sources(State(searcher): State<DocsSearcher>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: collect_sources(searcher.config(), searcher.sources()),
    })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
