//! The docs search cascade.
//!
//! ```text
//!   raw query ──▶ normalize (LLM) ──▶ search_query, style_prefs
//!                                        │
//!                 ┌──────────────────────┘
//!                 ▼
//!       Context7 MCP ──empty──▶ Context7 HTTP ──empty──▶ local docs
//! ```
//!
//! Sources are asked in registry order and the first non-empty answer wins.
//! A failing source is logged and treated like an empty one, so the caller
//! only ever sees a (possibly empty) result list.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::docs_fetch::ensure_docs_dir;
use crate::models::{DocSnippet, SearchResponse};
use crate::normalize::normalize_query;
use crate::traits::SourceRegistry;

/// Everything a docs search needs, cheap to clone into handlers.
#[derive(Clone)]
pub struct DocsSearcher {
    config: Arc<Config>,
    client: reqwest::Client,
    sources: Arc<SourceRegistry>,
}

impl DocsSearcher {
    pub fn new(config: Arc<Config>, client: reqwest::Client, sources: SourceRegistry) -> Self {
        Self {
            config,
            client,
            sources: Arc::new(sources),
        }
    }

    /// Builds the standard searcher: shared HTTP client, resolved (and if
    /// needed downloaded) docs dir, default source cascade.
    pub async fn from_config(config: Arc<Config>) -> Result<Self> {
        let client = http_client()?;
        let docs_dir = ensure_docs_dir(&client, &config.docs).await;
        let sources = SourceRegistry::with_defaults(&config, client.clone(), docs_dir);
        Ok(Self::new(config, client, sources))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// Normalizes `query` and runs the lookup cascade.
    pub async fn search_docs(&self, query: &str, model: &str) -> SearchResponse {
        let query = query.trim();
        if query.is_empty() {
            return SearchResponse::default();
        }

        let normalized = normalize_query(&self.client, &self.config.normalizer, query, model).await;
        let search_query = if normalized.search_query.trim().is_empty() {
            query.to_string()
        } else {
            normalized.search_query
        };

        tracing::info!(query = %query, search_query = %search_query, "Docs search");

        let results = self.lookup(&search_query).await;

        SearchResponse {
            query: query.to_string(),
            search_query,
            style_prefs: normalized.style_prefs,
            results,
        }
    }

    /// Runs the source cascade for an already normalized query.
    pub async fn lookup(&self, search_query: &str) -> Vec<DocSnippet> {
        let max_results = self.config.search.max_results;

        for source in self.sources.sources() {
            if !source.is_configured() {
                tracing::debug!("Skipping unconfigured source {}", source.name());
                continue;
            }

            match source.lookup(search_query, max_results).await {
                Ok(results) if !results.is_empty() => {
                    tracing::info!("{} returned {} snippets", source.name(), results.len());
                    let mut results = results;
                    results.truncate(max_results);
                    return results;
                }
                Ok(_) => tracing::debug!("{} returned nothing", source.name()),
                Err(e) => tracing::warn!("{} lookup failed: {e:#}", source.name()),
            }
        }

        Vec::new()
    }
}

/// Shared outbound client. Per-call timeouts are set on each request.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

/// `mdocs search`: one cascade lookup printed as JSON.
pub async fn run_search(config: &Config, query: &str, model: Option<&str>) -> Result<()> {
    let searcher = DocsSearcher::from_config(Arc::new(config.clone())).await?;
    let response = searcher.search_docs(query, model.unwrap_or_default()).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
