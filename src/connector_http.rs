//! Context7 HTTP search API connector.
//!
//! Used when the MCP connector is unavailable or comes back empty. The API
//! response format is loose: it may be a JSON object with a `results` or
//! `snippets` array, a bare array, or plain text. Anything that cannot be
//! split into items is returned as one raw snippet rather than dropped.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::Context7Config;
use crate::models::{DocSnippet, SnippetSource};
use crate::traits::DocsSource;

/// File label used when the API gives none.
const DEFAULT_FILE_LABEL: &str = "context7";

/// Maximum characters of the query sent as `topic`.
pub const TOPIC_MAX_CHARS: usize = 80;

pub struct Context7HttpSource {
    client: reqwest::Client,
    config: Context7Config,
}

impl Context7HttpSource {
    pub fn new(client: reqwest::Client, config: Context7Config) -> Self {
        Self { client, config }
    }

    fn search_url(&self) -> Option<&str> {
        self.config
            .search_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

#[async_trait]
impl DocsSource for Context7HttpSource {
    fn name(&self) -> &str {
        "context7-http"
    }

    fn kind(&self) -> &str {
        "http"
    }

    fn is_configured(&self) -> bool {
        self.search_url().is_some()
    }

    fn describe(&self) -> String {
        self.search_url().unwrap_or("CONTEXT7_SEARCH_URL not set").to_string()
    }

    async fn lookup(&self, query: &str, max_results: usize) -> Result<Vec<DocSnippet>> {
        let Some(base_url) = self.search_url() else {
            return Ok(Vec::new());
        };

        let url = build_search_url(base_url, query, max_results, self.config.page.as_deref())?;

        let mut req = self
            .client
            .get(url)
            .header("Accept", "*/*")
            .timeout(Duration::from_secs(self.config.timeout_secs));
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req
            .send()
            .await
            .context("Failed to call Context7 search API")?;

        if !resp.status().is_success() {
            bail!("Context7 search API returned {}", resp.status());
        }

        let bytes = resp.bytes().await?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(parse_search_body(&text, max_results))
    }
}

/// Builds `base?q=..&topic=..&limit=..[&page=..]`.
pub fn build_search_url(
    base_url: &str,
    query: &str,
    max_results: usize,
    page: Option<&str>,
) -> Result<reqwest::Url> {
    let topic = truncate_chars(query, TOPIC_MAX_CHARS);
    let limit = max_results.to_string();

    let mut params: Vec<(&str, &str)> = vec![("q", query), ("topic", topic), ("limit", &limit)];
    if let Some(page) = page.map(str::trim).filter(|p| !p.is_empty()) {
        params.push(("page", page));
    }

    reqwest::Url::parse_with_params(base_url.trim_end_matches('/'), &params)
        .with_context(|| format!("Invalid Context7 search URL: {}", base_url))
}

/// Returns the longest prefix of `s` with at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Turns a Context7 HTTP response body into snippets.
pub fn parse_search_body(body: &str, max_results: usize) -> Vec<DocSnippet> {
    let text = body.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let raw = || vec![DocSnippet::new(DEFAULT_FILE_LABEL, text, SnippetSource::Context7Http)];

    let parsed: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return raw(),
    };

    let items = match &parsed {
        Value::Object(map) => match (map.get("results"), map.get("snippets")) {
            (Some(Value::Array(items)), _) => items,
            (_, Some(Value::Array(items))) => items,
            _ => return raw(),
        },
        Value::Array(items) => items,
        _ => return raw(),
    };

    let mut results = Vec::new();
    for item in items {
        if results.len() >= max_results {
            break;
        }

        let (file, snippet) = match item {
            Value::Object(obj) => {
                let snippet = ["snippet", "content", "text"]
                    .iter()
                    .find_map(|key| obj.get(*key).and_then(truthy_text))
                    .unwrap_or_default();
                let file = obj
                    .get("file")
                    .and_then(truthy_text)
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .unwrap_or_else(|| DEFAULT_FILE_LABEL.to_string());
                (file, snippet)
            }
            other => (DEFAULT_FILE_LABEL.to_string(), value_text(other)),
        };

        let snippet = snippet.trim();
        if snippet.is_empty() {
            continue;
        }
        results.push(DocSnippet::new(file, snippet, SnippetSource::Context7Http));
    }

    if results.is_empty() {
        return raw();
    }
    results
}

/// Text of a JSON value, or `None` for falsy values (null, false, 0, "",
/// empty containers).
fn truthy_text(value: &Value) -> Option<String> {
    let truthy = match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    };
    truthy.then(|| value_text(value))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
