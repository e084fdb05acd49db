//! Request and response types for the docs search endpoint.
//!
//! None of these outlive a single request.

use serde::{Deserialize, Serialize};

/// Which lookup strategy produced a snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetSource {
    /// Context7 MCP server over stdio.
    Context7Mcp,
    /// Context7 HTTP search API.
    Context7Http,
    /// Substring scan over local markdown files.
    Local,
    /// Whole doc file matched by diagram keyword.
    LocalDocs,
    /// Always-included configuration/theming docs.
    CoreDocs,
}

impl SnippetSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnippetSource::Context7Mcp => "context7_mcp",
            SnippetSource::Context7Http => "context7_http",
            SnippetSource::Local => "local",
            SnippetSource::LocalDocs => "local_docs",
            SnippetSource::CoreDocs => "core_docs",
        }
    }
}

/// A single documentation snippet returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocSnippet {
    pub file: String,
    pub snippet: String,
    pub source: SnippetSource,
}

impl DocSnippet {
    pub fn new(file: impl Into<String>, snippet: impl Into<String>, source: SnippetSource) -> Self {
        Self {
            file: file.into(),
            snippet: snippet.into(),
            source,
        }
    }
}

/// Output of query normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    /// Short English topic used for lookup.
    pub search_query: String,
    /// Styling preferences extracted from the request, or empty.
    pub style_prefs: String,
}

impl NormalizedQuery {
    /// The fallback used whenever normalization is unavailable.
    pub fn passthrough(query: &str) -> Self {
        Self {
            search_query: query.to_string(),
            style_prefs: String::new(),
        }
    }
}

/// Query string of `GET /docs/search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl SearchParams {
    /// Builds params from decoded query pairs. A repeated key keeps its
    /// first value.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "q" => &mut params.q,
                "model" => &mut params.model,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

/// JSON body of `GET /docs/search`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub search_query: String,
    pub style_prefs: String,
    pub results: Vec<DocSnippet>,
}

/// Health of one lookup source, as reported by `mdocs sources` and
/// `GET /docs/sources`.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub kind: String,
    pub configured: bool,
    pub detail: String,
}
