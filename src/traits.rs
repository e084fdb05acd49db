//! The lookup-source seam.
//!
//! Every way of finding Mermaid documentation implements [`DocsSource`].
//! The search cascade asks sources in registration order and stops at the
//! first one that returns anything.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                SourceRegistry                │
//! │  ┌────────────┐ ┌────────────┐ ┌───────────┐ │
//! │  │ Context7   │ │ Context7   │ │  Local    │ │
//! │  │ MCP (stdio)│ │ HTTP API   │ │  docs     │ │
//! │  └────────────┘ └────────────┘ └───────────┘ │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//!                search_docs() → /docs/search
//! ```
//!
//! Custom sources can be registered for tests or embedding:
//!
//! ```rust
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use mermaid_docs::models::{DocSnippet, SnippetSource};
//! use mermaid_docs::traits::{DocsSource, SourceRegistry};
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl DocsSource for Canned {
//!     fn name(&self) -> &str { "canned" }
//!     fn kind(&self) -> &str { "custom" }
//!     async fn lookup(&self, _query: &str, _max: usize) -> Result<Vec<DocSnippet>> {
//!         Ok(vec![DocSnippet::new("a.md", "graph TD", SnippetSource::Local)])
//!     }
//! }
//!
//! let mut registry = SourceRegistry::new();
//! registry.register(Box::new(Canned));
//! assert_eq!(registry.len(), 1);
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::Config;
use crate::connector_fs::LocalDocsSource;
use crate::connector_http::Context7HttpSource;
use crate::connector_mcp::Context7McpSource;
use crate::docs_fetch;
use crate::models::{DocSnippet, SourceStatus};

/// A place documentation snippets can be looked up.
#[async_trait]
pub trait DocsSource: Send + Sync {
    /// Short identifier used in logs and status output.
    fn name(&self) -> &str;

    /// Transport type (`"mcp"`, `"http"`, `"filesystem"`, ...).
    fn kind(&self) -> &str;

    /// Unconfigured sources are skipped by the cascade.
    fn is_configured(&self) -> bool {
        true
    }

    /// One-line detail for status output (URL, command, directory).
    fn describe(&self) -> String {
        String::new()
    }

    /// Look up at most `max_results` snippets for an already trimmed,
    /// non-empty query.
    async fn lookup(&self, query: &str, max_results: usize) -> Result<Vec<DocSnippet>>;

    fn status(&self) -> SourceStatus {
        SourceStatus {
            name: self.name().to_string(),
            kind: self.kind().to_string(),
            configured: self.is_configured(),
            detail: self.describe(),
        }
    }
}

/// Ordered collection of lookup sources.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Box<dyn DocsSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard cascade: Context7 MCP, Context7 HTTP, local docs.
    pub fn with_defaults(config: &Config, client: reqwest::Client, docs_dir: PathBuf) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(Context7McpSource::new(config.context7.clone())));
        registry.register(Box::new(Context7HttpSource::new(
            client,
            config.context7.clone(),
        )));
        let syntax_dir = docs_fetch::syntax_dir(&config.docs, &docs_dir);
        registry.register(Box::new(LocalDocsSource::new(
            docs_dir,
            syntax_dir,
            config.search.clone(),
        )));
        registry
    }

    pub fn register(&mut self, source: Box<dyn DocsSource>) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[Box<dyn DocsSource>] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn statuses(&self) -> Vec<SourceStatus> {
        self.sources.iter().map(|s| s.status()).collect()
    }
}
