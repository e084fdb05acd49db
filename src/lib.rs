//! # Mermaid Docs Server
//!
//! Serves a diagram editor's static assets and a single docs search endpoint
//! that turns a free-text request (English or Russian) into Mermaid
//! documentation snippets.
//!
//! ## Architecture
//!
//! ```text
//! GET /docs/search?q=...
//!        │
//!        ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Normalizer  │──▶│ Context7 MCP │──▶│Context7 HTTP │──▶│  Local docs  │
//! │ (chat API)   │   │   (stdio)    │   │  (search)    │   │ (keywords +  │
//! └──────────────┘   └──────────────┘   └──────────────┘   │  substring)  │
//!                     first non-empty result wins ────────▶└──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mdocs serve                              # static files + /docs/search
//! mdocs search "диаграмма последовательности"
//! mdocs sources                            # which lookup sources are configured
//! mdocs docs fetch                         # download the Mermaid docs archive
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Request/response types |
//! | [`normalize`] | LLM query normalization |
//! | [`traits`] | `DocsSource` trait and source registry |
//! | [`connector_mcp`] | Context7 MCP lookup |
//! | [`connector_http`] | Context7 HTTP search lookup |
//! | [`connector_fs`] | Local markdown docs lookup |
//! | [`docs_fetch`] | Local docs directory resolution and archive download |
//! | [`search`] | The lookup cascade |
//! | [`sources`] | Source status reporting |
//! | [`server`] | HTTP server |

pub mod config;
pub mod connector_fs;
pub mod connector_http;
pub mod connector_mcp;
pub mod docs_fetch;
pub mod models;
pub mod normalize;
pub mod search;
pub mod server;
pub mod sources;
pub mod traits;
