//! Configuration loading.
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables, so a bare `mdocs serve` with only env vars set
//! behaves the same as a fully written config file.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8000"
//! static_dir = "./public"
//!
//! [normalizer]
//! base_url = "http://localhost:8317"
//! model = "gpt-4o-mini"
//!
//! [context7]
//! search_url = "https://context7.com/api/v1/mermaid-js/mermaid"
//!
//! [docs]
//! version = "10.2.4"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Config file used when `--config` is not passed.
pub const DEFAULT_CONFIG_PATH: &str = "./config/mdocs.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub context7: Context7Config,
    #[serde(default)]
    pub docs: DocsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("./public")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Lines of context kept around a substring hit.
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    /// Characters kept from a whole doc file matched by diagram keyword.
    #[serde(default = "default_max_doc_chars")]
    pub max_doc_chars: usize,
    #[serde(default = "default_true")]
    pub inject_core_docs: bool,
    /// Paths relative to the syntax directory.
    #[serde(default = "default_core_docs")]
    pub core_docs: Vec<String>,
    #[serde(default = "default_basics_fallback")]
    pub basics_fallback: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            context_lines: default_context_lines(),
            max_doc_chars: default_max_doc_chars(),
            inject_core_docs: true,
            core_docs: default_core_docs(),
            basics_fallback: default_basics_fallback(),
        }
    }
}

fn default_max_results() -> usize {
    5
}
fn default_context_lines() -> usize {
    3
}
fn default_max_doc_chars() -> usize {
    8000
}
fn default_true() -> bool {
    true
}
fn default_core_docs() -> Vec<String> {
    vec![
        "../config/directives.md".to_string(),
        "../config/theming.md".to_string(),
    ]
}
fn default_basics_fallback() -> String {
    "examples.md".to_string()
}

/// OpenAI-compatible chat completion endpoint used to normalize queries.
#[derive(Debug, Deserialize, Clone)]
pub struct NormalizerConfig {
    #[serde(default = "default_normalizer_url")]
    pub base_url: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_normalizer_key")]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            base_url: default_normalizer_url(),
            model: None,
            api_key: default_normalizer_key(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_normalizer_url() -> String {
    "http://localhost:8317".to_string()
}
fn default_normalizer_key() -> String {
    "test".to_string()
}
fn default_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct Context7Config {
    /// Empty disables the MCP source.
    #[serde(default = "default_library_id")]
    pub library_id: String,
    #[serde(default = "default_true")]
    pub mcp_enabled: bool,
    #[serde(default = "default_mcp_command")]
    pub mcp_command: String,
    #[serde(default = "default_mcp_args")]
    pub mcp_args: Vec<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub search_url: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_mcp_timeout_secs")]
    pub mcp_timeout_secs: u64,
}

impl Default for Context7Config {
    fn default() -> Self {
        Self {
            library_id: default_library_id(),
            mcp_enabled: true,
            mcp_command: default_mcp_command(),
            mcp_args: default_mcp_args(),
            api_key: None,
            search_url: None,
            page: None,
            timeout_secs: default_timeout_secs(),
            mcp_timeout_secs: default_mcp_timeout_secs(),
        }
    }
}

fn default_library_id() -> String {
    "/mermaid-js/mermaid".to_string()
}
fn default_mcp_command() -> String {
    "npx".to_string()
}
fn default_mcp_args() -> Vec<String> {
    vec!["-y".to_string(), "@upstash/context7-mcp".to_string()]
}
fn default_mcp_timeout_secs() -> u64 {
    60
}

impl Context7Config {
    pub fn mcp_is_enabled(&self) -> bool {
        self.mcp_enabled && !self.library_id.trim().is_empty()
    }
}

/// Where the local Mermaid docs live and how to fetch them when missing.
#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    /// Explicit docs directory; used only when it exists.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_syntax_subpath")]
    pub syntax_subpath: Vec<String>,
    #[serde(default = "default_true")]
    pub auto_download: bool,
    #[serde(default = "default_repo")]
    pub repo: String,
    #[serde(default = "default_git_ref")]
    pub git_ref: String,
    #[serde(default = "default_docs_subpath")]
    pub docs_subpath: Vec<String>,
    #[serde(default)]
    pub archive_url: Option<String>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            root: None,
            base_dir: default_base_dir(),
            version: default_version(),
            syntax_subpath: default_syntax_subpath(),
            auto_download: true,
            repo: default_repo(),
            git_ref: default_git_ref(),
            docs_subpath: default_docs_subpath(),
            archive_url: None,
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("mermaid-docs")
}
fn default_version() -> String {
    "10.2.4".to_string()
}
fn default_syntax_subpath() -> Vec<String> {
    vec!["syntax".to_string()]
}
fn default_repo() -> String {
    "mermaid-js/mermaid".to_string()
}
fn default_git_ref() -> String {
    "develop".to_string()
}
fn default_docs_subpath() -> Vec<String> {
    ["packages", "mermaid", "src", "docs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Loads configuration from `path` (or the default location when present),
/// applies environment overrides and validates the result.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => parse_config_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                parse_config_file(default_path)?
            } else {
                Config::default()
            }
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;

    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

/// Applies the environment variables understood by the server.
///
/// `lookup` abstracts `std::env::var` so overrides can be exercised without
/// touching the process environment. Values are trimmed; empty values are
/// ignored except `CONTEXT7_LIBRARY_ID`, where empty disables MCP lookup.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(port) = get("PORT") {
        if let Ok(port) = port.parse::<u16>() {
            config.server.bind = replace_port(&config.server.bind, port);
        }
    }

    if let Some(url) = get("CLIPROXY_BASE_URL") {
        config.normalizer.base_url = url;
    }
    if let Some(model) = get("CLIPROXY_NORMALIZER_MODEL") {
        config.normalizer.model = Some(model);
    }
    if let Some(key) = get("CLIPROXY_API_KEY") {
        config.normalizer.api_key = key;
    }

    if let Some(id) = lookup("CONTEXT7_LIBRARY_ID") {
        config.context7.library_id = id.trim().to_string();
    }
    if let Some(command) = get("CONTEXT7_MCP_COMMAND") {
        config.context7.mcp_command = command;
    }
    if let Some(args) = get("CONTEXT7_MCP_ARGS") {
        config.context7.mcp_args = args.split_whitespace().map(str::to_string).collect();
    }
    if let Some(key) = get("CONTEXT7_API_KEY") {
        config.context7.api_key = Some(key);
    }
    if let Some(url) = get("CONTEXT7_SEARCH_URL") {
        config.context7.search_url = Some(url);
    }
    if let Some(page) = get("CONTEXT7_PAGE") {
        config.context7.page = Some(page);
    }

    if let Some(root) = get("MERMAID_DOCS_ROOT") {
        let root = PathBuf::from(root);
        if root.exists() {
            config.docs.root = Some(root);
        }
    }
    if let Some(base) = get("MERMAID_DOCS_BASE") {
        config.docs.base_dir = PathBuf::from(base);
    }
    if let Some(version) = get("MERMAID_DOCS_VERSION") {
        config.docs.version = version;
    }
}

fn replace_port(bind: &str, port: u16) -> String {
    match bind.parse::<SocketAddr>() {
        Ok(mut addr) => {
            addr.set_port(port);
            addr.to_string()
        }
        Err(_) => format!("0.0.0.0:{}", port),
    }
}

fn validate(config: &Config) -> Result<()> {
    config
        .server
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("server.bind is not a socket address: {}", config.server.bind))?;

    if config.search.max_results == 0 {
        bail!("search.max_results must be >= 1");
    }

    if config.normalizer.timeout_secs == 0 {
        bail!("normalizer.timeout_secs must be > 0");
    }

    if config.context7.timeout_secs == 0 || config.context7.mcp_timeout_secs == 0 {
        bail!("context7 timeouts must be > 0");
    }

    if config.context7.mcp_is_enabled() && config.context7.mcp_command.trim().is_empty() {
        bail!("context7.mcp_command must not be empty when MCP lookup is enabled");
    }

    Ok(())
}
