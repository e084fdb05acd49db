//! Context7 MCP connector.
//!
//! Spawns the Context7 MCP server as a child process (by default
//! `npx -y @upstash/context7-mcp`), performs the MCP handshake over stdio
//! and calls its `get-library-docs` tool. The text parts of the tool result
//! are merged into a single snippet labelled with the library ID.
//!
//! A fresh server process is started per lookup and shut down afterwards;
//! the whole exchange is bounded by `context7.mcp_timeout_secs`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rmcp::model::CallToolRequestParams;
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::Context7Config;
use crate::connector_http::{truncate_chars, TOPIC_MAX_CHARS};
use crate::models::{DocSnippet, SnippetSource};
use crate::traits::DocsSource;

const DOCS_TOOL: &str = "get-library-docs";

pub struct Context7McpSource {
    config: Context7Config,
}

impl Context7McpSource {
    pub fn new(config: Context7Config) -> Self {
        Self { config }
    }

    fn library_id(&self) -> &str {
        self.config.library_id.trim()
    }
}

#[async_trait]
impl DocsSource for Context7McpSource {
    fn name(&self) -> &str {
        "context7-mcp"
    }

    fn kind(&self) -> &str {
        "mcp"
    }

    fn is_configured(&self) -> bool {
        self.config.mcp_is_enabled()
    }

    fn describe(&self) -> String {
        format!(
            "{} {} ({})",
            self.config.mcp_command,
            self.config.mcp_args.join(" "),
            self.library_id()
        )
    }

    async fn lookup(&self, query: &str, max_results: usize) -> Result<Vec<DocSnippet>> {
        if !self.is_configured() || max_results == 0 {
            return Ok(Vec::new());
        }

        let topic = truncate_chars(query.trim(), TOPIC_MAX_CHARS);
        if topic.is_empty() {
            return Ok(Vec::new());
        }

        let timeout = Duration::from_secs(self.config.mcp_timeout_secs);
        let result = tokio::time::timeout(timeout, call_docs_tool(&self.config, topic))
            .await
            .context("Context7 MCP lookup timed out")??;

        Ok(snippets_from_tool_result(&result, self.library_id(), max_results))
    }
}

/// Builds the child-process command for the MCP server.
pub fn mcp_command(config: &Context7Config) -> Command {
    let mut cmd = Command::new(config.mcp_command.trim());
    cmd.args(&config.mcp_args).stderr(Stdio::null());
    if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
        cmd.env("CONTEXT7_API_KEY", key);
    }
    cmd
}

/// Arguments for the `get-library-docs` tool call.
pub fn docs_tool_arguments(library_id: &str, topic: &str) -> Value {
    json!({
        "context7CompatibleLibraryID": library_id,
        "topic": topic,
        "page": 1,
    })
}

async fn call_docs_tool(config: &Context7Config, topic: &str) -> Result<Value> {
    let transport = TokioChildProcess::new(mcp_command(config))
        .with_context(|| format!("Failed to spawn MCP server: {}", config.mcp_command))?;

    let client = ()
        .serve(transport)
        .await
        .context("MCP handshake with Context7 server failed")?;

    let params: CallToolRequestParams = serde_json::from_value(json!({
        "name": DOCS_TOOL,
        "arguments": docs_tool_arguments(config.library_id.trim(), topic),
    }))?;

    let result = client.call_tool(params).await;
    if let Err(e) = client.cancel().await {
        tracing::debug!("MCP client shutdown failed: {e}");
    }

    let result = result.with_context(|| format!("MCP tool call {} failed", DOCS_TOOL))?;
    Ok(serde_json::to_value(&result)?)
}

/// Collects the non-empty text parts of a serialized `CallToolResult`.
pub fn tool_result_texts(result: &Value) -> Vec<String> {
    result
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Merges the text parts into one snippet labelled with `library_id`.
pub fn snippets_from_tool_result(
    result: &Value,
    library_id: &str,
    max_results: usize,
) -> Vec<DocSnippet> {
    let texts = tool_result_texts(result);
    if texts.is_empty() {
        return Vec::new();
    }

    let full = texts.join("\n\n");
    let mut snippets = vec![DocSnippet::new(
        library_id,
        full.trim(),
        SnippetSource::Context7Mcp,
    )];
    snippets.truncate(max_results);
    snippets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texts_are_trimmed_and_joined() {
        let result = json!({
            "content": [
                {"type": "text", "text": "  TITLE: Flowcharts  "},
                {"type": "image", "data": "...", "mimeType": "image/png"},
                {"type": "text", "text": "   "},
                {"type": "text", "text": "graph TD\n  A-->B"}
            ],
            "isError": false
        });
        let out = snippets_from_tool_result(&result, "/mermaid-js/mermaid", 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].file, "/mermaid-js/mermaid");
        assert_eq!(out[0].source, SnippetSource::Context7Mcp);
        assert_eq!(out[0].snippet, "TITLE: Flowcharts\n\ngraph TD\n  A-->B");
    }

    #[test]
    fn test_no_text_parts_yields_nothing() {
        assert!(snippets_from_tool_result(&json!({"content": []}), "/lib", 5).is_empty());
        assert!(snippets_from_tool_result(&json!({}), "/lib", 5).is_empty());
    }

    #[test]
    fn test_zero_limit_yields_nothing() {
        let result = json!({"content": [{"type": "text", "text": "x"}]});
        assert!(snippets_from_tool_result(&result, "/lib", 0).is_empty());
    }

    #[test]
    fn test_tool_arguments_shape() {
        let args = docs_tool_arguments("/mermaid-js/mermaid", "sequence");
        assert_eq!(args["context7CompatibleLibraryID"], "/mermaid-js/mermaid");
        assert_eq!(args["topic"], "sequence");
        assert_eq!(args["page"], 1);
    }

    #[test]
    fn test_tool_request_params_deserialize() {
        let params: CallToolRequestParams = serde_json::from_value(json!({
            "name": DOCS_TOOL,
            "arguments": docs_tool_arguments("/lib", "pie"),
        }))
        .unwrap();
        assert_eq!(params.name, DOCS_TOOL);
    }

    #[test]
    fn test_disabled_without_library_id() {
        let cfg = Context7Config {
            library_id: "  ".into(),
            ..Context7Config::default()
        };
        assert!(!Context7McpSource::new(cfg).is_configured());
    }

    #[tokio::test]
    async fn test_missing_command_is_an_error() {
        let cfg = Context7Config {
            mcp_command: "/nonexistent/context7-mcp-binary".into(),
            mcp_args: vec![],
            mcp_timeout_secs: 5,
            ..Context7Config::default()
        };
        let source = Context7McpSource::new(cfg);
        assert!(source.lookup("flowchart", 5).await.is_err());
    }
}
