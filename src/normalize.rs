//! Query normalization through an OpenAI-compatible chat completion API.
//!
//! User requests arrive in free form, often in Russian and mixed with styling
//! wishes ("нарисуй диаграмму последовательности в синих тонах"). The
//! normalizer asks the model for a short English search topic plus a
//! separate styling description. Every failure falls back to the trimmed
//! original query, so callers never see an error.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::NormalizerConfig;
use crate::models::NormalizedQuery;

const SYSTEM_PROMPT: &str = "You normalize user requests (possibly in Russian) for generating Mermaid diagrams. \
Respond with a strict JSON object only, no extra text:\n\
{\n  \"search_topic\": \"short English phrase for documentation search about the diagram intent\",\n  \
\"style_prefs\": \"short English description of visual styling preferences (colors, layout, theme, shapes) or empty if none\"\n}\n\
Do not explain anything, do not add comments or markdown.";

/// Returns true if `text` contains any character from the Cyrillic block.
pub fn contains_cyrillic(text: &str) -> bool {
    text.chars().any(|ch| ('\u{0400}'..='\u{04FF}').contains(&ch))
}

/// Normalize `query` for docs lookup.
///
/// `model_id` from the request wins over the configured model. With no
/// model or no base URL the query passes through untouched.
pub async fn normalize_query(
    client: &reqwest::Client,
    config: &NormalizerConfig,
    query: &str,
    model_id: &str,
) -> NormalizedQuery {
    let trimmed = query.trim();
    let fallback = NormalizedQuery::passthrough(trimmed);
    if trimmed.is_empty() {
        return fallback;
    }

    let model = match resolve_model(config, model_id) {
        Some(m) => m,
        None => {
            if contains_cyrillic(trimmed) {
                tracing::warn!(
                    "No normalizer model configured; Cyrillic query will be searched verbatim"
                );
            }
            return fallback;
        }
    };

    let base_url = config.base_url.trim();
    if base_url.is_empty() {
        return fallback;
    }

    match call_chat_completion(client, config, base_url, &model, trimmed).await {
        Ok(content) => apply_completion(fallback, &content),
        Err(e) => {
            tracing::warn!("Query normalization failed: {e:#}");
            fallback
        }
    }
}

fn resolve_model(config: &NormalizerConfig, model_id: &str) -> Option<String> {
    let requested = model_id.trim();
    if !requested.is_empty() {
        return Some(requested.to_string());
    }
    config
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

async fn call_chat_completion(
    client: &reqwest::Client,
    config: &NormalizerConfig,
    base_url: &str,
    model: &str,
    query: &str,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));

    let req = ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            },
            ChatMessage {
                role: "user",
                content: query,
            },
        ],
        temperature: 0.0,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", config.api_key.trim()))
        .timeout(Duration::from_secs(config.timeout_secs))
        .json(&req)
        .send()
        .await
        .context("Failed to call chat completion API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("chat completion API returned {status}: {body}");
    }

    let body: ChatResponse = resp
        .json()
        .await
        .context("Invalid chat completion response")?;

    Ok(body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default())
}

/// Merge the model's JSON answer into `fallback`. Fields that are missing,
/// empty, or unparseable leave the fallback value in place.
fn apply_completion(mut fallback: NormalizedQuery, content: &str) -> NormalizedQuery {
    let obj: serde_json::Value = match serde_json::from_str(strip_code_fence(content.trim())) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("Normalizer answer is not JSON: {e}. Raw: {content}");
            return fallback;
        }
    };

    let topic = field_text(&obj, "search_topic");
    if !topic.is_empty() {
        fallback.search_query = topic;
    }
    let style = field_text(&obj, "style_prefs");
    if !style.is_empty() {
        fallback.style_prefs = style;
    }
    fallback
}

fn field_text(obj: &serde_json::Value, key: &str) -> String {
    match obj.get(key) {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
