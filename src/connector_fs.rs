//! Local Mermaid docs connector.
//!
//! Last resort of the cascade. Works on a checked-out (or downloaded) copy
//! of the Mermaid docs tree and tries, in order:
//!
//! 1. **Diagram keywords**: whole-word matches such as `sequence` or
//!    `gantt` map straight to the syntax page for that diagram type.
//! 2. **Substring scan**: when no keyword matched, every markdown file is
//!    searched for the query and the first hit is returned with a few lines
//!    of context.
//! 3. **Core docs**: directive and theming pages are appended so styling
//!    requests always have reference material.
//! 4. **Basics**: a query about "basics" with no other hit gets the
//!    examples page.

use anyhow::Result;
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::SearchConfig;
use crate::models::{DocSnippet, SnippetSource};
use crate::traits::DocsSource;

/// Diagram keyword → doc file, relative to the syntax directory.
const DIAGRAM_DOCS: &[(&str, &str)] = &[
    ("flowchart", "flowchart.md"),
    ("sequence", "sequenceDiagram.md"),
    ("class", "classDiagram.md"),
    ("state", "stateDiagram.md"),
    ("er", "entityRelationshipDiagram.md"),
    ("entity", "entityRelationshipDiagram.md"),
    ("gantt", "gantt.md"),
    ("mindmap", "mindmap.md"),
    ("pie", "pie.md"),
    ("gitgraph", "gitgraph.md"),
    ("journey", "userJourney.md"),
    ("timeline", "timeline.md"),
    ("zenuml", "zenuml.md"),
    ("sankey", "sankey.md"),
    ("xy", "xyChart.md"),
    ("block", "block.md"),
    ("quadrant", "quadrantChart.md"),
    ("requirement", "requirementDiagram.md"),
    ("c4", "c4.md"),
    ("kanban", "kanban.md"),
    ("architecture", "architecture.md"),
    ("packet", "packet.md"),
    ("radar", "radar.md"),
    ("treemap", "treemap.md"),
    ("config", "../config/configuration.md"),
    ("configuration", "../config/configuration.md"),
    ("directives", "../config/directives.md"),
    ("theme", "../config/theming.md"),
    ("theming", "../config/theming.md"),
    ("styling", "../config/theming.md"),
];

lazy_static! {
    // ASCII word boundaries: a keyword glued to Cyrillic text ("erдиаграмма")
    // still counts as a whole word.
    static ref DIAGRAM_PATTERNS: Vec<(Regex, &'static str)> = DIAGRAM_DOCS
        .iter()
        .map(|(key, file)| {
            let pattern = format!(r"(?i)(?-u:\b){}(?-u:\b)", regex::escape(key));
            let re = Regex::new(&pattern).expect("diagram keyword pattern is valid");
            (re, *file)
        })
        .collect();
}

#[derive(Clone)]
pub struct LocalDocsSource {
    docs_dir: PathBuf,
    syntax_dir: PathBuf,
    search: SearchConfig,
}

impl LocalDocsSource {
    /// `docs_dir` is scanned for substring hits; keyword and core doc paths
    /// resolve against `syntax_dir`.
    pub fn new(docs_dir: PathBuf, syntax_dir: PathBuf, search: SearchConfig) -> Self {
        Self {
            docs_dir,
            syntax_dir,
            search,
        }
    }

    /// Runs every local strategy synchronously.
    pub fn search(&self, query: &str, max_results: usize) -> Vec<DocSnippet> {
        let query = query.trim();
        if query.is_empty() || max_results == 0 || !self.docs_dir.exists() {
            return Vec::new();
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut results = self.keyword_matches(query, &mut seen);

        if results.is_empty() {
            results = substring_scan(&self.docs_dir, query, max_results, self.search.context_lines);
            seen.extend(results.iter().map(|r| r.file.clone()));
        }

        if self.search.inject_core_docs {
            for core in &self.search.core_docs {
                if seen.contains(core) {
                    continue;
                }
                if let Some(snippet) = self.read_doc(core, SnippetSource::CoreDocs) {
                    seen.insert(core.clone());
                    results.push(snippet);
                }
            }
        }

        if results.is_empty() && query.to_lowercase().contains("basics") {
            if let Some(snippet) = self.read_doc(&self.search.basics_fallback, SnippetSource::LocalDocs) {
                results.push(snippet);
            }
        }

        results.truncate(max_results);
        results
    }

    fn keyword_matches(&self, query: &str, seen: &mut HashSet<String>) -> Vec<DocSnippet> {
        let mut results = Vec::new();
        for (pattern, file) in DIAGRAM_PATTERNS.iter() {
            if seen.contains(*file) || !pattern.is_match(query) {
                continue;
            }
            tracing::debug!("Diagram keyword {} matched {}", pattern.as_str(), file);
            match self.read_doc(file, SnippetSource::LocalDocs) {
                Some(snippet) => {
                    seen.insert(file.to_string());
                    results.push(snippet);
                }
                None => tracing::debug!("Doc file missing: {}", self.syntax_dir.join(file).display()),
            }
        }
        results
    }

    /// Reads a doc file relative to the syntax dir, keeping the first
    /// `max_doc_chars` characters.
    fn read_doc(&self, relative: &str, source: SnippetSource) -> Option<DocSnippet> {
        let path = self.syntax_dir.join(relative);
        if !path.is_file() {
            return None;
        }
        match std::fs::read(&path) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                let snippet: String = content.chars().take(self.search.max_doc_chars).collect();
                Some(DocSnippet::new(relative, snippet, source))
            }
            Err(e) => {
                tracing::warn!("Error reading docs file {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl DocsSource for LocalDocsSource {
    fn name(&self) -> &str {
        "local-docs"
    }

    fn kind(&self) -> &str {
        "filesystem"
    }

    fn is_configured(&self) -> bool {
        self.docs_dir.exists()
    }

    fn describe(&self) -> String {
        self.docs_dir.display().to_string()
    }

    async fn lookup(&self, query: &str, max_results: usize) -> Result<Vec<DocSnippet>> {
        let source = self.clone();
        let query = query.to_string();
        let results =
            tokio::task::spawn_blocking(move || source.search(&query, max_results)).await?;
        Ok(results)
    }
}

/// Case-insensitive substring search over all markdown files under `root`.
///
/// Files are visited in sorted order. Each matching file contributes one
/// snippet: the first matching line with `context_lines` lines either side.
pub fn substring_scan(
    root: &Path,
    query: &str,
    max_results: usize,
    context_lines: usize,
) -> Vec<DocSnippet> {
    let needle = query.trim().to_lowercase();
    let mut results = Vec::new();
    if needle.is_empty() || max_results == 0 || !root.exists() {
        return results;
    }

    let include = match build_globset(&["**/*.md".to_string()]) {
        Ok(set) => set,
        Err(e) => {
            tracing::warn!("Invalid include glob: {e}");
            return results;
        }
    };
    let exclude = match build_globset(&["**/node_modules/**".to_string(), "**/.git/**".to_string()]) {
        Ok(set) => set,
        Err(e) => {
            tracing::warn!("Invalid exclude glob: {e}");
            return results;
        }
    };

    let walker = WalkDir::new(root).sort_by_file_name();
    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");
        if exclude.is_match(&rel_str) || !include.is_match(&rel_str) {
            continue;
        }

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(_) => continue,
        };
        let text = String::from_utf8_lossy(&bytes);

        if let Some(snippet) = context_snippet(&text, &needle, context_lines) {
            results.push(DocSnippet::new(rel_str, snippet, SnippetSource::Local));
            if results.len() >= max_results {
                break;
            }
        }
    }

    results
}

/// Lines around the first line containing `needle` (already lowercased).
fn context_snippet(text: &str, needle: &str, context_lines: usize) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let idx = lines
        .iter()
        .position(|line| line.to_lowercase().contains(needle))?;

    let start = idx.saturating_sub(context_lines);
    let end = (idx + context_lines + 1).min(lines.len());
    Some(lines[start..end].join("\n").trim().to_string())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
