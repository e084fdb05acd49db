//! Source status reporting for `/docs/sources` and `mdocs sources`.

use anyhow::Result;

use crate::config::Config;
use crate::docs_fetch::resolve_docs_dir;
use crate::models::SourceStatus;
use crate::search::http_client;
use crate::traits::SourceRegistry;

/// Status of the normalizer plus every lookup source, in cascade order.
pub fn collect_sources(config: &Config, registry: &SourceRegistry) -> Vec<SourceStatus> {
    let model = config
        .normalizer
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());

    let mut statuses = vec![SourceStatus {
        name: "normalizer".to_string(),
        kind: "llm".to_string(),
        configured: model.is_some() && !config.normalizer.base_url.trim().is_empty(),
        detail: format!(
            "{} (model: {})",
            config.normalizer.base_url,
            model.unwrap_or("per request")
        ),
    }];
    statuses.extend(registry.statuses());
    statuses
}

/// `mdocs sources`: prints the status table without downloading anything.
pub fn list_sources(config: &Config) -> Result<()> {
    let registry =
        SourceRegistry::with_defaults(config, http_client()?, resolve_docs_dir(&config.docs));

    println!("{:<16} {:<12} {:<12} DETAIL", "SOURCE", "KIND", "CONFIGURED");
    for s in collect_sources(config, &registry) {
        println!("{:<16} {:<12} {:<12} {}", s.name, s.kind, s.configured, s.detail);
    }

    Ok(())
}
