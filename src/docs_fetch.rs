//! Local docs directory resolution and GitHub archive download.
//!
//! The local connector needs a copy of Mermaid's `packages/mermaid/src/docs`
//! tree. When the versioned directory is missing, the repository zip is
//! fetched from codeload.github.com and only the docs subtree is extracted.
//! Extraction goes into a staging directory that is renamed into place once
//! complete, so an interrupted download never leaves a half-filled docs dir.

use anyhow::{bail, Context, Result};
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::config::DocsConfig;

/// Maximum decompressed bytes extracted from a single archive entry.
const MAX_ENTRY_BYTES: u64 = 20 * 1024 * 1024;

const USER_AGENT: &str = concat!("mermaid-docs-server/", env!("CARGO_PKG_VERSION"));

/// Where the local docs are expected: the explicit root if it exists,
/// otherwise `base_dir/version`.
pub fn resolve_docs_dir(config: &DocsConfig) -> PathBuf {
    if let Some(root) = config.root.as_ref().filter(|r| r.exists()) {
        return root.clone();
    }
    let version = if config.version.trim().is_empty() {
        "latest"
    } else {
        config.version.trim()
    };
    config.base_dir.join(version)
}

/// Syntax directory inside a resolved docs dir.
pub fn syntax_dir(config: &DocsConfig, docs_dir: &Path) -> PathBuf {
    config
        .syntax_subpath
        .iter()
        .fold(docs_dir.to_path_buf(), |dir, part| dir.join(part))
}

/// Resolves the docs dir, downloading it when missing and allowed.
///
/// Download failures are logged; the path is returned regardless so the
/// server can still start and serve remote lookups.
pub async fn ensure_docs_dir(client: &reqwest::Client, config: &DocsConfig) -> PathBuf {
    let target = resolve_docs_dir(config);
    if target.exists() {
        return target;
    }

    if !config.auto_download {
        tracing::info!(
            "Docs directory {} missing and auto_download is off",
            target.display()
        );
        return target;
    }

    match download_docs_archive(client, config, &target, false).await {
        Ok(count) => tracing::info!(
            "Downloaded {} Mermaid doc files from {}@{} into {}",
            count,
            config.repo,
            config.git_ref,
            target.display()
        ),
        Err(e) => tracing::error!("Failed to download Mermaid docs archive: {e:#}"),
    }
    target
}

/// Archive URL for the configured repo and ref.
pub fn archive_url(config: &DocsConfig) -> String {
    match config.archive_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => format!(
            "https://codeload.github.com/{}/zip/refs/heads/{}",
            config.repo, config.git_ref
        ),
    }
}

/// Downloads the repository archive and extracts the docs subtree into
/// `target`. Returns the number of files written.
///
/// With `replace`, an existing `target` is swapped out only after the new
/// tree has been fully extracted; any earlier failure leaves it untouched.
pub async fn download_docs_archive(
    client: &reqwest::Client,
    config: &DocsConfig,
    target: &Path,
    replace: bool,
) -> Result<usize> {
    let url = archive_url(config);
    tracing::info!("Downloading Mermaid docs from {}", url);

    let resp = client
        .get(&url)
        .header("User-Agent", USER_AGENT)
        .timeout(Duration::from_secs(300))
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    if !resp.status().is_success() {
        bail!("Archive download returned {}", resp.status());
    }

    let bytes = resp.bytes().await?.to_vec();
    let subpath = config.docs_subpath.clone();
    let target = target.to_path_buf();

    tokio::task::spawn_blocking(move || install_archive(&bytes, &subpath, &target, replace))
        .await?
}

/// Extracts into a staging dir next to `target`, then renames it into place.
///
/// An existing `target` is an error unless `replace` is set, in which case it
/// is removed right before the rename.
pub fn install_archive(
    bytes: &[u8],
    docs_subpath: &[String],
    target: &Path,
    replace: bool,
) -> Result<usize> {
    let staging = staging_dir(target);
    if staging.exists() {
        std::fs::remove_dir_all(&staging)
            .with_context(|| format!("Failed to clear {}", staging.display()))?;
    }
    std::fs::create_dir_all(&staging)
        .with_context(|| format!("Failed to create {}", staging.display()))?;

    let count = match extract_docs_subtree(bytes, docs_subpath, &staging) {
        Ok(0) => {
            let _ = std::fs::remove_dir_all(&staging);
            bail!("Archive contains no files under {}", docs_subpath.join("/"));
        }
        Ok(n) => n,
        Err(e) => {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    if target.exists() {
        if !replace {
            let _ = std::fs::remove_dir_all(&staging);
            bail!("Docs directory {} already exists", target.display());
        }
        std::fs::remove_dir_all(target)
            .with_context(|| format!("Failed to remove old docs at {}", target.display()))?;
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(&staging, target)
        .with_context(|| format!("Failed to move docs into {}", target.display()))?;

    Ok(count)
}

fn staging_dir(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

/// Writes every file under `<top>/<docs_subpath>/` into `dest`, keeping
/// paths relative to that prefix. `<top>` is the archive's root folder,
/// taken from the first entry (GitHub archives use `<repo>-<ref>/`).
pub fn extract_docs_subtree(bytes: &[u8], docs_subpath: &[String], dest: &Path) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("Invalid zip archive")?;
    if archive.len() == 0 {
        bail!("Archive is empty");
    }

    let top = {
        let first = archive.by_index(0)?;
        first
            .name()
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string()
    };

    let mut prefix = std::iter::once(top.as_str())
        .chain(docs_subpath.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("/");
    prefix.push('/');

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let Some(relative) = name.strip_prefix(&prefix) else {
            continue;
        };
        let Some(relative) = safe_relative_path(relative) else {
            tracing::warn!("Skipping unsafe archive entry: {}", name);
            continue;
        };

        let mut data = Vec::new();
        (&mut entry)
            .take(MAX_ENTRY_BYTES + 1)
            .read_to_end(&mut data)
            .with_context(|| format!("Failed to read archive entry {}", name))?;
        if data.len() as u64 > MAX_ENTRY_BYTES {
            tracing::warn!("Skipping oversized archive entry: {}", name);
            continue;
        }

        let out_path = dest.join(&relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&out_path, &data)
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
        written += 1;
    }

    Ok(written)
}

/// Rejects absolute paths and `..` components.
fn safe_relative_path(relative: &str) -> Option<PathBuf> {
    let path = Path::new(relative);
    if relative.is_empty() {
        return None;
    }
    let ok = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    ok.then(|| path.to_path_buf())
}
