//! # Mermaid Docs Server CLI (`mdocs`)
//!
//! ## Usage
//!
//! ```bash
//! mdocs [--config ./config/mdocs.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mdocs serve` | Start the HTTP server (static files + `/docs/search`) |
//! | `mdocs search "<query>"` | Run one docs lookup and print the JSON response |
//! | `mdocs sources` | Show which lookup sources are configured |
//! | `mdocs docs fetch` | Download the Mermaid docs archive into the docs dir |
//!
//! Without `--config`, `./config/mdocs.toml` is used if present; environment
//! variables (`PORT`, `CLIPROXY_*`, `CONTEXT7_*`, `MERMAID_DOCS_*`) override
//! file values either way.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mermaid_docs::{config, docs_fetch, search, server, sources};

/// Mermaid docs server: static assets plus a Mermaid documentation search
/// endpoint backed by Context7 and a local docs checkout.
#[derive(Parser)]
#[command(name = "mdocs", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Serves `/docs/search`, `/docs/sources`, `/health`, and static files
    /// from `[server].static_dir` for every other path.
    Serve,

    /// Run one docs lookup and print the JSON response.
    Search {
        /// Free-text query, in any language.
        query: String,

        /// Chat model used to normalize the query (overrides config).
        #[arg(long)]
        model: Option<String>,
    },

    /// List lookup sources and whether they are configured.
    Sources,

    /// Manage the local Mermaid docs checkout.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },
}

#[derive(Subcommand)]
enum DocsAction {
    /// Download and extract the docs archive.
    Fetch {
        /// Replace an existing docs directory.
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search { query, model } => {
            search::run_search(&cfg, &query, model.as_deref()).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Docs { action } => match action {
            DocsAction::Fetch { force } => {
                fetch_docs(&cfg, force).await?;
            }
        },
    }

    Ok(())
}

async fn fetch_docs(cfg: &config::Config, force: bool) -> Result<()> {
    let target = docs_fetch::resolve_docs_dir(&cfg.docs);
    if target.exists() && !force {
        println!("Docs already present at {}", target.display());
        return Ok(());
    }

    let client = search::http_client()?;
    let count = docs_fetch::download_docs_archive(&client, &cfg.docs, &target, force).await?;
    println!("Extracted {} doc files into {}", count, target.display());
    Ok(())
}
