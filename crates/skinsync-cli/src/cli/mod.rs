//! CLI for the skinsync skin catalog and HTTP fetcher.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skinsync_core::config::{self, Config};
use skinsync_core::http::{HttpClient, HttpClientOptions};
use skinsync_core::skins::{CatalogOptions, SkinCatalog};
use skinsync_core::storage::Storage;
use std::path::PathBuf;
use std::sync::Arc;

use commands::{run_fetch, run_find, run_list};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "skinsync")]
#[command(about = "skinsync: skin catalog and download tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Rescan skin folders and list every loaded skin.
    List,

    /// Look up a skin by name, optionally downloading it when missing.
    Find {
        /// Skin name (exact, case-sensitive).
        name: String,
        /// Download the skin if it is not available locally.
        #[arg(long)]
        download: bool,
        /// How long to wait for a download, in seconds.
        #[arg(long, default_value = "15", value_name = "SECS")]
        wait_secs: u64,
    },

    /// Fetch a URL and print the response (or save it to a file).
    Fetch {
        /// HTTP/HTTPS URL.
        url: String,
        /// Write the body to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Send a HEAD request.
        #[arg(long, conflicts_with = "output")]
        head: bool,
        /// Pretty-print the body as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn client_for(cfg: &Config) -> Arc<HttpClient> {
    Arc::new(HttpClient::new(HttpClientOptions {
        debug: cfg.debug_curl,
        ..HttpClientOptions::default()
    }))
}

fn catalog_for(cfg: &Config) -> Result<SkinCatalog> {
    let storage = Storage::open_default(&cfg.data_dirs).context("open skin storage")?;
    Ok(SkinCatalog::new(
        client_for(cfg),
        storage,
        CatalogOptions::from_config(cfg),
    ))
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::List => run_list(catalog_for(&cfg)?)?,
            CliCommand::Find {
                name,
                download,
                wait_secs,
            } => run_find(catalog_for(&cfg)?, &name, download, wait_secs).await?,
            CliCommand::Fetch {
                url,
                output,
                head,
                json,
            } => run_fetch(client_for(&cfg), &cfg, &url, output, head, json).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
