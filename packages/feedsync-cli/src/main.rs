//! feedsync CLI
//!
//! # Usage
//!
//! ```bash
//! # One sync pass; prints the pass report as JSON
//! feedsync run --config sync.yaml
//!
//! # Query the local index
//! feedsync search --config sync.yaml "refund policy" --limit 5
//!
//! # Inspect or drop the stored cursor
//! feedsync status --config sync.yaml
//! feedsync reset-cursor --config sync.yaml
//!
//! # Validate a configuration file
//! feedsync check-config --config sync.yaml
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr so
//! stdout carries only JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feedsync_core::infrastructure::{DeliveryClient, TantivyIndexSink};
use feedsync_core::{PassReport, Reconciler, SyncConfig};
use feedsync_storage::SqliteCursorStore;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "feedsync")]
#[command(about = "Keep a search index in step with a content change feed", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync pass
    Run {
        /// Configuration file (YAML)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Search the local index
    Search {
        #[arg(short, long)]
        config: PathBuf,

        /// Query string (BM25 over name and contents)
        query: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the stored cursor row
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Delete the stored cursor so the next pass bootstraps
    ResetCursor {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Validate a configuration file
    CheckConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { config } => run_pass(&config).await,
        Commands::Search {
            config,
            query,
            limit,
        } => search(&config, &query, limit),
        Commands::Status { config } => status(&config),
        Commands::ResetCursor { config } => reset_cursor(&config),
        Commands::CheckConfig { config } => check_config(&config),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path) -> Result<SyncConfig> {
    SyncConfig::from_yaml(path).with_context(|| format!("loading {}", path.display()))
}

fn open_cursor_store(config: &SyncConfig) -> Result<SqliteCursorStore> {
    SqliteCursorStore::open(
        &config.cursor.database_path,
        config.cursor.partition_key.clone(),
        config.cursor.row_key.clone(),
    )
    .with_context(|| {
        format!(
            "opening cursor database {}",
            config.cursor.database_path.display()
        )
    })
}

fn open_index(config: &SyncConfig) -> Result<TantivyIndexSink> {
    TantivyIndexSink::open(&config.index.path, config.index.writer_heap_bytes)
        .with_context(|| format!("opening index {}", config.index.path.display()))
}

async fn run_pass(config_path: &Path) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let store = Arc::new(open_cursor_store(&config)?);
    let sink = Arc::new(open_index(&config)?);
    let delivery = Arc::new(DeliveryClient::new(&config.delivery).context("building HTTP client")?);

    let reconciler = Reconciler::new(store, delivery.clone(), delivery, sink, config.pass)?;
    let result = reconciler.run_pass().await;

    let report = PassReport::from_result(&result);
    println!("{}", report.to_json()?);

    if let Err(err) = &result {
        error!("Pass failed: {}", err);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn search(config_path: &Path, query: &str, limit: usize) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let sink = open_index(&config)?;
    let hits = sink.search(query, limit)?;
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(ExitCode::SUCCESS)
}

fn status(config_path: &Path) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let store = open_cursor_store(&config)?;
    let status = match store.read_row()? {
        Some(row) => serde_json::json!({
            "partition_key": store.partition_key(),
            "row_key": store.row_key(),
            "cursor": row.cursor,
            "version": row.version,
            "updated_at": row.updated_at.to_rfc3339(),
        }),
        None => serde_json::json!({
            "partition_key": store.partition_key(),
            "row_key": store.row_key(),
            "cursor": null,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(ExitCode::SUCCESS)
}

fn reset_cursor(config_path: &Path) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let store = open_cursor_store(&config)?;
    if store.clear()? {
        info!(
            "Cursor {}/{} deleted; next pass bootstraps",
            store.partition_key(),
            store.row_key()
        );
    } else {
        info!("No cursor stored");
    }
    Ok(ExitCode::SUCCESS)
}

fn check_config(config_path: &Path) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    info!(
        "{} is valid (project {}, strategy {:?})",
        config_path.display(),
        config.delivery.project_id,
        config.pass.strategy
    );
    Ok(ExitCode::SUCCESS)
}
