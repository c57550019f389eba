use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use windlass::common::config::{apply_overrides, load_config, ConfigOverrides};
use windlass::downloads::{DownloadManager, DownloadSettings};
use windlass::engine::adapter::NativeEngine;
use windlass::library::LibraryClient;
use windlass::sandbox::PathSandbox;
use windlass::search::SearchClient;
use windlass::server::{routes, AppState};

#[derive(Parser)]
#[command(name = "windlass")]
#[command(about = "Download orchestration service for torrent transfers")]
struct Cli {
    /// Listen port, overriding the configured value
    #[arg(long)]
    port: Option<u16>,

    /// Download root directory, overriding the configured value
    #[arg(long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("windlass=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = apply_overrides(
        load_config()?,
        &ConfigOverrides {
            port: cli.port,
            root: cli.root,
        },
    );

    tokio::fs::create_dir_all(&config.downloads.root)
        .await
        .with_context(|| {
            format!(
                "Failed to create download root {}",
                config.downloads.root.display()
            )
        })?;

    let engine = Arc::new(NativeEngine::new());
    let sandbox = PathSandbox::new(config.downloads.root.clone());
    let manager = Arc::new(DownloadManager::new(
        engine,
        sandbox,
        DownloadSettings {
            metadata_timeout: Duration::from_secs(config.downloads.metadata_timeout_secs),
            scratch_dir: std::env::temp_dir(),
        },
    ));
    let search = Arc::new(SearchClient::new(config.search.clone())?);
    let library = LibraryClient::new(config.library.clone())?.map(Arc::new);
    if library.is_none() {
        warn!("media library not configured; library endpoints will answer 503");
    }

    let app = routes::router(AppState::new(manager, search, library));
    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;
    info!(addr = %listener.local_addr()?, root = %config.downloads.root.display(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
