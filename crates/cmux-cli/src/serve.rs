//! # Serve Subcommand
//!
//! Builds the storage backend and [`AppConfig`] from flags (or `CMUX_*`
//! environment variables) and runs the HTTP server until Ctrl-C.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use cmux_api::state::DEFAULT_MAX_UPLOAD_BYTES;
use cmux_api::{AppConfig, AppState};
use cmux_core::Depth;
use cmux_storage::{DynBackend, LocalFilesystemBackend, MemoryBackend};

/// Storage backend kinds.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    /// Local directory tree (`--storage-dir`).
    Local,
    /// Process memory; contents are lost on exit.
    Memory,
}

/// Arguments for `cmux serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on.
    #[arg(long, env = "CMUX_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Number of leading path segments that name a repository (0 = one global repository).
    #[arg(long, env = "CMUX_DEPTH", default_value_t = Depth::ROOT)]
    pub depth: Depth,

    /// Storage backend.
    #[arg(long, env = "CMUX_STORAGE", value_enum, default_value = "local")]
    pub storage: StorageKind,

    /// Root directory of the local storage backend.
    #[arg(long, env = "CMUX_STORAGE_DIR", default_value = "./chartstorage")]
    pub storage_dir: PathBuf,

    /// Absolute base URL for chart downloads in index.yaml.
    #[arg(long, env = "CMUX_CHART_URL")]
    pub chart_url: Option<String>,

    /// Allow uploads to replace an existing chart version.
    #[arg(long, env = "CMUX_ALLOW_OVERWRITE")]
    pub allow_overwrite: bool,

    /// Reject chart deletion with 405.
    #[arg(long, env = "CMUX_DISABLE_DELETE")]
    pub disable_delete: bool,

    /// Seconds an index.yaml request waits for a rebuild before 503.
    #[arg(long, env = "CMUX_INDEX_TIMEOUT_SECS", default_value_t = 30)]
    pub index_timeout_secs: u64,

    /// Upper bound on cached repository indexes.
    #[arg(long, env = "CMUX_MAX_CACHED_REPOSITORIES")]
    pub max_cached_repositories: Option<NonZeroUsize>,

    /// Largest accepted upload body, in bytes.
    #[arg(long, env = "CMUX_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

impl ServeArgs {
    /// Server configuration for these arguments.
    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            port: self.port,
            depth: self.depth,
            chart_url: self.chart_url.clone(),
            allow_overwrite: self.allow_overwrite,
            disable_delete: self.disable_delete,
            index_timeout: Duration::from_secs(self.index_timeout_secs),
            max_cached_repositories: self.max_cached_repositories,
            max_upload_bytes: self.max_upload_bytes,
        }
    }

    /// Open the configured storage backend, creating the local root if needed.
    pub fn backend(&self) -> Result<DynBackend> {
        match self.storage {
            StorageKind::Local => {
                std::fs::create_dir_all(&self.storage_dir).with_context(|| {
                    format!(
                        "failed to create storage directory: {}",
                        self.storage_dir.display()
                    )
                })?;
                Ok(Arc::new(LocalFilesystemBackend::new(&self.storage_dir)))
            }
            StorageKind::Memory => Ok(Arc::new(MemoryBackend::new())),
        }
    }
}

/// Execute `cmux serve`.
pub async fn run_serve(args: &ServeArgs) -> Result<u8> {
    let backend = args.backend()?;
    let config = args.app_config();
    tracing::info!(
        depth = %config.depth,
        storage = backend.name(),
        storage_dir = %args.storage_dir.display(),
        allow_overwrite = config.allow_overwrite,
        disable_delete = config.disable_delete,
        "starting cmux"
    );

    let addr = config.listen_addr();
    let app = cmux_api::app(AppState::new(config, backend));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("cmux listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("cmux stopped");
    Ok(0)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => {
            tracing::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    }
}
