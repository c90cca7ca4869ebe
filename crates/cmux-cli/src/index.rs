//! # Index Subcommand
//!
//! One-shot index generation: scan one namespace of a local storage root
//! with the same rebuild the server runs, then print the `index.yaml`.
//! Unreadable archives are skipped with a warning, as in the server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use cmux_chart::ChartArchiveExtractor;
use cmux_core::RepositoryId;
use cmux_index::{IndexCache, IndexCacheConfig};
use cmux_storage::LocalFilesystemBackend;

/// Arguments for `cmux index`.
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Storage root directory.
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Repository namespace under the root, e.g. `org1/team1`. The root
    /// repository when omitted.
    #[arg(long, value_name = "NAMESPACE", default_value = "")]
    pub depth_prefix: String,

    /// Absolute base URL for chart downloads.
    #[arg(long, env = "CMUX_CHART_URL")]
    pub chart_url: Option<String>,

    /// Write the index to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

/// Execute `cmux index`.
pub async fn run_index(args: &IndexArgs) -> Result<u8> {
    let yaml = build_index(&args.dir, &args.depth_prefix, args.chart_url.clone()).await?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &yaml)
                .with_context(|| format!("failed to write index: {}", path.display()))?;
            tracing::info!(output = %path.display(), "wrote index");
        }
        None => print!("{yaml}"),
    }
    Ok(0)
}

/// Build the `index.yaml` of `namespace` under `dir`.
pub async fn build_index(dir: &Path, namespace: &str, chart_url: Option<String>) -> Result<String> {
    if !dir.is_dir() {
        bail!("storage directory not found: {}", dir.display());
    }
    let repo = RepositoryId::parse(namespace)
        .with_context(|| format!("invalid namespace: {namespace:?}"))?;

    let cache = IndexCache::new(
        Arc::new(LocalFilesystemBackend::new(dir)),
        Arc::new(ChartArchiveExtractor::new()),
        IndexCacheConfig {
            chart_url,
            ..IndexCacheConfig::default()
        },
    );
    let index = cache
        .get(&repo)
        .await
        .with_context(|| format!("failed to index {repo}"))?;
    index.to_yaml().context("failed to serialize index")
}
