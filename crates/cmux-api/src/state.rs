//! # Application State
//!
//! Shared state for the Axum application, passed to the dispatch handler
//! via the `State` extractor.
//!
//! AppState holds:
//! - **Config**: server settings fixed at startup, including the tenancy
//!   depth
//! - **Resolver**: the depth-parameterized path resolver
//! - **Index cache**: per-repository indexes over the storage backend

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use cmux_chart::{ChartArchiveExtractor, Extractor};
use cmux_core::Depth;
use cmux_index::{IndexCache, IndexCacheConfig};
use cmux_storage::DynBackend;

use crate::routing::Resolver;

/// Default cap on upload bodies (64 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Number of leading path segments that name a repository.
    pub depth: Depth,
    /// Absolute base URL for chart downloads in `index.yaml`. Relative URLs
    /// when `None`.
    pub chart_url: Option<String>,
    /// Whether uploads may replace an existing chart version.
    pub allow_overwrite: bool,
    /// Reject every delete with 405.
    pub disable_delete: bool,
    /// How long an `index.yaml` request waits for a rebuild.
    pub index_timeout: Duration,
    /// Upper bound on cached repository indexes. Unbounded when `None`.
    pub max_cached_repositories: Option<NonZeroUsize>,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            depth: Depth::ROOT,
            chart_url: None,
            allow_overwrite: false,
            disable_delete: false,
            index_timeout: Duration::from_secs(30),
            max_cached_repositories: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl AppConfig {
    /// Address the server listens on: every interface, at `port`.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    fn cache_config(&self) -> IndexCacheConfig {
        IndexCacheConfig {
            chart_url: self.chart_url.clone(),
            allow_overwrite: self.allow_overwrite,
            max_repositories: self.max_cached_repositories,
        }
    }
}

/// Shared application state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<AppConfig>,
    /// Path resolver for the configured depth.
    pub resolver: Resolver,
    /// Index cache over the storage backend.
    pub cache: Arc<IndexCache>,
}

impl AppState {
    /// Create state serving `backend` with the chart archive extractor.
    pub fn new(config: AppConfig, backend: DynBackend) -> Self {
        Self::with_extractor(config, backend, Arc::new(ChartArchiveExtractor::new()))
    }

    /// Create state with a custom metadata extractor.
    pub fn with_extractor(
        config: AppConfig,
        backend: DynBackend,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        let cache = IndexCache::new(backend, extractor, config.cache_config());
        Self {
            resolver: Resolver::new(config.depth),
            cache: Arc::new(cache),
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmux_storage::MemoryBackend;

    #[test]
    fn default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.depth, Depth::ROOT);
        assert!(!config.allow_overwrite);
        assert!(!config.disable_delete);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn listen_addr_uses_configured_port() {
        let config = AppConfig {
            port: 9191,
            ..AppConfig::default()
        };
        assert_eq!(config.listen_addr(), "0.0.0.0:9191".parse().unwrap());
    }

    #[test]
    fn state_carries_config_into_cache_and_resolver() {
        let config = AppConfig {
            depth: Depth::new(2),
            chart_url: Some("https://charts.example.com".to_string()),
            allow_overwrite: true,
            max_cached_repositories: NonZeroUsize::new(16),
            ..AppConfig::default()
        };
        let state = AppState::new(config, Arc::new(MemoryBackend::new()));
        assert_eq!(state.resolver.depth(), Depth::new(2));
        assert!(state.cache.config().allow_overwrite);
        assert_eq!(
            state.cache.config().chart_url.as_deref(),
            Some("https://charts.example.com")
        );
        assert_eq!(state.cache.config().max_repositories, NonZeroUsize::new(16));
    }

    #[test]
    fn state_clone_shares_cache() {
        let state = AppState::new(AppConfig::default(), Arc::new(MemoryBackend::new()));
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.cache, &cloned.cache));
    }
}
