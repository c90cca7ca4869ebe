//! # cmux-api — Axum HTTP Service
//!
//! Serves any number of chart repositories from one storage root. The first
//! `depth` path segments of every request name the repository; the rest is
//! the route within it.
//!
//! ## Routes (per repository)
//!
//! - `GET {ns}/`: landing page
//! - `GET {ns}/index.yaml`: repository index, rebuilt on demand
//! - `GET {ns}/charts/{filename}`: stored archive or provenance file
//! - `GET {ns}/api/charts[/{name}[/{version}]]`: index contents as JSON
//! - `POST|PUT {ns}/charts`, `{ns}/api/charts`: upload a chart
//! - `POST|PUT {ns}/prov`, `{ns}/api/prov`: upload a provenance file
//! - `DELETE {ns}/charts/{name}/{version}`, `{ns}/api/charts/{name}/{version}`
//!
//! `/health/liveness` and `/health/readiness` are matched before tenant
//! routing.
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → DefaultBodyLimit → router
//!
//! ## Crate Policy
//!
//! - No storage or index logic in handlers; they delegate to `cmux-index`.
//! - All errors map to structured HTTP responses via `AppError`.

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
pub mod routing;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;

pub use error::AppError;
pub use routing::{ResolvedRoute, Resolver, Route, RouteError};
pub use state::{AppConfig, AppState};

/// Assemble the application router.
///
/// Health probes are exact-path routes; every other request falls through
/// to tenant dispatch.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .fallback(routes::dispatch)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::tracing_layer::layer())
        .with_state(state)
}

/// Liveness probe.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. The index cache builds lazily, so the server is ready once it listens.
async fn readiness() -> &'static str {
    "ready"
}
