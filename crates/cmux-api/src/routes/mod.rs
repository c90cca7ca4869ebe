//! # Tenant Dispatch
//!
//! Every request that is not a health probe lands in [`dispatch`], which
//! resolves the path against the configured depth and hands the route to
//! its handler. Resolution failures are answered before the index cache or
//! storage is touched.

pub mod charts;
pub mod repository;

use axum::extract::{Request, State};
use axum::response::{Html, IntoResponse, Response};
use cmux_core::RepositoryId;

use crate::error::AppError;
use crate::routing::{ResolvedRoute, Route};
use crate::state::AppState;

/// Fallback handler: resolve, then dispatch.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Result<Response, AppError> {
    let ResolvedRoute { repo, route } = state
        .resolver
        .resolve(request.method(), request.uri().path())?;
    tracing::debug!(repo = %repo, route = route.as_str(), "dispatching");

    match route {
        Route::Welcome => Ok(welcome(&repo).into_response()),
        Route::GetIndex => repository::get_index(&state, &repo).await,
        Route::GetArtifact { filename } => repository::get_artifact(&state, &repo, &filename).await,
        Route::ListCharts => charts::list_charts(&state, &repo).await,
        Route::GetChart { name } => charts::get_chart(&state, &repo, &name).await,
        Route::GetChartVersion { name, version } => {
            charts::get_chart_version(&state, &repo, &name, &version).await
        }
        Route::UploadChart => charts::upload_chart(&state, &repo, request).await,
        Route::UploadProvenance => charts::upload_provenance(&state, &repo, request).await,
        Route::DeleteChartVersion { name, version } => {
            charts::delete_chart_version(&state, &repo, &name, &version).await
        }
    }
}

/// Landing page, served at every repository root.
fn welcome(repo: &RepositoryId) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head><title>cmux</title></head>\n\
         <body>\n\
         <h1>cmux chart repository</h1>\n\
         <p>Repository <code>{repo}</code>. Add it with \
         <code>helm repo add &lt;name&gt; &lt;url&gt;{repo}</code>; \
         the index is at <code>index.yaml</code>.</p>\n\
         </body>\n\
         </html>\n"
    ))
}
