//! # Repository Reads
//!
//! `index.yaml` and stored artifacts, the two reads a chart client makes.

use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use cmux_core::{ArtifactKind, RepositoryId};

use crate::error::AppError;
use crate::state::AppState;

/// Media type of `index.yaml`.
pub const INDEX_CONTENT_TYPE: &str = "application/x-yaml";

/// `GET {ns}/index.yaml`
///
/// Waits at most the configured index timeout for a rebuild; 503 after
/// that, and the next request retries.
pub async fn get_index(state: &AppState, repo: &RepositoryId) -> Result<Response, AppError> {
    let index = state
        .cache
        .get_with_deadline(repo, state.config.index_timeout)
        .await?;
    let yaml = index
        .to_yaml()
        .map_err(|e| AppError::Internal(format!("serialize index for {repo}: {e}")))?;
    Ok(([(CONTENT_TYPE, INDEX_CONTENT_TYPE)], yaml).into_response())
}

/// `GET {ns}/charts/{filename}`
///
/// The extension is classified before storage is consulted, so an
/// unrecognized one fails the same way whether or not such an object
/// exists.
pub async fn get_artifact(
    state: &AppState,
    repo: &RepositoryId,
    filename: &str,
) -> Result<Response, AppError> {
    let Some(kind) = ArtifactKind::classify(filename) else {
        return Err(AppError::UnsupportedArtifactType(filename.to_string()));
    };
    let object = state.cache.fetch_artifact(repo, filename, kind).await?;
    Ok(([(CONTENT_TYPE, kind.content_type())], object.content).into_response())
}
