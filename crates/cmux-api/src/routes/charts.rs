//! # Chart API
//!
//! JSON views of the index, and the mutations: upload and delete.
//!
//! ## Endpoints (relative to the repository)
//!
//! - `GET api/charts`: every chart, keyed by name
//! - `GET api/charts/{name}`: every version of one chart, newest first
//! - `GET api/charts/{name}/{version}`: one version
//! - `POST|PUT charts`, `api/charts`: upload → 201 `{"saved": true}`
//! - `POST|PUT prov`, `api/prov`: upload provenance → 201 `{"saved": true}`
//! - `DELETE charts/{name}/{version}` → 200 `{"deleted": true}`

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cmux_core::RepositoryId;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extractors::{UploadBody, CHART_FIELD, PROV_FIELD};
use crate::state::AppState;

/// Body of a successful upload.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedResponse {
    pub saved: bool,
}

/// Body of a successful delete.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

/// `GET api/charts`
pub async fn list_charts(state: &AppState, repo: &RepositoryId) -> Result<Response, AppError> {
    let index = state
        .cache
        .get_with_deadline(repo, state.config.index_timeout)
        .await?;
    Ok(Json(&index.entries).into_response())
}

/// `GET api/charts/{name}`
pub async fn get_chart(
    state: &AppState,
    repo: &RepositoryId,
    name: &str,
) -> Result<Response, AppError> {
    let index = state
        .cache
        .get_with_deadline(repo, state.config.index_timeout)
        .await?;
    let versions = index
        .versions(name)
        .ok_or_else(|| AppError::NotFound(format!("chart {name} in {repo}")))?;
    Ok(Json(versions).into_response())
}

/// `GET api/charts/{name}/{version}`
pub async fn get_chart_version(
    state: &AppState,
    repo: &RepositoryId,
    name: &str,
    version: &str,
) -> Result<Response, AppError> {
    let index = state
        .cache
        .get_with_deadline(repo, state.config.index_timeout)
        .await?;
    let entry = index
        .find(name, version)
        .ok_or_else(|| AppError::NotFound(format!("chart {name}-{version} in {repo}")))?;
    Ok(Json(entry).into_response())
}

/// `POST|PUT charts`
///
/// A multipart form with only a `prov` field stores just the provenance
/// file.
pub async fn upload_chart(
    state: &AppState,
    repo: &RepositoryId,
    request: Request,
) -> Result<Response, AppError> {
    let body = UploadBody::read(request, CHART_FIELD).await?;
    match (body.chart, body.prov) {
        (Some(chart), prov) => {
            state.cache.put_chart(repo, &chart, prov.as_deref()).await?;
        }
        (None, Some(prov)) => {
            state.cache.put_provenance(repo, &prov).await?;
        }
        (None, None) => {
            return Err(AppError::BadRequest(format!(
                "upload has neither a {CHART_FIELD:?} nor a {PROV_FIELD:?} field"
            )));
        }
    }
    Ok(saved())
}

/// `POST|PUT prov`
pub async fn upload_provenance(
    state: &AppState,
    repo: &RepositoryId,
    request: Request,
) -> Result<Response, AppError> {
    let body = UploadBody::read(request, PROV_FIELD).await?;
    let prov = body
        .prov
        .ok_or_else(|| AppError::BadRequest(format!("upload has no {PROV_FIELD:?} field")))?;
    state.cache.put_provenance(repo, &prov).await?;
    Ok(saved())
}

/// `DELETE charts/{name}/{version}`
pub async fn delete_chart_version(
    state: &AppState,
    repo: &RepositoryId,
    name: &str,
    version: &str,
) -> Result<Response, AppError> {
    if state.config.disable_delete {
        return Err(AppError::MethodNotAllowed(
            "chart deletion is disabled".to_string(),
        ));
    }
    state.cache.delete_chart(repo, name, version).await?;
    Ok(Json(DeletedResponse { deleted: true }).into_response())
}

fn saved() -> Response {
    (StatusCode::CREATED, Json(SavedResponse { saved: true })).into_response()
}
