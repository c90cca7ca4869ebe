//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps routing and index errors to HTTP status codes and JSON error
//! bodies with a machine-readable code. Internal error details are logged,
//! never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cmux_index::IndexError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::RouteError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "NAMESPACE_AMBIGUOUS").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request could not be interpreted (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Path is shorter than the tenancy depth (400).
    #[error("namespace ambiguous: {0}")]
    NamespaceAmbiguous(String),

    /// Method not allowed on this route (405).
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Conflict with stored state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Upload body over the configured limit (413).
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Requested filename has no recognized artifact extension (500).
    #[error("unsupported artifact type: {0}")]
    UnsupportedArtifactType(String),

    /// Uploaded chart could not be read (500). Nothing was stored.
    #[error("chart could not be read: {0}")]
    UnreadableChart(String),

    /// The index was not ready before the request deadline (503).
    #[error("index rebuild did not finish in time: {0}")]
    RebuildCancelled(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::NamespaceAmbiguous(_) => (StatusCode::BAD_REQUEST, "NAMESPACE_AMBIGUOUS"),
            Self::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::UnsupportedArtifactType(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UNSUPPORTED_ARTIFACT_TYPE",
            ),
            Self::UnreadableChart(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UNREADABLE_CHART"),
            Self::RebuildCancelled(_) => (StatusCode::SERVICE_UNAVAILABLE, "REBUILD_CANCELLED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<RouteError> for AppError {
    fn from(err: RouteError) -> Self {
        match &err {
            RouteError::NamespaceAmbiguous { .. } => Self::NamespaceAmbiguous(err.to_string()),
            RouteError::InvalidSegment(_) => Self::BadRequest(err.to_string()),
            RouteError::UnknownRoute(_) => Self::NotFound(err.to_string()),
            RouteError::MethodNotAllowed { .. } => Self::MethodNotAllowed(err.to_string()),
        }
    }
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        match &err {
            IndexError::ArtifactNotFound(_) => Self::NotFound(err.to_string()),
            IndexError::VersionConflict { .. } => Self::Conflict(err.to_string()),
            IndexError::Extraction(inner) => Self::UnreadableChart(inner.to_string()),
            IndexError::ProvenanceMismatch { .. } | IndexError::InvalidReference(_) => {
                Self::BadRequest(err.to_string())
            }
            IndexError::RebuildCancelled { .. } => Self::RebuildCancelled(err.to_string()),
            IndexError::Storage(_) => Self::Internal(err.to_string()),
        }
    }
}
