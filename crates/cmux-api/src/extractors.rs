//! # Upload Extraction
//!
//! Reads upload request bodies. Two encodings are accepted:
//!
//! - raw bytes (`Content-Type` anything but multipart), taken as the
//!   artifact itself;
//! - `multipart/form-data` with a `chart` field and an optional `prov`
//!   field.

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;

use crate::error::AppError;

/// Multipart field carrying the chart archive.
pub const CHART_FIELD: &str = "chart";
/// Multipart field carrying the provenance file.
pub const PROV_FIELD: &str = "prov";

/// Artifacts carried by one upload request.
#[derive(Debug, Default)]
pub struct UploadBody {
    /// Chart archive bytes.
    pub chart: Option<Bytes>,
    /// Provenance file bytes.
    pub prov: Option<Bytes>,
}

impl UploadBody {
    /// Read `request`. `raw_field` says which artifact a raw body is.
    ///
    /// Both encodings are bounded by the router's `DefaultBodyLimit`.
    pub async fn read(request: Request, raw_field: &'static str) -> Result<Self, AppError> {
        if is_multipart(&request) {
            let multipart = Multipart::from_request(request, &())
                .await
                .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
            return read_multipart(multipart).await;
        }

        let bytes = Bytes::from_request(request, &())
            .await
            .map_err(|rejection| rejected(rejection.status(), rejection.body_text()))?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("empty upload body".to_string()));
        }
        let mut body = Self::default();
        if raw_field == PROV_FIELD {
            body.prov = Some(bytes);
        } else {
            body.chart = Some(bytes);
        }
        Ok(body)
    }
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

async fn read_multipart(mut multipart: Multipart) -> Result<UploadBody, AppError> {
    let mut body = UploadBody::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(CHART_FIELD) => body.chart = Some(field.bytes().await.map_err(multipart_error)?),
            Some(PROV_FIELD) => body.prov = Some(field.bytes().await.map_err(multipart_error)?),
            other => tracing::debug!(field = ?other, "ignoring unknown multipart field"),
        }
    }
    Ok(body)
}

fn multipart_error(err: MultipartError) -> AppError {
    rejected(err.status(), err.body_text())
}

fn rejected(status: StatusCode, message: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message)
    } else {
        AppError::BadRequest(message)
    }
}
