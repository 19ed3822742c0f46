//! HTTP surface: one route, `POST /analyze_and_prepare`.
//!
//! The handler only reads the multipart body; everything after that is
//! [`MintPreparer::prepare`].

use crate::error::AriaError;
use crate::output::{infer_media_type, PreparedMint, UploadedDocument};
use crate::prepare::{MintPreparer, PrepareFailure, Stage};
use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, warn};

/// Route path of the single endpoint.
pub const ANALYZE_AND_PREPARE: &str = "/analyze_and_prepare";

/// Shared, read-only handler state.
#[derive(Clone)]
pub struct AppState {
    preparer: Arc<MintPreparer>,
}

impl AppState {
    pub fn new(preparer: Arc<MintPreparer>) -> Self {
        Self { preparer }
    }
}

/// Build the router with CORS, request tracing and the upload size limit.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(ANALYZE_AND_PREPARE, post(analyze_and_prepare))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn analyze_and_prepare(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PreparedMint>, ApiError> {
    let multipart = multipart.map_err(|rejection| AriaError::InvalidUpload(rejection.body_text()))?;
    let (document, owner) = read_upload(multipart).await?;
    let mint = state.preparer.prepare(document, owner).await?;
    Ok(Json(mint))
}

/// Pull the `document` file and optional `owner_address` out of the form.
///
/// The first `document` part wins; unknown parts are drained and ignored.
/// A `document` part without a filename is treated as an empty filename.
async fn read_upload(
    mut multipart: Multipart,
) -> Result<(UploadedDocument, Option<String>), AriaError> {
    let mut document: Option<UploadedDocument> = None;
    let mut owner: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AriaError::InvalidUpload(format!("Failed to read multipart: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "document" if document.is_none() => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let declared = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AriaError::InvalidUpload(format!("Failed to read document: {e}")))?
                    .to_vec();
                let media_type = declared.unwrap_or_else(|| infer_media_type(&bytes));
                document = Some(UploadedDocument::new(bytes, media_type, filename));
            }
            "owner_address" if owner.is_none() => {
                let text = field.text().await.map_err(|e| {
                    AriaError::InvalidUpload(format!("Failed to read owner_address: {e}"))
                })?;
                owner = Some(text);
            }
            other => {
                debug!(field = other, "Ignoring multipart field");
            }
        }
    }

    let document = document.ok_or(AriaError::MissingDocument)?;
    if document.filename.is_empty() {
        return Err(AriaError::EmptyFilename);
    }
    Ok((document, owner))
}

/// [`AriaError`] rendered as `{"error": ...}` with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    error: AriaError,
    stage: Option<Stage>,
}

impl From<AriaError> for ApiError {
    fn from(error: AriaError) -> Self {
        Self { error, stage: None }
    }
}

impl From<PrepareFailure> for ApiError {
    fn from(failure: PrepareFailure) -> Self {
        Self {
            error: failure.error,
            stage: Some(failure.stage),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if self.error.is_client_error() {
            warn!(error = %self.error, "Rejected upload");
            self.error.to_string()
        } else {
            let stage = self.stage.map(|s| s.to_string()).unwrap_or_default();
            error!(stage = %stage, error = %self.error, details = ?self.error, "Request failed");
            "Internal server error".to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
