// src/http.rs

//! HTTP API used by the web front-end.
//!
//! Routes:
//! - GET /component_testing/submit_test_request?test=<selector>
//! - GET /component_testing/request_update
//! - GET /component_testing/status
//! - GET /file_manager/request_scan_files
//! - GET /file_manager/delete_file?file=<name>
//! - GET /file_manager/download_file/{*file}

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::engine::{SessionHandle, SessionStatus};
use crate::errors::ScantestError;
use crate::event::RunEvent;
use crate::files::ScanStore;

/// Shared state behind every route.
#[derive(Debug, Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub store: Arc<ScanStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/component_testing/submit_test_request",
            get(submit_test_request),
        )
        .route("/component_testing/request_update", get(request_update))
        .route("/component_testing/status", get(session_status))
        .route("/file_manager/request_scan_files", get(request_scan_files))
        .route("/file_manager/delete_file", get(delete_file))
        .route("/file_manager/download_file/{*file}", get(download_file))
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ScantestError> for ApiError {
    fn from(err: ScantestError) -> Self {
        match err {
            ScantestError::InvalidFileName(name) => {
                ApiError::InvalidRequest(format!("invalid file name '{name}'"))
            }
            ScantestError::SessionClosed => ApiError::Unavailable(err.to_string()),
            other => ApiError::Internal(format!("{other:#}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(%status, error = %self, "request failed");
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestParams {
    #[serde(default)]
    pub test: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTestResponse {
    pub submitted_test_request: bool,
    pub test_params: TestParams,
    pub outcome: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub busy: bool,
    pub active_test: Option<u64>,
    pub live_processes: usize,
    pub cleanup_alarms: Vec<u64>,
}

impl From<SessionStatus> for SessionStatusResponse {
    fn from(status: SessionStatus) -> Self {
        Self {
            busy: status.busy,
            active_test: status.active_test.map(|id| id.0),
            live_processes: status.live_processes,
            cleanup_alarms: status.cleanup_alarms.into_iter().map(|id| id.0).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanFilesResponse {
    pub files: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FileParams {
    file: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileResponse {
    pub deleted: bool,
    pub file: String,
    pub updated_file_list: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /component_testing/submit_test_request
async fn submit_test_request(
    State(state): State<AppState>,
    Query(params): Query<TestParams>,
) -> Result<Json<SubmitTestResponse>, ApiError> {
    let ack = state.session.start_test(&params.test).await?;
    debug!(test = %params.test, outcome = ack.as_str(), "test request handled");

    Ok(Json(SubmitTestResponse {
        submitted_test_request: ack.accepted(),
        test_params: params,
        outcome: ack.as_str().to_string(),
    }))
}

/// GET /component_testing/request_update
async fn request_update(State(state): State<AppState>) -> Result<Json<Vec<RunEvent>>, ApiError> {
    Ok(Json(state.session.poll_updates().await?))
}

/// GET /component_testing/status
///
/// Lets an operator see whether the rig is held and whether a cleanup
/// process had to be given up on.
async fn session_status(
    State(state): State<AppState>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    Ok(Json(state.session.status().await?.into()))
}

/// GET /file_manager/request_scan_files
async fn request_scan_files(
    State(state): State<AppState>,
) -> Result<Json<ScanFilesResponse>, ApiError> {
    Ok(Json(ScanFilesResponse {
        files: state.store.list()?,
    }))
}

/// GET /file_manager/delete_file
async fn delete_file(
    State(state): State<AppState>,
    Query(params): Query<FileParams>,
) -> Result<Json<DeleteFileResponse>, ApiError> {
    ScanStore::check_name(&params.file)?;
    if !state.store.contains(&params.file) {
        return Err(ApiError::NotFound(params.file));
    }

    state.store.delete(&params.file)?;

    Ok(Json(DeleteFileResponse {
        deleted: true,
        updated_file_list: state.store.list()?,
        file: params.file,
    }))
}

/// GET /file_manager/download_file/{*file}
async fn download_file(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    ScanStore::check_name(&file)?;
    if !state.store.contains(&file) {
        return Err(ApiError::NotFound(file));
    }

    let reader = state.store.open_file(&file)?;
    let body = Body::from_stream(ReaderStream::new(reader));
    let disposition = format!("attachment; filename=\"{}\"", file.replace('"', ""));

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
