//! API request handlers
//!
//! Handlers for all REST API endpoints.

use std::sync::{Arc, PoisonError};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TransyncError, TransyncResult};
use crate::format::FuzzyMode;
use crate::translation::download::DownloadFile;
use crate::translation::{EditorLock, MergeSummary, TranslationStats, UploadMethod, UploadOptions};
use crate::workspace::{SyncReport, Workspace};

use super::server::AppState;

/// Author recorded for API operations that do not name one
pub const API_AUTHOR: &str = "Transync API";

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Error response with the status matching the failure
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl From<TransyncError> for ApiError {
    fn from(err: TransyncError) -> Self {
        let status = match &err {
            TransyncError::NotFound(_) => StatusCode::NOT_FOUND,
            TransyncError::Locked(_) => StatusCode::CONFLICT,
            e if e.is_user_facing() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::err(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Run `f` on the shared workspace off the async executor
async fn with_workspace<T, F>(state: Arc<AppState>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Workspace) -> TransyncResult<T> + Send + 'static,
    T: Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || {
        let mut workspace = state
            .workspace
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut workspace)
    })
    .await;
    match joined {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Worker failed: {}", e),
        }),
    }
}

fn file_response(file: DownloadFile) -> Response {
    (
        [
            (header::CONTENT_TYPE, file.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", file.filename),
            ),
        ],
        file.data,
    )
        .into_response()
}

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

fn endpoint(method: &str, path: &str, description: &str) -> EndpointInfo {
    EndpointInfo {
        path: path.to_string(),
        method: method.to_string(),
        description: description.to_string(),
    }
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = RootResponse {
        name: "Transync API Server".to_string(),
        version: state.version.clone(),
        description: "Translation file synchronization and merge engine".to_string(),
        endpoints: vec![
            endpoint("GET", "/health", "Health check endpoint"),
            endpoint("GET", "/version", "Get server version"),
            endpoint("GET", "/api/v1/translations", "Statistics of every translation"),
            endpoint(
                "GET",
                "/api/v1/download/:project/:component/:lang",
                "Download one translation (?format=xlsx|po|json)",
            ),
            endpoint(
                "GET",
                "/api/v1/download/:project/:component",
                "Download a component as zip (?format=singlexlsx for one workbook)",
            ),
            endpoint(
                "POST",
                "/api/v1/upload/:project/:component/:lang",
                "Merge an uploaded file (raw body)",
            ),
            endpoint(
                "POST",
                "/api/v1/sync/:project/:component",
                "Re-read translation files",
            ),
            endpoint(
                "POST",
                "/api/v1/commit/:project/:component/:lang",
                "Commit pending edits",
            ),
            endpoint(
                "POST",
                "/api/v1/lock/:project/:component/:lang",
                "Take the editor lock",
            ),
        ],
    };
    Json(ApiResponse::ok(response))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_message: String,
}

/// GET /health - Health check
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        uptime_message: "Server is running".to_string(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: ["download", "upload", "sync", "commit", "lock"]
            .iter()
            .map(|f| f.to_string())
            .collect(),
    }))
}

/// GET /api/v1/translations - Statistics
pub async fn translations(State(state): State<Arc<AppState>>) -> ApiResult<Vec<TranslationStats>> {
    let stats = with_workspace(state, |workspace| Ok(workspace.statistics())).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

/// GET /api/v1/download/:project/:component/:lang
pub async fn download_translation(
    State(state): State<Arc<AppState>>,
    Path((project, component, lang)): Path<(String, String, String)>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let file = with_workspace(state, move |workspace| {
        workspace.download(&project, &component, &lang, query.format.as_deref())
    })
    .await?;
    Ok(file_response(file))
}

/// GET /api/v1/download/:project/:component
pub async fn download_component(
    State(state): State<Arc<AppState>>,
    Path((project, component)): Path<(String, String)>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let file = with_workspace(state, move |workspace| {
        workspace.download_many(&project, Some(&component), None, query.format.as_deref())
    })
    .await?;
    Ok(file_response(file))
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    /// Name of the uploaded file; its extension picks the format
    pub filename: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
    pub fuzzy: Option<String>,
    pub author: Option<String>,
}

impl UploadQuery {
    fn options(&self) -> TransyncResult<UploadOptions> {
        Ok(UploadOptions {
            overwrite: self.overwrite,
            method: UploadMethod::from_id(self.method.as_deref().unwrap_or_default())?,
            fuzzy: FuzzyMode::from_id(self.fuzzy.as_deref().unwrap_or_default())?,
            ..Default::default()
        })
    }
}

/// Merge outcome as reported to the uploader
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub summary: MergeSummary,
    pub message: String,
}

/// POST /api/v1/upload/:project/:component/:lang
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path((project, component, lang)): Path<(String, String, String)>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> ApiResult<UploadResponse> {
    let summary = with_workspace(state, move |workspace| {
        let options = query.options()?;
        let filename = query
            .filename
            .clone()
            .unwrap_or_else(|| format!("{}.po", lang));
        let author = query.author.as_deref().unwrap_or(API_AUTHOR);
        workspace.upload(&project, &component, &lang, author, &filename, &body, options)
    })
    .await?;

    let message = if summary.total == 0 {
        "No strings were imported from the uploaded file.".to_string()
    } else {
        format!(
            "Processed {} strings from the uploaded files (skipped: {}, not found: {}, updated: {}).",
            summary.total, summary.skipped, summary.not_found, summary.accepted
        )
    };
    Ok(Json(ApiResponse::ok(UploadResponse { summary, message })))
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncQuery {
    #[serde(default)]
    pub force: bool,
}

/// POST /api/v1/sync/:project/:component
pub async fn sync(
    State(state): State<Arc<AppState>>,
    Path((project, component)): Path<(String, String)>,
    Query(query): Query<SyncQuery>,
) -> ApiResult<Vec<SyncReport>> {
    let reports = with_workspace(state, move |workspace| {
        workspace.sync_component_by_slug(&project, &component, query.force)
    })
    .await?;
    Ok(Json(ApiResponse::ok(reports)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CommitQuery {
    pub author: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub committed: bool,
}

/// POST /api/v1/commit/:project/:component/:lang
pub async fn commit(
    State(state): State<Arc<AppState>>,
    Path((project, component, lang)): Path<(String, String, String)>,
    Query(query): Query<CommitQuery>,
) -> ApiResult<CommitResponse> {
    let committed = with_workspace(state, move |workspace| {
        let author = query.author.as_deref().unwrap_or(API_AUTHOR);
        workspace.commit(&project, &component, &lang, author)
    })
    .await?;
    Ok(Json(ApiResponse::ok(CommitResponse { committed })))
}

#[derive(Debug, Deserialize)]
pub struct LockQuery {
    pub user: String,
}

/// POST /api/v1/lock/:project/:component/:lang
pub async fn lock(
    State(state): State<Arc<AppState>>,
    Path((project, component, lang)): Path<(String, String, String)>,
    Query(query): Query<LockQuery>,
) -> ApiResult<EditorLock> {
    let lock = with_workspace(state, move |workspace| {
        workspace.lock(&project, &component, &lang, &query.user, Utc::now())
    })
    .await?;
    Ok(Json(ApiResponse::ok(lock)))
}
