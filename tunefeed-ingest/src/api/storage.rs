//! Audio storage administration
//!
//! GET /api/audio-storage/files, GET /api/audio-storage/info,
//! DELETE /api/audio-storage/files/:file_name, POST /api/audio-storage/cleanup,
//! GET /api/audio-storage/probe

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::{AudioArtifact, StorageSnapshot};
use crate::services::ProbeReport;
use crate::AppState;

const DEFAULT_CLEANUP_DAYS: u32 = 7;

/// GET /api/audio-storage/files response
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileEntry>,
    pub snapshot: StorageSnapshot,
}

#[derive(Debug, Serialize)]
pub struct FileEntry {
    #[serde(flatten)]
    pub artifact: AudioArtifact,
    /// Public URL of the file
    pub url: String,
}

/// GET /api/audio-storage/info response
#[derive(Debug, Serialize)]
pub struct StorageInfoResponse {
    #[serde(flatten)]
    pub snapshot: StorageSnapshot,
    pub formatted_size: String,
    pub download_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub file_name: String,
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct CleanupParams {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub days: u32,
    pub deleted_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ProbeParams {
    pub url: String,
}

/// GET /api/audio-storage/files
pub async fn list_files(State(state): State<AppState>) -> ApiResult<Json<FileListResponse>> {
    let artifacts = state.storage.list_artifacts().await?;
    let snapshot = state.storage.snapshot().await?;

    let files = artifacts
        .into_iter()
        .map(|artifact| FileEntry {
            url: state.storage.audio_ref(&artifact.file_name),
            artifact,
        })
        .collect();

    Ok(Json(FileListResponse { files, snapshot }))
}

/// GET /api/audio-storage/info
pub async fn storage_info(State(state): State<AppState>) -> ApiResult<Json<StorageInfoResponse>> {
    let snapshot = state.storage.snapshot().await?;

    Ok(Json(StorageInfoResponse {
        formatted_size: snapshot.formatted_size(),
        snapshot,
        download_enabled: state.orchestrator.download_enabled(),
    }))
}

/// DELETE /api/audio-storage/files/:file_name
///
/// Deleting a synthesized file forces it to be regenerated on the next import.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    if !state.storage.delete(&file_name).await? {
        return Err(ApiError::NotFound(format!("File not found: {}", file_name)));
    }

    Ok(Json(DeleteResponse {
        file_name,
        deleted: true,
    }))
}

/// POST /api/audio-storage/cleanup?days=N
pub async fn cleanup(
    State(state): State<AppState>,
    Query(params): Query<CleanupParams>,
) -> ApiResult<Json<CleanupResponse>> {
    let days = params.days.unwrap_or(DEFAULT_CLEANUP_DAYS);
    let deleted_count = state.storage.cleanup_older_than(days).await?;

    Ok(Json(CleanupResponse { days, deleted_count }))
}

/// GET /api/audio-storage/probe?url=
///
/// Diagnostic download: reports what a preview URL actually returns.
pub async fn probe(
    State(state): State<AppState>,
    Query(params): Query<ProbeParams>,
) -> ApiResult<Json<ProbeReport>> {
    if params.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url parameter is required".to_string()));
    }

    Ok(Json(state.fetcher.probe(&params.url).await))
}

/// Build storage administration routes
pub fn storage_routes() -> Router<AppState> {
    Router::new()
        .route("/api/audio-storage/files", get(list_files))
        .route("/api/audio-storage/files/:file_name", delete(delete_file))
        .route("/api/audio-storage/info", get(storage_info))
        .route("/api/audio-storage/cleanup", post(cleanup))
        .route("/api/audio-storage/probe", get(probe))
}
