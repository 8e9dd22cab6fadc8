//! Catalog import API handlers
//!
//! POST /api/import/chart, POST /api/import/search, GET /api/import/songs,
//! GET /api/import/audio-status, PUT /api/import/audio-download

use axum::{
    extract::{Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiResult, IngestError};
use crate::models::SongRecord;
use crate::services::ImportReport;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadToggleParams {
    pub enable: bool,
}

/// Audio download status response
#[derive(Debug, Serialize)]
pub struct AudioStatusResponse {
    pub download_enabled: bool,
    pub message: String,
}

impl AudioStatusResponse {
    fn new(download_enabled: bool) -> Self {
        let message = if download_enabled {
            "Preview audio is downloaded; synthesized audio is used when a download fails"
        } else {
            "Preview download is disabled; synthesized audio is used for every import"
        };
        Self {
            download_enabled,
            message: message.to_string(),
        }
    }
}

/// POST /api/import/chart
pub async fn import_chart(State(state): State<AppState>) -> ApiResult<Json<ImportReport>> {
    let tracks = state.feed.chart().await.map_err(IngestError::from)?;
    let report = state.orchestrator.import_page(&tracks).await;
    Ok(Json(report))
}

/// POST /api/import/search?q=
pub async fn import_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<ImportReport>> {
    let tracks = state
        .feed
        .search(&params.q, state.orchestrator.classifier())
        .await
        .map_err(IngestError::from)?;
    let report = state.orchestrator.import_page(&tracks).await;
    Ok(Json(report))
}

/// GET /api/import/songs
pub async fn list_songs(State(state): State<AppState>) -> Json<Vec<SongRecord>> {
    Json(state.catalog.songs())
}

/// GET /api/import/audio-status
pub async fn audio_status(State(state): State<AppState>) -> Json<AudioStatusResponse> {
    Json(AudioStatusResponse::new(state.orchestrator.download_enabled()))
}

/// PUT /api/import/audio-download?enable=bool
pub async fn set_audio_download(
    State(state): State<AppState>,
    Query(params): Query<DownloadToggleParams>,
) -> Json<AudioStatusResponse> {
    state.orchestrator.set_download_enabled(params.enable);
    Json(AudioStatusResponse::new(params.enable))
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/api/import/chart", post(import_chart))
        .route("/api/import/search", post(import_search))
        .route("/api/import/songs", get(list_songs))
        .route("/api/import/audio-status", get(audio_status))
        .route("/api/import/audio-download", put(set_audio_download))
}
