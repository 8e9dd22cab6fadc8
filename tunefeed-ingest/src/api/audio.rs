//! Audio retrieval endpoint
//!
//! GET `<public_prefix>/:file_name` serves a stored artifact. A missing file
//! is answered with the shared generic fallback so players always get audio.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::error::{ApiError, ApiResult};
use crate::models::artifact::content_type_for;
use crate::services::storage_manager::{StorageError, GENERIC_FALLBACK_FILE};
use crate::AppState;

/// GET `<public_prefix>/:file_name`
pub async fn serve_audio(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> ApiResult<Response> {
    match state.storage.read(&file_name).await {
        Ok(bytes) => Ok(audio_response(&file_name, bytes)),
        Err(StorageError::NotFound(_)) => {
            tracing::warn!(file_name = %file_name, "Audio not found, serving generic fallback");
            let fallback = state.storage.ensure_generic_fallback().await?;
            let bytes = state.storage.read(&fallback.file_name).await?;
            Ok(audio_response(GENERIC_FALLBACK_FILE, bytes))
        }
        Err(e @ StorageError::InvalidName(_)) => Err(ApiError::from(e)),
        Err(e) => {
            tracing::error!(file_name = %file_name, error = %e, "Failed to read audio");
            Err(ApiError::from(e))
        }
    }
}

fn audio_response(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type_for(file_name).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Build audio routes under the configured public prefix
pub fn audio_routes(public_prefix: &str) -> Router<AppState> {
    let path = format!("{}/:file_name", public_prefix.trim_end_matches('/'));
    Router::new().route(&path, get(serve_audio))
}
