use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use super::services::{read_multipart, store_all, MAX_FILES_PER_REQUEST};
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_paths: Vec<String>,
}

/// Body limit for routes that take up to `MAX_FILES_PER_REQUEST` files.
pub fn body_limit(max_file_bytes: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_file_bytes.saturating_mul(MAX_FILES_PER_REQUEST) + 64 * 1024)
}

pub fn upload_routes(max_file_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .layer(body_limit(max_file_bytes))
}

/// POST /upload, multipart field `files` (repeatable).
#[instrument(skip(state, requester, mp), fields(user_id = %requester.user_id))]
pub async fn upload(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    mp: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut form = read_multipart(mp, state.config.upload.max_file_bytes).await?;
    let files = form.take_files(&["files", "file"]);
    if files.is_empty() {
        return Err(AppError::invalid("no files uploaded"));
    }
    let file_paths = store_all(state.storage.as_ref(), files).await?;
    Ok(Json(UploadResponse { file_paths }))
}
