//! Snapshot file serving.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use super::super::AppState;
use super::helpers::{run_blocking, ApiError};

/// Serve the stored snapshot of the URL whose hash is `url_hash`.
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(url_hash): Path<String>,
) -> Result<Response, ApiError> {
    // Hashes are hex; anything else could be a path trick
    if url_hash.is_empty() || !url_hash.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::BadRequest("Invalid hash".to_string()));
    }

    let lookup = url_hash.clone();
    let file_path = run_blocking(&state, move |gov| gov.snapshot_for_hash(&lookup))
        .await?
        .ok_or_else(|| ApiError::NotFound("Snapshot not found".to_string()))?;

    let not_found = || ApiError::NotFound("Snapshot not found".to_string());
    let canonical_file = file_path.canonicalize().map_err(|_| not_found())?;

    // Only files the storage sink wrote are served
    if let Ok(canonical_root) = state.files_dir.canonicalize() {
        if !canonical_file.starts_with(&canonical_root) {
            tracing::warn!(
                "Refusing snapshot outside storage root: {}",
                canonical_file.display()
            );
            return Err(not_found());
        }
    }

    let content = tokio::fs::read(&canonical_file)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read snapshot: {}", e)))?;

    let mime = mime_guess::from_path(&canonical_file)
        .first_or_octet_stream()
        .to_string();

    Ok(([(header::CONTENT_TYPE, mime)], content).into_response())
}
