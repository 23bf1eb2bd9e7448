//! Shared handler plumbing: error responses and blocking store access.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use super::super::AppState;
use crate::governance::GovernanceManager;
use crate::repository::RepositoryError;

/// Error returned by API handlers, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) | ApiError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("API error: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Run a store operation on the blocking pool.
///
/// The repository holds a std mutex around a SQLite connection, so it must
/// never be called from an async worker thread directly.
pub async fn run_blocking<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&GovernanceManager) -> crate::repository::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let governor = state.governor.clone();
    tokio::task::spawn_blocking(move || op(&governor))
        .await
        .map_err(|e| ApiError::Internal(format!("Blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}
