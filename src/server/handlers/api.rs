//! Read-only monitoring endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::super::AppState;
use super::helpers::{run_blocking, ApiError};
use crate::models::{CrawlStatus, GlobalStats, GroupSummary, LogEntry};

const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 1000;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct DashboardParams {
    pub spider: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
    pub limit: Option<usize>,
    /// Status code (`3`) or name (`TEMP_FAIL`).
    pub status: Option<String>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<Vec<GroupSummary>>, ApiError> {
    let groups =
        run_blocking(&state, move |gov| gov.dashboard_summary(params.spider.as_deref())).await?;
    Ok(Json(groups))
}

pub async fn logs(
    State(state): State<AppState>,
    Query(params): Query<LogParams>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let status = params.status.as_deref().map(parse_status).transpose()?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .clamp(1, MAX_LOG_LIMIT);

    let logs = run_blocking(&state, move |gov| gov.recent_logs(limit, status)).await?;
    Ok(Json(logs))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<GlobalStats>, ApiError> {
    let stats = run_blocking(&state, |gov| gov.global_stats()).await?;
    Ok(Json(stats))
}

fn parse_status(raw: &str) -> Result<CrawlStatus, ApiError> {
    let parsed = match raw.trim().parse::<i64>() {
        Ok(code) => CrawlStatus::from_code(code),
        Err(_) => CrawlStatus::from_str(raw),
    };
    parsed.ok_or_else(|| ApiError::BadRequest(format!("Unknown status: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_accepts_code_and_name() {
        assert_eq!(parse_status("3").unwrap(), CrawlStatus::TempFail);
        assert_eq!(parse_status("success").unwrap(), CrawlStatus::Success);
        assert!(parse_status("9").is_err());
        assert!(parse_status("finished").is_err());
    }
}
