//! RPC endpoints for out-of-process crawl workers.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::super::AppState;
use super::helpers::{run_blocking, ApiError};
use crate::models::ResultReport;
use crate::utils::group_path::GroupPathInput;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterGroupRequest {
    #[serde(alias = "group")]
    pub group_path: GroupPathInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShouldCrawlRequest {
    pub url: String,
    /// Server default when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

pub async fn register_group(
    State(state): State<AppState>,
    Json(req): Json<RegisterGroupRequest>,
) -> Result<Json<Value>, ApiError> {
    let group_path = run_blocking(&state, move |gov| {
        gov.register_group_metadata(req.group_path, req.list_url.as_deref(), req.name.as_deref())
    })
    .await?;

    Ok(Json(json!({ "status": "ok", "group_path": group_path })))
}

pub async fn should_crawl(
    State(state): State<AppState>,
    Json(req): Json<ShouldCrawlRequest>,
) -> Result<Json<Value>, ApiError> {
    let should = run_blocking(&state, move |gov| {
        let max_retries = req.max_retries.unwrap_or(gov.max_retries());
        gov.should_crawl(&req.url, max_retries)
    })
    .await?;

    Ok(Json(json!({ "should_crawl": should })))
}

pub async fn report_result(
    State(state): State<AppState>,
    Json(report): Json<ResultReport>,
) -> Result<Json<Value>, ApiError> {
    if report.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url must not be empty".to_string()));
    }
    run_blocking(&state, move |gov| gov.report_result(report)).await?;
    Ok(Json(json!({ "status": "acked" })))
}
