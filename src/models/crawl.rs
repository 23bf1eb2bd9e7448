//! Persisted crawl records: groups, per-URL state and attempt history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::CrawlStatus;
use crate::utils::group_path::GroupPathInput;

/// A logical crawl group (e.g. one site section), keyed by normalized path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub group_path: String,
    /// List/RSS entry point; its UrlState is the group's dashboard anchor.
    pub seed_url: Option<String>,
    pub display_name: Option<String>,
    /// Opaque per-group configuration.
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Latest known state of a unique URL (the dashboard row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlState {
    pub url: String,
    pub url_hash: String,
    pub group_path: String,
    pub spider_name: String,
    pub status: CrawlStatus,
    pub retry_count: u32,
    pub http_code: Option<i64>,
    /// Snapshot location written by the storage sink.
    pub file_path: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Only set for recurring sources (lists, feeds).
    pub next_run_at: Option<DateTime<Utc>>,
    /// Seconds.
    pub duration: Option<f64>,
    pub state_msg: Option<String>,
}

impl UrlState {
    /// Hash used to look a URL up externally (e.g. snapshot retrieval).
    pub fn compute_hash(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// One crawl attempt in the append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub url: String,
    pub group_path: String,
    pub spider_name: String,
    pub status: CrawlStatus,
    pub http_code: Option<i64>,
    pub duration: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Final outcome of one crawl attempt, as handed to the finish hook.
///
/// `log_id` is the history row opened by a live session; `None` for
/// stateless reports from remote workers, which insert a fresh row instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub log_id: Option<i64>,
    pub url: String,
    pub spider_name: String,
    pub group_path: String,
    pub status: CrawlStatus,
    /// Seconds.
    pub duration: f64,
    pub http_code: Option<i64>,
    pub state_msg: Option<String>,
    pub file_path: Option<String>,
}

/// Outcome reported by a worker that never held a live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultReport {
    pub url: String,
    /// Defaults to the first segment of the group path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spider: Option<String>,
    #[serde(default, alias = "group")]
    pub group_path: GroupPathInput,
    pub status: CrawlStatus,
    #[serde(default)]
    pub http_code: i64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "error_msg")]
    pub state_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}
