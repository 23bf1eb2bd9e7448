//! Aggregated views served to operators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CrawlStatus;

/// Per-group status counts over the group's UrlState rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStats {
    pub total: u64,
    pub success: u64,
    pub running: u64,
    /// TEMP_FAIL and PERM_FAIL.
    pub failed: u64,
    pub pending: u64,
}

/// Current state of a group's seed URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorStatus {
    pub url: String,
    pub status: CrawlStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub http_code: Option<i64>,
    pub state_msg: Option<String>,
}

/// One dashboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group_path: String,
    pub name: Option<String>,
    pub stats: GroupStats,
    pub anchor_status: Option<AnchorStatus>,
}

/// Fleet-wide numbers for the monitor header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Distinct spiders seen in the history.
    pub active_spiders: u64,
    /// Percentage of SUCCESS over the most recent finished attempts.
    pub success_rate: f64,
    /// Attempts considered for `success_rate`.
    pub total_requests: u64,
    /// TEMP_FAIL attempts recorded today (UTC).
    pub network_errors: u64,
}
