//! Row parsing helpers for the crawl repository.

use crate::models::{AnchorStatus, GroupRecord, LogEntry, UrlState};
use crate::repository::{parse_datetime, parse_datetime_opt};

/// Parse a `crawl_status` row into a UrlState.
pub fn row_to_url_state(row: &rusqlite::Row) -> rusqlite::Result<UrlState> {
    Ok(UrlState {
        url: row.get("url")?,
        url_hash: row.get("url_hash")?,
        group_path: row.get("group_path")?,
        spider_name: row.get("spider_name")?,
        status: row.get("status")?,
        retry_count: row.get::<_, i64>("retry_count")?.max(0) as u32,
        http_code: row.get("http_code")?,
        file_path: row.get("file_path")?,
        last_run_at: parse_datetime_opt(row.get("last_run_at")?),
        next_run_at: parse_datetime_opt(row.get("next_run_at")?),
        duration: row.get("duration")?,
        state_msg: row.get("state_msg")?,
    })
}

/// Parse a `crawl_status` row into the anchor view of a group's seed URL.
pub fn row_to_anchor(row: &rusqlite::Row) -> rusqlite::Result<AnchorStatus> {
    Ok(AnchorStatus {
        url: row.get("url")?,
        status: row.get("status")?,
        last_run_at: parse_datetime_opt(row.get("last_run_at")?),
        next_run_at: parse_datetime_opt(row.get("next_run_at")?),
        http_code: row.get("http_code")?,
        state_msg: row.get("state_msg")?,
    })
}

/// Parse a `crawl_log` row into a LogEntry.
pub fn row_to_log_entry(row: &rusqlite::Row) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get("id")?,
        url: row.get("url")?,
        group_path: row.get("group_path")?,
        spider_name: row.get("spider_name")?,
        status: row.get("status")?,
        http_code: row.get("http_code")?,
        duration: row.get("duration")?,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
    })
}

/// Parse a `task_groups` row into a GroupRecord.
pub fn row_to_group(row: &rusqlite::Row) -> rusqlite::Result<GroupRecord> {
    let config_str: String = row.get("config_json")?;

    Ok(GroupRecord {
        group_path: row.get("group_path")?,
        seed_url: row.get("list_url")?,
        display_name: row.get("name")?,
        config: serde_json::from_str(&config_str).unwrap_or_default(),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
    })
}
