//! Attempt history queries.

use chrono::{NaiveTime, Utc};
use rusqlite::params;

use super::helpers::row_to_log_entry;
use super::{logged, CrawlRepository};
use crate::models::{CrawlStatus, GlobalStats, LogEntry};
use crate::repository::Result;

/// Window of finished attempts the success rate is computed over.
const SUCCESS_RATE_WINDOW: i64 = 1000;

impl CrawlRepository {
    pub fn get_log_entry(&self, id: i64) -> Result<Option<LogEntry>> {
        self.fetch_one(
            "SELECT * FROM crawl_log WHERE id = ?1",
            params![id],
            row_to_log_entry,
        )
    }

    /// Newest attempts first, optionally restricted to one status.
    pub fn get_recent_logs(
        &self,
        limit: usize,
        status: Option<CrawlStatus>,
    ) -> Result<Vec<LogEntry>> {
        let limit = limit as i64;
        match status {
            Some(status) => self.fetch_all(
                "SELECT * FROM crawl_log WHERE status = ?1 ORDER BY id DESC LIMIT ?2",
                params![status, limit],
                row_to_log_entry,
            ),
            None => self.fetch_all(
                "SELECT * FROM crawl_log ORDER BY id DESC LIMIT ?1",
                params![limit],
                row_to_log_entry,
            ),
        }
    }

    /// Fleet-wide numbers over the history table.
    pub fn get_global_stats(&self) -> Result<GlobalStats> {
        let midnight = Utc::now()
            .date_naive()
            .and_time(NaiveTime::default())
            .and_utc()
            .to_rfc3339();

        self.with_conn(|conn| logged("global_stats", global_stats(conn, &midnight)))
    }
}

fn global_stats(conn: &rusqlite::Connection, midnight: &str) -> rusqlite::Result<GlobalStats> {
    let active_spiders: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT spider_name) FROM crawl_log",
        [],
        |row| row.get(0),
    )?;

    let (successes, total): (i64, i64) = conn.query_row(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN status = ?1 THEN 1 ELSE 0 END), 0),
            COUNT(*)
        FROM (
            SELECT status FROM crawl_log
            WHERE status != ?2
            ORDER BY id DESC
            LIMIT ?3
        )
        "#,
        params![CrawlStatus::Success, CrawlStatus::Running, SUCCESS_RATE_WINDOW],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let network_errors: i64 = conn.query_row(
        "SELECT COUNT(*) FROM crawl_log WHERE status = ?1 AND created_at >= ?2",
        params![CrawlStatus::TempFail, midnight],
        |row| row.get(0),
    )?;

    let success_rate = if total > 0 {
        (successes as f64 * 1000.0 / total as f64).round() / 10.0
    } else {
        0.0
    };

    Ok(GlobalStats {
        active_spiders: active_spiders as u64,
        success_rate,
        total_requests: total as u64,
        network_errors: network_errors as u64,
    })
}
