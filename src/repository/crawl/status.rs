//! Per-URL state: task start/finish transitions, scheduling and lookups.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::helpers::{row_to_anchor, row_to_url_state};
use super::{logged, CrawlRepository};
use crate::models::{AnchorStatus, CrawlStatus, GroupStats, TaskOutcome, UrlState};
use crate::repository::{now_timestamp, parse_datetime_opt, Result};

/// The fields the crawl decision reads for one URL.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlCheck {
    pub status: CrawlStatus,
    pub retry_count: u32,
    pub next_run_at: Option<DateTime<Utc>>,
}

const SELECT_CHECK: &str =
    "SELECT status, retry_count, next_run_at FROM crawl_status WHERE url = ?1";

const INSERT_RUNNING_LOG: &str = r#"
    INSERT INTO crawl_log (url, group_path, spider_name, status, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
"#;

const UPSERT_RUNNING_STATUS: &str = r#"
    INSERT INTO crawl_status (url, url_hash, group_path, spider_name, status, last_run_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(url) DO UPDATE SET
        status = excluded.status,
        spider_name = excluded.spider_name,
        last_run_at = excluded.last_run_at
"#;

/// Same transition, but only for rows another worker has not already claimed.
const CLAIM_RUNNING_STATUS: &str = r#"
    INSERT INTO crawl_status (url, url_hash, group_path, spider_name, status, last_run_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(url) DO UPDATE SET
        status = excluded.status,
        spider_name = excluded.spider_name,
        last_run_at = excluded.last_run_at
    WHERE crawl_status.status != excluded.status
"#;

const UPDATE_FINISHED_LOG: &str =
    "UPDATE crawl_log SET status = ?1, duration = ?2, http_code = ?3 WHERE id = ?4";

const INSERT_FINISHED_LOG: &str = r#"
    INSERT INTO crawl_log (url, group_path, spider_name, status, http_code, duration, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#;

/// retry_count grows only on TEMP_FAIL (?12) and resets on anything else.
/// Stateless reports (?11) also stamp last_run_at, since no start hook ran.
const UPSERT_FINISHED_STATUS: &str = r#"
    INSERT INTO crawl_status (
        url, url_hash, group_path, spider_name, status, retry_count,
        http_code, file_path, duration, state_msg, last_run_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, CASE WHEN ?5 = ?12 THEN 1 ELSE 0 END, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT(url) DO UPDATE SET
        status = excluded.status,
        duration = excluded.duration,
        http_code = excluded.http_code,
        state_msg = excluded.state_msg,
        file_path = excluded.file_path,
        spider_name = excluded.spider_name,
        retry_count = CASE WHEN excluded.status = ?12 THEN crawl_status.retry_count + 1 ELSE 0 END,
        last_run_at = CASE WHEN ?11 THEN excluded.last_run_at ELSE crawl_status.last_run_at END
"#;

impl CrawlRepository {
    /// Read the decision inputs for a URL.
    pub fn get_crawl_check(&self, url: &str) -> Result<Option<CrawlCheck>> {
        self.with_conn(|conn| read_check(conn, url))
    }

    /// Get the full state row for a URL.
    pub fn get_url_state(&self, url: &str) -> Result<Option<UrlState>> {
        self.fetch_one(
            "SELECT * FROM crawl_status WHERE url = ?1",
            params![url],
            row_to_url_state,
        )
    }

    /// Look a URL up by its hash.
    pub fn get_url_state_by_hash(&self, url_hash: &str) -> Result<Option<UrlState>> {
        self.fetch_one(
            "SELECT * FROM crawl_status WHERE url_hash = ?1 LIMIT 1",
            params![url_hash],
            row_to_url_state,
        )
    }

    /// Record the start of an attempt: open a RUNNING log row and mark the
    /// URL RUNNING. Returns the log row id.
    pub fn record_start(&self, url: &str, spider_name: &str, group_path: &str) -> Result<i64> {
        let now = now_timestamp();
        self.with_tx(|conn| {
            logged(
                UPSERT_RUNNING_STATUS,
                conn.execute(
                    UPSERT_RUNNING_STATUS,
                    params![
                        url,
                        UrlState::compute_hash(url),
                        group_path,
                        spider_name,
                        CrawlStatus::Running,
                        now
                    ],
                ),
            )?;
            insert_running_log(conn, url, spider_name, group_path, &now)
        })
    }

    /// Decide and start in one critical section.
    ///
    /// `decide` sees the current decision inputs; when it approves, the URL
    /// is moved to RUNNING only if no other worker holds it. Returns the log
    /// row id when this caller won the URL.
    pub fn try_claim<F>(
        &self,
        url: &str,
        spider_name: &str,
        group_path: &str,
        decide: F,
    ) -> Result<Option<i64>>
    where
        F: FnOnce(Option<&CrawlCheck>) -> bool,
    {
        let now = now_timestamp();
        self.with_tx(|conn| {
            let check = read_check(conn, url)?;
            if !decide(check.as_ref()) {
                return Ok(None);
            }

            let claimed = logged(
                CLAIM_RUNNING_STATUS,
                conn.execute(
                    CLAIM_RUNNING_STATUS,
                    params![
                        url,
                        UrlState::compute_hash(url),
                        group_path,
                        spider_name,
                        CrawlStatus::Running,
                        now
                    ],
                ),
            )?;
            if claimed == 0 {
                return Ok(None);
            }

            insert_running_log(conn, url, spider_name, group_path, &now).map(Some)
        })
    }

    /// Record the end of an attempt in both the log and the URL state.
    pub fn record_finish(&self, outcome: &TaskOutcome) -> Result<()> {
        let now = now_timestamp();
        self.with_tx(|conn| {
            let updated = match outcome.log_id {
                Some(id) => logged(
                    UPDATE_FINISHED_LOG,
                    conn.execute(
                        UPDATE_FINISHED_LOG,
                        params![outcome.status, outcome.duration, outcome.http_code, id],
                    ),
                )?,
                None => 0,
            };

            // No live log row (stateless report, or the row is gone)
            if updated == 0 {
                logged(
                    INSERT_FINISHED_LOG,
                    conn.execute(
                        INSERT_FINISHED_LOG,
                        params![
                            outcome.url,
                            outcome.group_path,
                            outcome.spider_name,
                            outcome.status,
                            outcome.http_code,
                            outcome.duration,
                            now
                        ],
                    ),
                )?;
            }

            logged(
                UPSERT_FINISHED_STATUS,
                conn.execute(
                    UPSERT_FINISHED_STATUS,
                    params![
                        outcome.url,
                        UrlState::compute_hash(&outcome.url),
                        outcome.group_path,
                        outcome.spider_name,
                        outcome.status,
                        outcome.http_code,
                        outcome.file_path,
                        outcome.duration,
                        outcome.state_msg,
                        now,
                        outcome.log_id.is_none(),
                        CrawlStatus::TempFail,
                    ],
                ),
            )?;
            Ok(())
        })
    }

    /// Set when a recurring URL is next due. Returns false if the URL is unknown.
    pub fn set_next_run(&self, url: &str, next_run_at: DateTime<Utc>) -> Result<bool> {
        let outcome = self.execute(
            "UPDATE crawl_status SET next_run_at = ?1 WHERE url = ?2",
            params![next_run_at.to_rfc3339(), url],
        )?;
        Ok(outcome.rows_affected > 0)
    }

    /// Count a group's URLs by status.
    pub fn get_group_stats(&self, group_path: &str) -> Result<GroupStats> {
        let stats = self.fetch_one(
            r#"
            SELECT
                COUNT(*) as total,
                SUM(CASE WHEN status = 2 THEN 1 ELSE 0 END) as success,
                SUM(CASE WHEN status = 1 THEN 1 ELSE 0 END) as running,
                SUM(CASE WHEN status IN (3, 4) THEN 1 ELSE 0 END) as failed,
                SUM(CASE WHEN status = 0 THEN 1 ELSE 0 END) as pending
            FROM crawl_status
            WHERE group_path = ?1
            "#,
            params![group_path],
            |row| {
                Ok(GroupStats {
                    total: row.get::<_, i64>(0)? as u64,
                    success: row.get::<_, Option<i64>>(1)?.unwrap_or(0) as u64,
                    running: row.get::<_, Option<i64>>(2)?.unwrap_or(0) as u64,
                    failed: row.get::<_, Option<i64>>(3)?.unwrap_or(0) as u64,
                    pending: row.get::<_, Option<i64>>(4)?.unwrap_or(0) as u64,
                })
            },
        )?;
        Ok(stats.unwrap_or_default())
    }

    /// Get the anchor view of a URL (used for group seed URLs).
    pub fn get_anchor_status(&self, url: &str) -> Result<Option<AnchorStatus>> {
        self.fetch_one(
            r#"
            SELECT url, status, last_run_at, next_run_at, http_code, state_msg
            FROM crawl_status WHERE url = ?1
            "#,
            params![url],
            row_to_anchor,
        )
    }
}

fn read_check(conn: &Connection, url: &str) -> rusqlite::Result<Option<CrawlCheck>> {
    logged(
        SELECT_CHECK,
        conn.query_row(SELECT_CHECK, params![url], |row| {
            Ok(CrawlCheck {
                status: row.get(0)?,
                retry_count: row.get::<_, i64>(1)?.max(0) as u32,
                next_run_at: parse_datetime_opt(row.get(2)?),
            })
        })
        .optional(),
    )
}

fn insert_running_log(
    conn: &Connection,
    url: &str,
    spider_name: &str,
    group_path: &str,
    now: &str,
) -> rusqlite::Result<i64> {
    logged(
        INSERT_RUNNING_LOG,
        conn.execute(
            INSERT_RUNNING_LOG,
            params![url, group_path, spider_name, CrawlStatus::Running, now],
        ),
    )?;
    Ok(conn.last_insert_rowid())
}
