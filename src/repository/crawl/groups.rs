//! Group registry operations.

use rusqlite::params;

use super::helpers::row_to_group;
use super::{logged, CrawlRepository};
use crate::models::{CrawlStatus, GroupRecord, UrlState};
use crate::repository::{now_timestamp, Result};
use crate::utils::group_path::spider_name_of;

const UPSERT_GROUP: &str = r#"
    INSERT INTO task_groups (group_path, list_url, name, config_json, created_at)
    VALUES (?1, ?2, ?3, '{}', ?4)
    ON CONFLICT(group_path) DO UPDATE SET
        list_url = excluded.list_url,
        name = excluded.name
"#;

/// Seed rows are only created; an existing row keeps its history.
const SEED_URL_STATE: &str = r#"
    INSERT OR IGNORE INTO crawl_status (url, url_hash, group_path, spider_name, status)
    VALUES (?1, ?2, ?3, ?4, ?5)
"#;

impl CrawlRepository {
    /// Create or update a group, and make sure its seed URL has a state row.
    pub fn upsert_group(
        &self,
        group_path: &str,
        seed_url: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<()> {
        let now = now_timestamp();
        self.with_tx(|conn| {
            logged(
                UPSERT_GROUP,
                conn.execute(UPSERT_GROUP, params![group_path, seed_url, display_name, now]),
            )?;

            if let Some(url) = seed_url {
                logged(
                    SEED_URL_STATE,
                    conn.execute(
                        SEED_URL_STATE,
                        params![
                            url,
                            UrlState::compute_hash(url),
                            group_path,
                            spider_name_of(group_path),
                            CrawlStatus::Pending
                        ],
                    ),
                )?;
            }
            Ok(())
        })
    }

    /// Every registered group, ordered by path.
    pub fn list_groups(&self) -> Result<Vec<GroupRecord>> {
        self.fetch_all(
            "SELECT * FROM task_groups ORDER BY group_path",
            [],
            row_to_group,
        )
    }

    /// Groups whose path starts with `prefix` (plain string prefix).
    pub fn list_groups_with_prefix(&self, prefix: &str) -> Result<Vec<GroupRecord>> {
        self.fetch_all(
            r#"
            SELECT * FROM task_groups
            WHERE substr(group_path, 1, length(?1)) = ?1
            ORDER BY group_path
            "#,
            params![prefix],
            row_to_group,
        )
    }

    pub fn get_group(&self, group_path: &str) -> Result<Option<GroupRecord>> {
        self.fetch_one(
            "SELECT * FROM task_groups WHERE group_path = ?1",
            params![group_path],
            row_to_group,
        )
    }
}
