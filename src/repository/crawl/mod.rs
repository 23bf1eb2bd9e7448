//! Crawl governance repository: groups, URL state, attempt log, control signals.

mod control;
mod groups;
mod helpers;
mod log;
mod status;

pub use status::CrawlCheck;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, Params, Row};

use super::{now_timestamp, RepositoryError, Result};

/// Key of the process-wide control signal row.
pub const GLOBAL_SIGNAL_KEY: &str = "global";

/// Rows touched by a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: usize,
    pub last_insert_id: i64,
}

/// SQLite-backed repository for crawl governance state.
///
/// Every statement runs on one connection behind one mutex; the mutex is the
/// only synchronization the rest of the crate relies on. Multi-statement
/// operations take the lock once through [`CrawlRepository::with_tx`] rather
/// than nesting calls.
pub struct CrawlRepository {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl CrawlRepository {
    /// Open (creating if needed) the governance database and its schema.
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = super::connect(db_path)?;
        let repo = Self {
            db_path: db_path.to_path_buf(),
            conn: Mutex::new(conn),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            logged("init_schema", conn.execute_batch(SCHEMA))?;
            logged(
                SEED_SIGNAL,
                conn.execute(SEED_SIGNAL, params![GLOBAL_SIGNAL_KEY, now_timestamp()]),
            )?;
            Ok(())
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RepositoryError::LockPoisoned)
    }

    /// Run a closure against the connection while holding the lock.
    pub fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }

    /// Run a closure inside one transaction while holding the lock.
    ///
    /// The transaction rolls back if the closure fails.
    pub fn with_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = logged("BEGIN", conn.transaction())?;
        let value = f(&tx)?;
        logged("COMMIT", tx.commit())?;
        Ok(value)
    }

    /// Execute one write statement.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<ExecOutcome> {
        self.with_conn(|conn| {
            let rows_affected = logged(sql, conn.execute(sql, params))?;
            Ok(ExecOutcome {
                rows_affected,
                last_insert_id: conn.last_insert_rowid(),
            })
        })
    }

    /// Fetch the first row of a query, if any.
    pub fn fetch_one<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let result = self.with_conn(|conn| match conn.query_row(sql, params, f) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => logged(sql, Err(e)),
        })?;
        Ok(result)
    }

    /// Fetch every row of a query.
    pub fn fetch_all<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.with_conn(|conn| {
            let mut stmt = logged(sql, conn.prepare(sql))?;
            logged(
                sql,
                stmt.query_map(params, f)
                    .and_then(|mapped| mapped.collect::<rusqlite::Result<Vec<_>>>()),
            )
        })
    }
}

/// Log a failed statement with its SQL before handing the error back.
pub(crate) fn logged<T>(sql: &str, result: rusqlite::Result<T>) -> rusqlite::Result<T> {
    result.inspect_err(|e| {
        tracing::error!(error = %e, sql = %sql.trim(), "DB error");
    })
}

const SCHEMA: &str = r#"
    -- Group registry (dashboard hierarchy and seed URLs)
    CREATE TABLE IF NOT EXISTS task_groups (
        group_path TEXT PRIMARY KEY,
        list_url TEXT,
        name TEXT,
        config_json TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    );

    -- Latest state of every unique URL
    CREATE TABLE IF NOT EXISTS crawl_status (
        url TEXT PRIMARY KEY,
        url_hash TEXT NOT NULL,
        group_path TEXT NOT NULL,
        spider_name TEXT NOT NULL,
        status INTEGER NOT NULL DEFAULT 0,
        retry_count INTEGER NOT NULL DEFAULT 0,
        http_code INTEGER,
        file_path TEXT,
        last_run_at TEXT,
        next_run_at TEXT,
        duration REAL,
        state_msg TEXT
    );

    -- Every attempt, append-only once finalized
    CREATE TABLE IF NOT EXISTS crawl_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL,
        group_path TEXT NOT NULL,
        spider_name TEXT NOT NULL,
        status INTEGER,
        http_code INTEGER,
        duration REAL,
        created_at TEXT NOT NULL
    );

    -- Persistent flow-control signals
    CREATE TABLE IF NOT EXISTS sys_control (
        key TEXT PRIMARY KEY,
        signal TEXT NOT NULL DEFAULT 'NORMAL',
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_status_group ON crawl_status(group_path);
    CREATE INDEX IF NOT EXISTS idx_status_spider ON crawl_status(spider_name);
    CREATE INDEX IF NOT EXISTS idx_status_hash ON crawl_status(url_hash);
    CREATE INDEX IF NOT EXISTS idx_log_url ON crawl_log(url);
"#;

const SEED_SIGNAL: &str =
    "INSERT OR IGNORE INTO sys_control (key, signal, updated_at) VALUES (?1, 'NORMAL', ?2)";

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("governance.db");

        let repo = CrawlRepository::new(&db_path).unwrap();
        drop(repo);
        let repo = CrawlRepository::new(&db_path).unwrap();

        let signals = repo
            .fetch_all("SELECT key FROM sys_control", [], |row| row.get::<_, String>(0))
            .unwrap();
        assert_eq!(signals, vec!["global".to_string()]);
    }

    #[test]
    fn test_execute_reports_insert_id_and_rows() {
        let dir = tempdir().unwrap();
        let repo = CrawlRepository::new(&dir.path().join("governance.db")).unwrap();

        let first = repo
            .execute(
                "INSERT INTO crawl_log (url, group_path, spider_name, status, created_at) VALUES (?1, 'g', 's', 1, ?2)",
                params!["https://a.example", now_timestamp()],
            )
            .unwrap();
        let second = repo
            .execute(
                "INSERT INTO crawl_log (url, group_path, spider_name, status, created_at) VALUES (?1, 'g', 's', 1, ?2)",
                params!["https://b.example", now_timestamp()],
            )
            .unwrap();
        assert_eq!(first.rows_affected, 1);
        assert_eq!(second.last_insert_id, first.last_insert_id + 1);

        let updated = repo
            .execute("UPDATE crawl_log SET status = 2", [])
            .unwrap();
        assert_eq!(updated.rows_affected, 2);
    }

    #[test]
    fn test_fetch_one_missing_row_is_none() {
        let dir = tempdir().unwrap();
        let repo = CrawlRepository::new(&dir.path().join("governance.db")).unwrap();
        let missing = repo
            .fetch_one(
                "SELECT url FROM crawl_status WHERE url = ?1",
                params!["https://nowhere.example"],
                |row| row.get::<_, String>(0),
            )
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_sql_errors_are_returned_not_swallowed() {
        let dir = tempdir().unwrap();
        let repo = CrawlRepository::new(&dir.path().join("governance.db")).unwrap();
        let err = repo.execute("INSERT INTO no_such_table VALUES (1)", []);
        assert!(matches!(err, Err(RepositoryError::Database(_))));
    }
}
