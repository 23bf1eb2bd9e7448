//! Persistent flow-control signals.

use rusqlite::params;

use super::CrawlRepository;
use crate::models::ControlSignal;
use crate::repository::{now_timestamp, RepositoryError, Result};

impl CrawlRepository {
    /// Read a control signal. Unknown keys read as NORMAL.
    pub fn get_signal(&self, key: &str) -> Result<ControlSignal> {
        let raw = self.fetch_one(
            "SELECT signal FROM sys_control WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )?;

        match raw {
            None => Ok(ControlSignal::Normal),
            Some(raw) => ControlSignal::from_str(&raw)
                .ok_or_else(|| RepositoryError::InvalidData(format!("unknown control signal: {}", raw))),
        }
    }

    pub fn set_signal(&self, key: &str, signal: ControlSignal) -> Result<()> {
        self.execute(
            r#"
            INSERT INTO sys_control (key, signal, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                signal = excluded.signal,
                updated_at = excluded.updated_at
            "#,
            params![key, signal.as_str(), now_timestamp()],
        )?;
        Ok(())
    }
}
