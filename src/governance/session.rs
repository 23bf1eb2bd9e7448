//! Scoped crawl attempt.

use std::fmt::Display;
use std::time::{Duration, Instant};

use super::GovernanceManager;
use crate::models::{CrawlStatus, TaskOutcome};
use crate::repository::Result;
use crate::storage::snapshot_relative_path;

/// One crawl attempt of one URL.
///
/// Created by [`GovernanceManager::transaction`] or [`GovernanceManager::claim`],
/// which have already recorded the URL as RUNNING. Exactly one terminal call
/// is recorded; later ones are no-ops. A terminal call whose write fails
/// leaves the session open. Dropping the session without a recorded terminal
/// call records TEMP_FAIL, or PERM_FAIL if the thread is unwinding from a panic.
#[must_use = "a session records TEMP_FAIL when dropped without a terminal call"]
pub struct CrawlSession<'a> {
    manager: &'a GovernanceManager,
    url: String,
    group_path: String,
    spider_name: String,
    log_id: i64,
    started: Instant,
    http_code: Option<i64>,
    file_path: Option<String>,
    finished: bool,
}

impl<'a> CrawlSession<'a> {
    pub(super) fn new(
        manager: &'a GovernanceManager,
        url: &str,
        group_path: String,
        spider_name: String,
        log_id: i64,
    ) -> Self {
        Self {
            manager,
            url: url.to_string(),
            group_path,
            spider_name,
            log_id,
            started: Instant::now(),
            http_code: None,
            file_path: None,
            finished: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn group_path(&self) -> &str {
        &self.group_path
    }

    pub fn spider_name(&self) -> &str {
        &self.spider_name
    }

    /// History row opened for this attempt.
    pub fn log_id(&self) -> i64 {
        self.log_id
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Save a snapshot under `spider/group_path/sub_folder/filename`.
    ///
    /// Returns the absolute path, or an empty string if nothing was written.
    pub fn save_file(
        &mut self,
        content: impl AsRef<[u8]>,
        filename: &str,
        sub_folder: &str,
    ) -> String {
        let relative =
            snapshot_relative_path(&self.spider_name, &self.group_path, sub_folder, filename);
        let saved = self.manager.storage().save(content, &relative);
        if !saved.is_empty() {
            self.file_path = Some(saved.clone());
        }
        saved
    }

    /// Record the HTTP status seen by the fetch, for the terminal call to persist.
    pub fn set_http_code(&mut self, http_code: i64) {
        self.http_code = Some(http_code);
    }

    /// Schedule the next run of this URL `interval` from now.
    pub fn set_next_run(&self, interval: Duration) -> Result<bool> {
        self.manager.set_next_run(&self.url, interval)
    }

    pub fn success(&mut self, state_msg: Option<&str>) -> Result<()> {
        self.finalize(CrawlStatus::Success, state_msg.unwrap_or("OK"))
    }

    pub fn skip(&mut self, state_msg: Option<&str>) -> Result<()> {
        self.finalize(CrawlStatus::Skipped, state_msg.unwrap_or("Skipped"))
    }

    /// Finish without recording anything. The URL stays RUNNING.
    pub fn ignore(&mut self) {
        self.finished = true;
    }

    pub fn fail_temp(&mut self, http_code: i64, state_msg: &str) -> Result<()> {
        if !self.finished {
            self.http_code = Some(http_code);
        }
        self.finalize(CrawlStatus::TempFail, state_msg)
    }

    pub fn fail_perm(&mut self, http_code: i64, state_msg: &str) -> Result<()> {
        if !self.finished {
            self.http_code = Some(http_code);
        }
        self.finalize(CrawlStatus::PermFail, state_msg)
    }

    /// Record an error raised by the caller's work as PERM_FAIL (HTTP 500).
    pub fn fail_error(&mut self, error: &dyn Display) -> Result<()> {
        self.fail_perm(500, &format!("Exception: {}", error))
    }

    fn finalize(&mut self, status: CrawlStatus, state_msg: &str) -> Result<()> {
        if self.finished {
            return Ok(());
        }

        let duration = (self.started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0;
        self.manager.handle_task_finish(&TaskOutcome {
            log_id: Some(self.log_id),
            url: self.url.clone(),
            spider_name: self.spider_name.clone(),
            group_path: self.group_path.clone(),
            status,
            duration,
            http_code: self.http_code,
            state_msg: Some(state_msg.to_string()),
            file_path: self.file_path.clone(),
        })?;

        // Only a recorded outcome closes the session; Drop retries otherwise
        self.finished = true;
        Ok(())
    }
}

impl Drop for CrawlSession<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let result = if std::thread::panicking() {
            self.fail_perm(500, "Exception: worker panicked")
        } else {
            self.fail_temp(0, "Exited without explicit status")
        };

        if let Err(e) = result {
            tracing::error!(url = %self.url, error = %e, "Failed to record session outcome");
        }
    }
}

impl std::fmt::Debug for CrawlSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlSession")
            .field("url", &self.url)
            .field("group_path", &self.group_path)
            .field("log_id", &self.log_id)
            .field("finished", &self.finished)
            .finish()
    }
}
