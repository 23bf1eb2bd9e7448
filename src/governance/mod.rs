//! Governance manager: the façade crawl workers talk to.
//!
//! Owns the repository, the snapshot sink and the cached control signal.
//! Share it between threads as `Arc<GovernanceManager>`; every method takes
//! `&self`.

mod decision;
mod session;
mod signal;

pub use crate::models::TaskOutcome;
pub use decision::decide;
pub use session::CrawlSession;
pub use signal::{StopFlag, WaitConfig, WaitOutcome};

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::{Settings, DEFAULT_MAX_RETRIES};
use crate::models::{
    ControlSignal, CrawlStatus, GlobalStats, GroupSummary, LogEntry, ResultReport,
};
use crate::repository::crawl::GLOBAL_SIGNAL_KEY;
use crate::repository::{CrawlRepository, RepositoryError, Result};
use crate::storage::StorageSink;
use crate::utils::group_path::{spider_name_of, GroupPathInput};

pub struct GovernanceManager {
    repo: CrawlRepository,
    storage: StorageSink,
    /// In-process mirror of the persisted global signal.
    signal: Mutex<ControlSignal>,
    wait: WaitConfig,
    max_retries: u32,
}

impl GovernanceManager {
    /// Open the governance database and load the persisted control signal.
    pub fn open(db_path: &Path, files_dir: impl Into<PathBuf>) -> Result<Self> {
        let repo = CrawlRepository::new(db_path)?;
        let signal = repo.get_signal(GLOBAL_SIGNAL_KEY)?;
        tracing::debug!("Governance database ready: {} (signal {})", db_path.display(), signal);

        Ok(Self {
            repo,
            storage: StorageSink::new(files_dir),
            signal: Mutex::new(signal),
            wait: WaitConfig::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(
            Self::open(&settings.database_path(), settings.files_dir.clone())?
                .with_wait_config(settings.wait_config())
                .with_max_retries(settings.max_retries),
        )
    }

    pub fn with_wait_config(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn repository(&self) -> &CrawlRepository {
        &self.repo
    }

    pub fn storage(&self) -> &StorageSink {
        &self.storage
    }

    /// Retry budget used when callers do not pass one.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    // --- Groups ---

    /// Register a group and its seed URL. Returns the normalized group path.
    ///
    /// Re-registering updates the seed URL and name but never resets the
    /// seed URL's existing state.
    pub fn register_group_metadata(
        &self,
        group_path: impl Into<GroupPathInput>,
        list_url: Option<&str>,
        friendly_name: Option<&str>,
    ) -> Result<String> {
        let group_path = group_path.into().normalize();
        self.repo.upsert_group(&group_path, list_url, friendly_name)?;
        tracing::debug!("Registered group {}", group_path);
        Ok(group_path)
    }

    // --- Decision and sessions ---

    /// Whether `url` should be fetched now.
    ///
    /// Best effort only: two workers that both see `true` and then call
    /// [`transaction`](Self::transaction) will both crawl. Use
    /// [`claim`](Self::claim) when that matters.
    pub fn should_crawl(&self, url: &str, max_retries: u32) -> Result<bool> {
        let check = self.repo.get_crawl_check(url)?;
        Ok(decide(check.as_ref(), Utc::now(), max_retries))
    }

    /// Start a crawl attempt unconditionally.
    pub fn transaction(
        &self,
        url: &str,
        group_path: impl Into<GroupPathInput>,
    ) -> Result<CrawlSession<'_>> {
        let group_path = group_path.into().normalize();
        let spider_name = spider_name_of(&group_path).to_string();
        let log_id = self.handle_task_start(url, &spider_name, &group_path)?;
        Ok(CrawlSession::new(self, url, group_path, spider_name, log_id))
    }

    /// Decide and start in one step. `None` means another worker holds the
    /// URL or it is not due.
    pub fn claim(
        &self,
        url: &str,
        group_path: impl Into<GroupPathInput>,
        max_retries: u32,
    ) -> Result<Option<CrawlSession<'_>>> {
        let group_path = group_path.into().normalize();
        let spider_name = spider_name_of(&group_path).to_string();

        let claimed = self.repo.try_claim(url, &spider_name, &group_path, |check| {
            decide(check, Utc::now(), max_retries)
        })?;

        Ok(claimed.map(|log_id| CrawlSession::new(self, url, group_path, spider_name, log_id)))
    }

    /// Run `work` inside a session.
    ///
    /// An `Err` from `work` is recorded as PERM_FAIL before being returned.
    /// Returning `Ok` without a terminal call records TEMP_FAIL.
    pub fn run_session<T, F>(
        &self,
        url: &str,
        group_path: impl Into<GroupPathInput>,
        work: F,
    ) -> anyhow::Result<T>
    where
        F: FnOnce(&mut CrawlSession<'_>) -> anyhow::Result<T>,
    {
        let mut session = self.transaction(url, group_path)?;
        match work(&mut session) {
            Ok(value) => Ok(value),
            Err(e) => {
                session.fail_error(&e)?;
                Err(e)
            }
        }
    }

    /// Start hook: open a RUNNING history row and mark the URL RUNNING.
    pub fn handle_task_start(&self, url: &str, spider_name: &str, group_path: &str) -> Result<i64> {
        let log_id = self.repo.record_start(url, spider_name, group_path)?;
        tracing::debug!("Started {} [{}] (log {})", url, group_path, log_id);
        Ok(log_id)
    }

    /// Finish hook: close the history row and update the URL state.
    pub fn handle_task_finish(&self, outcome: &TaskOutcome) -> Result<()> {
        self.repo.record_finish(outcome)?;

        let msg = outcome.state_msg.as_deref().unwrap_or("");
        match outcome.status {
            CrawlStatus::Success => {
                tracing::info!("[{}] {} ({:.3}s)", outcome.status, outcome.url, outcome.duration)
            }
            status if status.is_failure() => tracing::warn!(
                "[{}] {} http={:?} {}",
                status,
                outcome.url,
                outcome.http_code,
                msg
            ),
            status => tracing::debug!("[{}] {} {}", status, outcome.url, msg),
        }
        Ok(())
    }

    /// Record an outcome from a worker that never held a session.
    pub fn report_result(&self, report: ResultReport) -> Result<()> {
        let group_path = report.group_path.normalize();
        let spider_name = report
            .spider
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| spider_name_of(&group_path).to_string());

        self.handle_task_finish(&TaskOutcome {
            log_id: None,
            url: report.url,
            spider_name,
            group_path,
            status: report.status,
            duration: report.duration,
            http_code: Some(report.http_code),
            state_msg: report.state_msg,
            file_path: report.file_path,
        })
    }

    /// Schedule `url` to be due again `interval` from now.
    ///
    /// A zero interval is ignored. Returns whether a row was updated.
    pub fn set_next_run(&self, url: &str, interval: Duration) -> Result<bool> {
        if interval.is_zero() {
            return Ok(false);
        }
        let interval = chrono::Duration::from_std(interval)
            .map_err(|e| RepositoryError::InvalidData(format!("interval out of range: {}", e)))?;
        self.repo.set_next_run(url, Utc::now() + interval)
    }

    // --- Flow control ---

    fn signal_guard(&self) -> MutexGuard<'_, ControlSignal> {
        self.signal.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_signal(&self, signal: ControlSignal) -> Result<()> {
        let mut current = self.signal_guard();
        self.repo.set_signal(GLOBAL_SIGNAL_KEY, signal)?;
        *current = signal;
        tracing::info!("Control signal set to {}", signal);
        Ok(())
    }

    pub fn current_signal(&self) -> ControlSignal {
        *self.signal_guard()
    }

    /// Suspend every wait loop until [`resume`](Self::resume).
    pub fn pause(&self) -> Result<()> {
        self.set_signal(ControlSignal::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.set_signal(ControlSignal::Normal)
    }

    /// Cut one pending or future wait short.
    pub fn trigger_immediate(&self) -> Result<()> {
        self.set_signal(ControlSignal::Immediate)
    }

    /// Swap IMMEDIATE back to NORMAL. Only one caller ever sees `true`.
    fn consume_immediate(&self) -> bool {
        let mut current = self.signal_guard();
        if *current != ControlSignal::Immediate {
            return false;
        }
        *current = ControlSignal::Normal;
        if let Err(e) = self.repo.set_signal(GLOBAL_SIGNAL_KEY, ControlSignal::Normal) {
            tracing::error!("Failed to persist consumed IMMEDIATE signal: {}", e);
        }
        true
    }

    /// Block the calling thread for `interval`, honoring control signals.
    ///
    /// The stop flag wins over everything. While PAUSE is set the wait does
    /// not end, even past its deadline. IMMEDIATE ends it early and is
    /// consumed by exactly one waiter. A zero interval returns at once and
    /// leaves the signal untouched.
    pub fn wait_interval(&self, interval: Duration, stop: &StopFlag) -> WaitOutcome {
        if interval.is_zero() {
            return WaitOutcome::Elapsed;
        }

        let deadline = Instant::now() + interval;

        loop {
            if stop.is_stopped() {
                return WaitOutcome::Stopped;
            }

            match self.current_signal() {
                ControlSignal::Pause => {
                    std::thread::sleep(self.wait.pause_poll);
                    continue;
                }
                ControlSignal::Immediate => {
                    if self.consume_immediate() {
                        tracing::info!("Immediate execution triggered");
                        return WaitOutcome::Immediate;
                    }
                    continue;
                }
                ControlSignal::Normal => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::Elapsed;
            }
            std::thread::sleep(self.wait.slice.min(deadline - now));
        }
    }

    // --- Dashboard ---

    /// Per-group counts and anchor rows, for groups whose path starts with
    /// `spider_filter`.
    pub fn dashboard_summary(&self, spider_filter: Option<&str>) -> Result<Vec<GroupSummary>> {
        let groups = match spider_filter.filter(|f| !f.is_empty()) {
            Some(prefix) => self.repo.list_groups_with_prefix(prefix)?,
            None => self.repo.list_groups()?,
        };

        groups
            .into_iter()
            .map(|group| {
                let stats = self.repo.get_group_stats(&group.group_path)?;
                let anchor_status = match group.seed_url.as_deref() {
                    Some(url) => self.repo.get_anchor_status(url)?,
                    None => None,
                };
                Ok(GroupSummary {
                    group_path: group.group_path,
                    name: group.display_name,
                    stats,
                    anchor_status,
                })
            })
            .collect()
    }

    pub fn recent_logs(&self, limit: usize, status: Option<CrawlStatus>) -> Result<Vec<LogEntry>> {
        self.repo.get_recent_logs(limit, status)
    }

    pub fn global_stats(&self) -> Result<GlobalStats> {
        self.repo.get_global_stats()
    }

    /// Snapshot path recorded for the URL with this hash, if any.
    pub fn snapshot_for_hash(&self, url_hash: &str) -> Result<Option<PathBuf>> {
        Ok(self
            .repo
            .get_url_state_by_hash(url_hash)?
            .and_then(|state| state.file_path)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager() -> (GovernanceManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let manager =
            GovernanceManager::open(&dir.path().join("governance.db"), dir.path().join("files"))
                .unwrap()
                .with_wait_config(WaitConfig {
                    slice: Duration::from_millis(5),
                    pause_poll: Duration::from_millis(5),
                });
        (manager, dir)
    }

    #[test]
    fn test_session_success_is_recorded_once() {
        let (manager, _dir) = manager();
        let url = "https://news.example/a";

        let mut session = manager.transaction(url, "news/world").unwrap();
        assert_eq!(session.spider_name(), "news");
        session.set_http_code(200);
        session.success(None).unwrap();
        session.fail_perm(500, "late").unwrap();
        drop(session);

        let state = manager.repository().get_url_state(url).unwrap().unwrap();
        assert_eq!(state.status, CrawlStatus::Success);
        assert_eq!(state.http_code, Some(200));
        assert_eq!(state.state_msg.as_deref(), Some("OK"));
        assert_eq!(manager.recent_logs(10, None).unwrap().len(), 1);
    }

    #[test]
    fn test_ignore_leaves_url_running() {
        let (manager, _dir) = manager();
        let url = "https://news.example/ignored";

        let mut session = manager.transaction(url, "news").unwrap();
        session.ignore();
        drop(session);

        let state = manager.repository().get_url_state(url).unwrap().unwrap();
        assert_eq!(state.status, CrawlStatus::Running);
    }

    #[test]
    fn test_save_file_records_path() {
        let (manager, dir) = manager();
        let url = "https://news.example/page";

        let mut session = manager.transaction(url, ["news", "world"].map(String::from).to_vec()).unwrap();
        let saved = session.save_file("<p>hi</p>", "page.html", "raw");
        assert!(saved.ends_with("news/news/world/raw/page.html"));
        session.success(Some("saved")).unwrap();
        drop(session);

        let snapshot = manager
            .snapshot_for_hash(&crate::models::UrlState::compute_hash(url))
            .unwrap()
            .unwrap();
        assert!(snapshot.starts_with(dir.path()));
        assert_eq!(std::fs::read_to_string(snapshot).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn test_report_result_defaults_spider_from_group() {
        let (manager, _dir) = manager();
        manager
            .report_result(ResultReport {
                url: "https://remote.example/x".to_string(),
                spider: None,
                group_path: GroupPathInput::from("remote//feeds"),
                status: CrawlStatus::PermFail,
                http_code: 404,
                duration: 0.2,
                state_msg: Some("gone".to_string()),
                file_path: None,
            })
            .unwrap();

        let state = manager
            .repository()
            .get_url_state("https://remote.example/x")
            .unwrap()
            .unwrap();
        assert_eq!(state.spider_name, "remote");
        assert_eq!(state.group_path, "remote/feeds");
        assert_eq!(state.http_code, Some(404));
    }

    #[test]
    fn test_set_next_run_zero_is_ignored() {
        let (manager, _dir) = manager();
        let url = "https://news.example/feed";
        manager.transaction(url, "news").unwrap().success(None).unwrap();

        assert!(!manager.set_next_run(url, Duration::ZERO).unwrap());
        assert!(manager.set_next_run(url, Duration::from_secs(60)).unwrap());
        assert!(!manager.should_crawl(url, 3).unwrap());
    }

    #[test]
    fn test_signal_survives_restart() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("governance.db");

        let manager = GovernanceManager::open(&db, dir.path()).unwrap();
        manager.pause().unwrap();
        drop(manager);

        let manager = GovernanceManager::open(&db, dir.path()).unwrap();
        assert_eq!(manager.current_signal(), ControlSignal::Pause);
    }

    #[test]
    fn test_stop_flag_wins_over_pause() {
        let (manager, _dir) = manager();
        manager.pause().unwrap();
        let stop = StopFlag::new();
        stop.stop();
        assert_eq!(
            manager.wait_interval(Duration::from_secs(60), &stop),
            WaitOutcome::Stopped
        );
        assert_eq!(manager.current_signal(), ControlSignal::Pause);
    }

    #[test]
    fn test_wait_elapses_normally() {
        let (manager, _dir) = manager();
        let started = Instant::now();
        let outcome = manager.wait_interval(Duration::from_millis(30), &StopFlag::new());
        assert_eq!(outcome, WaitOutcome::Elapsed);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_dashboard_attaches_anchor() {
        let (manager, _dir) = manager();
        let seed = "https://news.example/world";
        manager
            .register_group_metadata("news/world", Some(seed), Some("World"))
            .unwrap();
        manager.register_group_metadata("blog", None, None).unwrap();

        let summary = manager.dashboard_summary(Some("news")).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].name.as_deref(), Some("World"));
        assert_eq!(summary[0].stats.pending, 1);
        let anchor = summary[0].anchor_status.as_ref().unwrap();
        assert_eq!(anchor.url, seed);
        assert_eq!(anchor.status, CrawlStatus::Pending);

        assert_eq!(manager.dashboard_summary(None).unwrap().len(), 2);
    }
}
