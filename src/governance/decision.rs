//! The crawl decision.

use chrono::{DateTime, Utc};

use crate::models::CrawlStatus;
use crate::repository::CrawlCheck;

/// Decide whether a URL should be fetched now.
///
/// A schedule (`next_run_at`) outranks the status for everything except
/// RUNNING, which is how recurring sources come back after SUCCESS.
pub fn decide(check: Option<&CrawlCheck>, now: DateTime<Utc>, max_retries: u32) -> bool {
    let Some(check) = check else {
        return true;
    };

    if check.status == CrawlStatus::Running {
        return false;
    }

    if let Some(next_run_at) = check.next_run_at {
        return now >= next_run_at;
    }

    match check.status {
        CrawlStatus::Pending => true,
        CrawlStatus::TempFail => check.retry_count < max_retries,
        CrawlStatus::Success
        | CrawlStatus::PermFail
        | CrawlStatus::Skipped
        | CrawlStatus::Stopped
        | CrawlStatus::Running => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn check(status: CrawlStatus, retry_count: u32) -> CrawlCheck {
        CrawlCheck {
            status,
            retry_count,
            next_run_at: None,
        }
    }

    #[test]
    fn test_unknown_url_is_crawled() {
        assert!(decide(None, Utc::now(), 3));
    }

    #[test]
    fn test_running_is_never_crawled() {
        let mut running = check(CrawlStatus::Running, 0);
        running.next_run_at = Some(Utc::now() - Duration::hours(1));
        assert!(!decide(Some(&running), Utc::now(), 3));
    }

    #[test]
    fn test_one_shot_statuses() {
        let now = Utc::now();
        assert!(decide(Some(&check(CrawlStatus::Pending, 0)), now, 3));
        for status in [
            CrawlStatus::Success,
            CrawlStatus::PermFail,
            CrawlStatus::Skipped,
            CrawlStatus::Stopped,
        ] {
            assert!(!decide(Some(&check(status, 0)), now, 3), "{status}");
        }
    }

    #[test]
    fn test_temp_fail_respects_retry_budget() {
        let now = Utc::now();
        assert!(decide(Some(&check(CrawlStatus::TempFail, 2)), now, 3));
        assert!(!decide(Some(&check(CrawlStatus::TempFail, 3)), now, 3));
        assert!(!decide(Some(&check(CrawlStatus::TempFail, 0)), now, 0));
    }

    #[test]
    fn test_schedule_overrides_terminal_status() {
        let now = Utc::now();
        let mut done = check(CrawlStatus::Success, 0);

        done.next_run_at = Some(now + Duration::minutes(5));
        assert!(!decide(Some(&done), now, 3));

        done.next_run_at = Some(now);
        assert!(decide(Some(&done), now, 3));

        // Exhausted retries do not block a due schedule either
        let mut flaky = check(CrawlStatus::TempFail, 10);
        flaky.next_run_at = Some(now - Duration::seconds(1));
        assert!(decide(Some(&flaky), now, 3));
    }
}
