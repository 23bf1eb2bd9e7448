//! End-to-end behavior of the governance manager.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use rusqlite::params;
use tempfile::TempDir;

use crawlgov::governance::WaitConfig;
use crawlgov::models::{GroupStats, TaskOutcome};
use crawlgov::{ControlSignal, CrawlStatus, GovernanceManager, StopFlag, WaitOutcome};

const SLICE: Duration = Duration::from_millis(10);
const PAUSE_POLL: Duration = Duration::from_millis(20);

fn manager() -> (Arc<GovernanceManager>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let manager = GovernanceManager::open(&dir.path().join("governance.db"), dir.path().join("files"))
        .unwrap()
        .with_wait_config(WaitConfig {
            slice: SLICE,
            pause_poll: PAUSE_POLL,
        });
    (Arc::new(manager), dir)
}

fn log_status(gov: &GovernanceManager, log_id: i64) -> CrawlStatus {
    gov.repository()
        .get_log_entry(log_id)
        .unwrap()
        .expect("log row exists")
        .status
}

#[test]
fn running_url_is_not_crawlable_by_anyone() {
    let (gov, _dir) = manager();
    let url = "https://news.example/busy";

    let mut session = gov.transaction(url, "news").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let gov = gov.clone();
            thread::spawn(move || gov.should_crawl(url, 3).unwrap())
        })
        .collect();
    for handle in handles {
        assert!(!handle.join().unwrap());
    }

    session.fail_temp(503, "busy").unwrap();
    drop(session);
    assert!(gov.should_crawl(url, 3).unwrap());
}

#[test]
fn concurrent_claims_have_one_winner() {
    let (gov, _dir) = manager();
    let url = "https://news.example/contended";
    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let gov = gov.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                match gov.claim(url, "news", 3).unwrap() {
                    Some(mut session) => {
                        // Hold the URL long enough for the others to try
                        thread::sleep(Duration::from_millis(50));
                        session.success(None).unwrap();
                        1
                    }
                    None => 0,
                }
            })
        })
        .collect();

    let winners: i32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(winners, 1);
    assert_eq!(gov.recent_logs(100, None).unwrap().len(), 1);
}

#[test]
fn retry_budget_is_respected() {
    let (gov, _dir) = manager();
    let url = "https://news.example/flaky";
    let max_retries = 4;

    for attempt in 0..max_retries {
        assert!(gov.should_crawl(url, max_retries).unwrap(), "attempt {attempt}");
        gov.transaction(url, "news")
            .unwrap()
            .fail_temp(502, "bad gateway")
            .unwrap();
    }

    assert!(!gov.should_crawl(url, max_retries).unwrap());
    let state = gov.repository().get_url_state(url).unwrap().unwrap();
    assert_eq!(state.retry_count, max_retries);
    // History is not rewritten when the budget runs out
    assert_eq!(state.status, CrawlStatus::TempFail);
}

#[test]
fn terminal_states_are_sticky() {
    let (gov, _dir) = manager();

    let finish: [(&str, fn(&mut crawlgov::CrawlSession<'_>)); 3] = [
        ("https://t.example/success", |s| s.success(None).unwrap()),
        ("https://t.example/perm", |s| s.fail_perm(404, "gone").unwrap()),
        ("https://t.example/skip", |s| s.skip(None).unwrap()),
    ];

    for (url, terminal) in finish {
        let mut session = gov.transaction(url, "t").unwrap();
        terminal(&mut session);
        assert!(session.is_finished());
    }

    // STOPPED has no session method; a worker reports it without a session
    let stopped = "https://t.example/stopped";
    gov.handle_task_finish(&TaskOutcome {
        log_id: None,
        url: stopped.to_string(),
        spider_name: "t".to_string(),
        group_path: "t".to_string(),
        status: CrawlStatus::Stopped,
        duration: 0.0,
        http_code: None,
        state_msg: Some("stopped".to_string()),
        file_path: None,
    })
    .unwrap();

    let running = gov.recent_logs(100, Some(CrawlStatus::Running)).unwrap();
    assert!(running.is_empty());

    let urls = finish.iter().map(|(url, _)| *url).chain([stopped]);
    for url in urls {
        for _ in 0..3 {
            assert!(!gov.should_crawl(url, 100).unwrap(), "{url}");
        }
    }
}

#[test]
fn recurring_schedule_overrides_terminal_status() {
    let (gov, _dir) = manager();
    let url = "https://feeds.example/rss";

    gov.transaction(url, "feeds")
        .unwrap()
        .fail_perm(500, "parser exploded")
        .unwrap();
    assert!(!gov.should_crawl(url, 3).unwrap());

    gov.repository()
        .execute(
            "UPDATE crawl_status SET next_run_at = ?1 WHERE url = ?2",
            params![(Utc::now() - chrono::Duration::minutes(1)).to_rfc3339(), url],
        )
        .unwrap();
    assert!(gov.should_crawl(url, 3).unwrap());

    let mut session = gov.transaction(url, "feeds").unwrap();
    assert!(session.set_next_run(Duration::from_secs(3600)).unwrap());
    session.success(None).unwrap();
    drop(session);
    assert!(!gov.should_crawl(url, 3).unwrap());
}

#[test]
fn session_success_finalizes_log_row() {
    let (gov, _dir) = manager();
    let mut session = gov.transaction("https://s.example/ok", "s").unwrap();
    let log_id = session.log_id();
    assert_eq!(log_status(&gov, log_id), CrawlStatus::Running);

    session.success(None).unwrap();
    drop(session);
    assert_eq!(log_status(&gov, log_id), CrawlStatus::Success);
}

#[test]
fn session_panic_records_perm_fail() {
    let (gov, _dir) = manager();
    let url = "https://s.example/panic";
    let mut log_id = 0;

    let result = catch_unwind(AssertUnwindSafe(|| {
        let session = gov.transaction(url, "s").unwrap();
        log_id = session.log_id();
        panic!("parser blew up");
    }));

    assert!(result.is_err());
    assert_eq!(log_status(&gov, log_id), CrawlStatus::PermFail);
    let state = gov.repository().get_url_state(url).unwrap().unwrap();
    assert_eq!(state.http_code, Some(500));
    assert!(state.state_msg.unwrap().starts_with("Exception:"));
}

#[test]
fn session_error_records_perm_fail() {
    let (gov, _dir) = manager();
    let url = "https://s.example/error";

    let result: anyhow::Result<()> = gov.run_session(url, "s", |_session| {
        anyhow::bail!("connection reset")
    });

    assert!(result.is_err());
    let state = gov.repository().get_url_state(url).unwrap().unwrap();
    assert_eq!(state.status, CrawlStatus::PermFail);
    assert_eq!(state.state_msg.as_deref(), Some("Exception: connection reset"));
}

#[test]
fn session_silent_exit_records_temp_fail() {
    let (gov, _dir) = manager();
    let url = "https://s.example/silent";

    let session = gov.transaction(url, "s").unwrap();
    let log_id = session.log_id();
    drop(session);

    assert_eq!(log_status(&gov, log_id), CrawlStatus::TempFail);
    let state = gov.repository().get_url_state(url).unwrap().unwrap();
    assert_eq!(state.state_msg.as_deref(), Some("Exited without explicit status"));
    assert_eq!(state.retry_count, 1);

    // run_session behaves the same when the closure forgets a terminal call
    let value = gov
        .run_session("https://s.example/silent-2", "s", |_| Ok(7))
        .unwrap();
    assert_eq!(value, 7);
    let state = gov
        .repository()
        .get_url_state("https://s.example/silent-2")
        .unwrap()
        .unwrap();
    assert_eq!(state.status, CrawlStatus::TempFail);
}

#[test]
fn failed_terminal_write_is_retried_on_drop() {
    let (gov, _dir) = manager();
    let url = "https://s.example/store-error";

    let mut session = gov.transaction(url, "s").unwrap();
    let log_id = session.log_id();

    gov.repository()
        .execute("ALTER TABLE crawl_log RENAME TO crawl_log_moved", [])
        .unwrap();
    assert!(session.success(None).is_err());
    assert!(!session.is_finished());

    gov.repository()
        .execute("ALTER TABLE crawl_log_moved RENAME TO crawl_log", [])
        .unwrap();
    drop(session);

    let state = gov.repository().get_url_state(url).unwrap().unwrap();
    assert_eq!(state.status, CrawlStatus::TempFail);
    assert_eq!(state.state_msg.as_deref(), Some("Exited without explicit status"));
    assert_eq!(log_status(&gov, log_id), CrawlStatus::TempFail);
    assert!(gov.should_crawl(url, 3).unwrap());
}

#[test]
fn zero_wait_leaves_signal_alone() {
    let (gov, _dir) = manager();
    let stop = StopFlag::new();

    gov.trigger_immediate().unwrap();
    assert_eq!(gov.wait_interval(Duration::ZERO, &stop), WaitOutcome::Elapsed);
    assert_eq!(gov.current_signal(), ControlSignal::Immediate);

    // Paused: returns at once instead of blocking until resume
    gov.pause().unwrap();
    let started = Instant::now();
    assert_eq!(gov.wait_interval(Duration::ZERO, &stop), WaitOutcome::Elapsed);
    assert!(started.elapsed() < PAUSE_POLL);
    assert_eq!(gov.current_signal(), ControlSignal::Pause);
}

#[test]
fn pause_truly_suspends() {
    let (gov, _dir) = manager();
    let interval = Duration::from_millis(300);

    let (tx, rx) = mpsc::channel();
    let waiter = {
        let gov = gov.clone();
        thread::spawn(move || {
            let outcome = gov.wait_interval(interval, &StopFlag::new());
            tx.send(outcome).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(30));
    gov.pause().unwrap();

    // Well past the original deadline, still waiting
    assert!(rx.recv_timeout(Duration::from_millis(600)).is_err());

    let resumed = Instant::now();
    gov.resume().unwrap();
    let outcome = rx
        .recv_timeout(PAUSE_POLL + SLICE + Duration::from_millis(200))
        .expect("wait ends shortly after resume");
    assert_eq!(outcome, WaitOutcome::Elapsed);
    assert!(resumed.elapsed() < PAUSE_POLL + Duration::from_millis(200));
    waiter.join().unwrap();
}

#[test]
fn stop_flag_ends_a_paused_wait() {
    let (gov, _dir) = manager();
    gov.pause().unwrap();
    let stop = StopFlag::new();

    let waiter = {
        let gov = gov.clone();
        let stop = stop.clone();
        thread::spawn(move || gov.wait_interval(Duration::from_secs(30), &stop))
    };

    thread::sleep(Duration::from_millis(50));
    stop.stop();
    assert_eq!(waiter.join().unwrap(), WaitOutcome::Stopped);
    assert_eq!(gov.current_signal(), ControlSignal::Pause);
}

#[test]
fn immediate_is_consumed_once() {
    let (gov, _dir) = manager();
    let interval = Duration::from_millis(200);
    let stop = StopFlag::new();

    gov.trigger_immediate().unwrap();

    let first = Instant::now();
    assert_eq!(gov.wait_interval(interval, &stop), WaitOutcome::Immediate);
    assert!(first.elapsed() < interval);
    assert_eq!(gov.current_signal(), ControlSignal::Normal);

    let second = Instant::now();
    assert_eq!(gov.wait_interval(interval, &stop), WaitOutcome::Elapsed);
    assert!(second.elapsed() >= interval);
}

#[test]
fn immediate_wakes_exactly_one_of_many_waiters() {
    let (gov, _dir) = manager();
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let gov = gov.clone();
            thread::spawn(move || gov.wait_interval(Duration::from_millis(400), &StopFlag::new()))
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    gov.trigger_immediate().unwrap();

    let outcomes: Vec<WaitOutcome> = waiters.into_iter().map(|w| w.join().unwrap()).collect();
    let immediate = outcomes
        .iter()
        .filter(|o| **o == WaitOutcome::Immediate)
        .count();
    assert_eq!(immediate, 1);
}

#[test]
fn dashboard_arithmetic() {
    let (gov, _dir) = manager();
    let group = "news/world";
    gov.register_group_metadata(group, Some("https://news.example/world/rss"), Some("World"))
        .unwrap();

    let outcomes = [
        CrawlStatus::Success,
        CrawlStatus::Success,
        CrawlStatus::Success,
        CrawlStatus::TempFail,
        CrawlStatus::TempFail,
    ];
    for (i, status) in outcomes.iter().enumerate() {
        gov.handle_task_finish(&TaskOutcome {
            log_id: None,
            url: format!("https://news.example/world/{i}"),
            spider_name: "news".to_string(),
            group_path: group.to_string(),
            status: *status,
            duration: 0.1,
            http_code: Some(200),
            state_msg: None,
            file_path: None,
        })
        .unwrap();
    }
    let mut running = gov
        .transaction("https://news.example/world/live", group)
        .unwrap();

    // The anchor row registered above is the one PENDING row
    let summary = gov.dashboard_summary(Some("news")).unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(
        summary[0].stats,
        GroupStats {
            total: 7,
            success: 3,
            running: 1,
            failed: 2,
            pending: 1,
        }
    );
    let anchor = summary[0].anchor_status.as_ref().unwrap();
    assert_eq!(anchor.status, CrawlStatus::Pending);

    running.ignore();
}

#[test]
fn reregistering_does_not_revive_terminal_seed() {
    let (gov, _dir) = manager();
    let seed = "https://news.example/rss";
    gov.register_group_metadata("news", Some(seed), None).unwrap();
    gov.transaction(seed, "news").unwrap().skip(None).unwrap();

    gov.register_group_metadata(vec!["news".to_string()], Some(seed), Some("News"))
        .unwrap();
    assert!(!gov.should_crawl(seed, 3).unwrap());
}
