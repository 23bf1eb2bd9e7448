//! crawlgov - crawl governance engine.
//!
//! A durable decision/record engine that crawl workers consult before and
//! after each unit of work:
//! - should this URL be crawled now (dedup, retry budget, recurring schedules)
//! - scoped crawl sessions that always leave exactly one terminal record
//! - pause / resume / trigger-immediate control over every wait loop
//! - per-group dashboard aggregation
//!
//! Same-process workers use [`GovernanceManager`] and [`CrawlSession`]
//! directly; out-of-process workers go through the HTTP service in
//! [`server`] with [`client::GovernanceClient`].

pub mod cli;
pub mod client;
pub mod config;
pub mod governance;
pub mod models;
pub mod repository;
pub mod server;
pub mod storage;
pub mod utils;

pub use governance::{CrawlSession, GovernanceManager, StopFlag, TaskOutcome, WaitOutcome};
pub use models::{ControlSignal, CrawlStatus};
pub use utils::group_path::{normalize_group_path, spider_name_of, GroupPathInput};
