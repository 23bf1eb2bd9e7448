//! Data models for crawlgov.

mod crawl;
mod dashboard;
mod status;

pub use crawl::{GroupRecord, LogEntry, ResultReport, TaskOutcome, UrlState};
pub use dashboard::{AnchorStatus, GlobalStats, GroupStats, GroupSummary};
pub use status::{ControlSignal, CrawlStatus};
