//! HTTP request handlers.

mod api;
mod control;
mod helpers;
mod rpc;
mod snapshot;

pub use api::{dashboard, health, logs, stats};
pub use control::{get_control, immediate, pause, resume};
pub use helpers::ApiError;
pub use rpc::{register_group, report_result, should_crawl, RegisterGroupRequest, ShouldCrawlRequest};
pub use snapshot::get_snapshot;
