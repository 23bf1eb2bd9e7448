//! Recent attempts command.

use console::style;

use crate::client::GovernanceClient;
use crate::config::Settings;
use crate::governance::GovernanceManager;
use crate::models::CrawlStatus;
use crate::utils::format_seconds;

use super::super::helpers::{styled_status, truncate};

pub async fn cmd_logs(
    settings: &Settings,
    remote: Option<&str>,
    limit: usize,
    status: Option<&str>,
) -> anyhow::Result<()> {
    let status = match status {
        Some(raw) => Some(parse_status(raw)?),
        None => None,
    };

    let logs = match remote {
        Some(base_url) => GovernanceClient::new(base_url)?.recent_logs(limit, status).await?,
        None => GovernanceManager::from_settings(settings)?.recent_logs(limit, status)?,
    };

    if logs.is_empty() {
        println!("{} No crawl attempts recorded", style("!").yellow());
        return Ok(());
    }

    for entry in logs {
        let http = entry
            .http_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let duration = entry
            .duration
            .map(format_seconds)
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{}  {:<20} {:>4} {:>8}  {}  {}",
            style(entry.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
            styled_status(entry.status),
            http,
            duration,
            style(truncate(&entry.group_path, 24)).cyan(),
            entry.url
        );
    }

    Ok(())
}

fn parse_status(raw: &str) -> anyhow::Result<CrawlStatus> {
    let parsed = match raw.trim().parse::<i64>() {
        Ok(code) => CrawlStatus::from_code(code),
        Err(_) => CrawlStatus::from_str(raw),
    };
    parsed.ok_or_else(|| anyhow::anyhow!("Unknown status: {}", raw))
}
