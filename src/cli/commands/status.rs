//! Dashboard command.

use chrono::Utc;
use console::style;

use crate::client::GovernanceClient;
use crate::config::Settings;
use crate::governance::GovernanceManager;
use crate::models::{GlobalStats, GroupSummary};
use crate::utils::format_relative;

use super::super::helpers::{styled_status, truncate};

/// Print per-group counts and fleet-wide stats.
pub async fn cmd_status(
    settings: &Settings,
    remote: Option<&str>,
    spider: Option<&str>,
) -> anyhow::Result<()> {
    let (groups, stats) = match remote {
        Some(base_url) => {
            let client = GovernanceClient::new(base_url)?;
            (client.dashboard(spider).await?, client.global_stats().await?)
        }
        None => {
            let governor = GovernanceManager::from_settings(settings)?;
            (governor.dashboard_summary(spider)?, governor.global_stats()?)
        }
    };

    print_stats(&stats);

    if groups.is_empty() {
        println!("\n{} No groups registered", style("!").yellow());
        return Ok(());
    }

    println!();
    println!(
        "{:<36} {:>6} {:>6} {:>6} {:>6} {:>6}  {}",
        style("GROUP").bold(),
        "TOTAL",
        "OK",
        "RUN",
        "FAIL",
        "PEND",
        "ANCHOR"
    );
    for group in &groups {
        print_group(group);
    }

    Ok(())
}

fn print_stats(stats: &GlobalStats) {
    println!("{}", style("Crawl Governance").bold());
    println!("{}", "-".repeat(40));
    println!("  Active spiders:  {}", stats.active_spiders);
    println!(
        "  Success rate:    {:.1}% of last {} attempts",
        stats.success_rate, stats.total_requests
    );
    println!("  Network errors:  {} today", stats.network_errors);
}

fn print_group(group: &GroupSummary) {
    let now = Utc::now();
    let anchor = match &group.anchor_status {
        Some(anchor) => format!(
            "{} last {} next {}",
            styled_status(anchor.status),
            format_relative(anchor.last_run_at, now),
            format_relative(anchor.next_run_at, now)
        ),
        None => style("-").dim().to_string(),
    };

    let label = match &group.name {
        Some(name) if !name.is_empty() => format!("{} ({})", group.group_path, name),
        _ => group.group_path.clone(),
    };

    println!(
        "{:<36} {:>6} {:>6} {:>6} {:>6} {:>6}  {}",
        truncate(&label, 36),
        group.stats.total,
        group.stats.success,
        group.stats.running,
        group.stats.failed,
        group.stats.pending,
        anchor
    );
}
