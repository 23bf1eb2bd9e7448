//! Shared helper functions for CLI commands.

use console::style;

use crate::models::{ControlSignal, CrawlStatus};

/// Status name colored by outcome.
pub fn styled_status(status: CrawlStatus) -> String {
    let name = status.as_str();
    match status {
        CrawlStatus::Success => style(name).green().to_string(),
        CrawlStatus::Running => style(name).cyan().to_string(),
        CrawlStatus::TempFail => style(name).yellow().to_string(),
        CrawlStatus::PermFail => style(name).red().to_string(),
        CrawlStatus::Pending | CrawlStatus::Skipped | CrawlStatus::Stopped => {
            style(name).dim().to_string()
        }
    }
}

pub fn styled_signal(signal: ControlSignal) -> String {
    match signal {
        ControlSignal::Normal => style(signal.as_str()).green().to_string(),
        ControlSignal::Pause => style(signal.as_str()).yellow().bold().to_string(),
        ControlSignal::Immediate => style(signal.as_str()).cyan().bold().to_string(),
    }
}

/// Shorten `s` to at most `max` characters, marking the cut with "...".
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    format!("{}...", s.chars().take(keep).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("https://example.com/long/path", 12), "https://e...");
        assert_eq!(truncate("abc", 2), "...");
    }
}
