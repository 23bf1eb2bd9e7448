//! Human-readable formatting for CLI output.

use chrono::{DateTime, Utc};

/// Format a duration in seconds (e.g. "850ms", "12.3s", "4m 05s").
pub fn format_seconds(secs: f64) -> String {
    if !secs.is_finite() || secs < 0.0 {
        return "-".to_string();
    }
    if secs < 1.0 {
        format!("{}ms", (secs * 1000.0).round() as u64)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let total = secs.round() as u64;
        format!("{}m {:02}s", total / 60, total % 60)
    }
}

/// Format an optional timestamp relative to `now` ("3m ago", "in 2h").
pub fn format_relative(ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(ts) = ts else {
        return "-".to_string();
    };
    let delta = now.signed_duration_since(ts).num_seconds();
    let (abs, past) = if delta >= 0 { (delta, true) } else { (-delta, false) };

    let span = if abs < 60 {
        format!("{}s", abs)
    } else if abs < 3600 {
        format!("{}m", abs / 60)
    } else if abs < 86_400 {
        format!("{}h", abs / 3600)
    } else {
        format!("{}d", abs / 86_400)
    };

    if past {
        format!("{} ago", span)
    } else {
        format!("in {}", span)
    }
}
