use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// Parse an RFC 3339 timestamp as returned by the Vault API
pub fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .context("Failed to parse timestamp")
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format an optional timestamp for tabular output; empty when absent
pub fn format_optional(dt: Option<&DateTime<Utc>>) -> String {
    dt.map(DateTime::to_rfc3339).unwrap_or_default()
}

/// Human-readable duration, used for the scan summary
pub fn duration_human(elapsed: std::time::Duration) -> String {
    let seconds = elapsed.as_secs();

    if seconds < 60 {
        format!("{:.1} seconds", elapsed.as_secs_f64())
    } else if seconds < 3600 {
        format!("{} minutes", seconds / 60)
    } else {
        format!("{:.1} hours", seconds as f64 / 3600.0)
    }
}
