//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDateTime};

/// Current local time
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// ISO-8601 timestamp stored on speech and question records
pub fn record_timestamp() -> String {
    now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Wall-clock stamp shown on history entries
pub fn clock_stamp() -> String {
    now().format("%H:%M:%S").to_string()
}

/// Parse a record timestamp written by [`record_timestamp`]
///
/// Returns `None` for empty or foreign strings; callers treat those records as
/// undated rather than rejecting them.
pub fn parse_record_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Render whole seconds as `M:SS`
pub fn format_minutes_seconds(total_secs: u64) -> String {
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

/// Render whole seconds as zero-padded `MM:SS`
pub fn format_clock(total_secs: u64) -> String {
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
