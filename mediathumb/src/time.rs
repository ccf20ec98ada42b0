//! Time-related utility functions.
//!
//! Timestamps stored in metadata are milliseconds since the Unix epoch.

use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Elapsed time since `system_time`, or zero for times in the future.
///
/// # Example
///
/// ```
/// use std::time::{Duration, SystemTime};
/// use mediathumb::time::age_of;
///
/// let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
/// assert!(age_of(an_hour_ago) >= Duration::from_secs(3599));
/// ```
pub fn age_of(system_time: SystemTime) -> Duration {
    SystemTime::now()
        .duration_since(system_time)
        .unwrap_or(Duration::ZERO)
}

/// Render a millisecond timestamp for humans, e.g. in CLI output.
pub fn format_millis(millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{}ms", millis),
    }
}
