//! Wall-clock milliseconds. Every `Record` timestamp and sync lifecycle
//! event's `at` field comes from here, so there is exactly one place that
//! touches `SystemTime`.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. Falls back to `0` on a clock set
/// before 1970 rather than panicking — a record can still be written and
/// merged deterministically even with a nonsensical timestamp.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
