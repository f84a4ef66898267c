//! Calendar helpers anchored to the host's local timezone.

use chrono::{DateTime, Local, TimeZone, Utc};

/// The first instant of the next local calendar day after `now`.
///
/// An ambiguous local midnight resolves to its earlier instant. A midnight
/// skipped by a DST change falls back to `now + 24h`.
pub fn next_local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_today = now.with_timezone(&Local).date_naive();
    local_today
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| now + chrono::Duration::hours(24))
}

/// Time from `now` until the next local midnight, never negative.
pub fn until_next_local_midnight(now: DateTime<Utc>) -> std::time::Duration {
    (next_local_midnight(now) - now).to_std().unwrap_or_default()
}
