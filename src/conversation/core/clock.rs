//! Wall-clock timestamps that never run backwards within the process.
//!
//! Message and version timestamps are only used for ordering, so a clock
//! adjustment must not produce a version that appears older than its
//! predecessor.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

static LAST_MILLIS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Current UTC time, clamped to be >= every value previously returned.
#[must_use]
pub fn now() -> DateTime<Utc> {
    let wall = Utc::now().timestamp_millis();
    let previous = LAST_MILLIS.fetch_max(wall, Ordering::AcqRel);
    let millis = previous.max(wall);
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}
