// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for unix timestamps.

use chrono::{DateTime, Utc};

/// Current time as unix seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Current time as unix milliseconds.
pub fn unix_now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert unix seconds to a UTC timestamp, clamping out-of-range values to the epoch.
pub fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
