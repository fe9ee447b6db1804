// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for token timestamps.

use chrono::{DateTime, Utc};

/// Convert a JWT `exp`/`iat` claim (Unix seconds) to a UTC timestamp.
///
/// Out-of-range values clamp to "now", which makes the result safe to use as
/// a blacklist expiry floor.
pub fn from_unix_seconds(secs: usize) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .unwrap_or_else(Utc::now)
}

/// Current time as JWT-style Unix seconds.
pub fn unix_now() -> usize {
    Utc::now().timestamp().max(0) as usize
}
