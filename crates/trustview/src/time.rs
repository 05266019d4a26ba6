//! Time utilities for trustview.
//!
//! All timestamps are Unix epoch microseconds (u64). Configured durations
//! are milliseconds and converted with [`millis_to_micros`].

/// Return the current time as microseconds since Unix epoch.
///
/// A clock set before the epoch reads as 0.
pub fn now_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Convert a millisecond duration to microseconds, saturating.
pub fn millis_to_micros(millis: u64) -> u64 {
    millis.saturating_mul(1_000)
}

/// Convert microseconds to an RFC 3339 string.
pub fn micros_to_rfc3339(micros: u64) -> String {
    let secs = (micros / 1_000_000) as i64;
    let nsecs = ((micros % 1_000_000) * 1000) as u32;
    let dt = chrono::DateTime::from_timestamp(secs, nsecs).unwrap_or(chrono::DateTime::UNIX_EPOCH);
    dt.to_rfc3339()
}
