//! Time utilities for retained-secret expiry.
//!
//! Valid-thru timestamps are Unix epoch seconds (i64), matching the
//! 64-bit `time_t` stored in each record.

/// Return the current time as seconds since Unix epoch.
///
/// A clock set before the epoch reads as `0`.
pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
