//! Data staleness rule for cached widget payloads.

use chrono::TimeDelta;

use crate::types::Timestamp;

/// Default age after which a cached widget payload is refetched.
pub const DEFAULT_STALE_AFTER_SECS: i64 = 5 * 60;

/// The default staleness threshold as a [`TimeDelta`].
pub fn default_stale_after() -> TimeDelta {
    TimeDelta::seconds(DEFAULT_STALE_AFTER_SECS)
}

/// Returns `true` if a payload last fetched at `last_updated` must be
/// refetched at `now`.
///
/// A payload that never loaded successfully is always stale. Otherwise it
/// is stale once strictly more than `threshold` has elapsed.
pub fn is_stale(last_updated: Option<Timestamp>, now: Timestamp, threshold: TimeDelta) -> bool {
    match last_updated {
        None => true,
        Some(at) => now - at > threshold,
    }
}
