//! Wall-clock helpers.
//!
//! Expiry instants are stored as absolute milliseconds since the Unix epoch,
//! the same unit the snapshot format uses for `0xFC` records. Both the write
//! path (SET ... PX) and the read path compare against this one clock.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
#[inline]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Absolute expiry instant for a TTL starting now.
#[inline]
pub fn deadline_after(ttl: Duration) -> u64 {
    now_millis().saturating_add(ttl.as_millis() as u64)
}

/// Returns true once `now` has reached `expires_at`.
///
/// The boundary is inclusive: an entry whose deadline equals the current
/// millisecond is already gone.
#[inline]
pub fn is_expired_at(expires_at: Option<u64>, now: u64) -> bool {
    expires_at.map(|deadline| now >= deadline).unwrap_or(false)
}
