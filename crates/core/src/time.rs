//! Millisecond-precision timestamp type
//!
//! Cache-metadata expiry is expressed in milliseconds since Unix epoch,
//! matching the TTL unit of the persisted format. Never expose raw
//! arithmetic; use the explicit constructors and `saturating_add`.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Millisecond-precision timestamp
///
/// ## Invariants
///
/// - Timestamps are always non-negative (u64)
/// - Timestamps are always in milliseconds
/// - The zero timestamp represents Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Create a timestamp for the current moment
    ///
    /// Uses system time. Returns epoch (0) if the system clock is before
    /// Unix epoch (e.g. clock went backwards due to NTP adjustment).
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_millis() as u64)
    }

    /// Create a timestamp from milliseconds since epoch
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Milliseconds since epoch
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Timestamp offset forward by a duration, saturating at the maximum
    pub fn saturating_add(&self, duration: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(duration.as_millis() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Timestamp::from_millis(1) < Timestamp::from_millis(2));
        assert_eq!(Timestamp::EPOCH, Timestamp::from_millis(0));
    }

    #[test]
    fn test_saturating_add() {
        let t = Timestamp::from_millis(u64::MAX - 5);
        assert_eq!(
            t.saturating_add(Duration::from_millis(100)),
            Timestamp::from_millis(u64::MAX)
        );
        let t = Timestamp::from_millis(1000);
        assert_eq!(
            t.saturating_add(Duration::from_secs(1)),
            Timestamp::from_millis(2000)
        );
    }

    #[test]
    fn test_serde_transparent() {
        let t = Timestamp::from_millis(1234);
        assert_eq!(serde_json::to_string(&t).unwrap(), "1234");
        let back: Timestamp = serde_json::from_str("1234").unwrap();
        assert_eq!(back, t);
    }
}
