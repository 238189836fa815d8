//! Local wall clock and per-stream clock offset

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Local wall clock in milliseconds since the unix epoch
pub fn unix_time_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Local wall clock in seconds since the unix epoch
pub fn unix_time_s() -> f64 {
    unix_time_ms() * 0.001
}

/// Estimated `local - remote` clock difference of one stream, in milliseconds
///
/// Written once when the stream starts, read by the enqueue path on every item.
#[derive(Debug, Default)]
pub struct ClockOffset(AtomicU64);

impl ClockOffset {
    pub fn new(offset_ms: f64) -> Self {
        Self(AtomicU64::new(offset_ms.to_bits()))
    }

    pub fn set_ms(&self, offset_ms: f64) {
        self.0.store(offset_ms.to_bits(), Ordering::Release);
    }

    pub fn ms(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Offset in seconds, ready to add to a stream timestamp
    pub fn seconds(&self) -> f64 {
        self.ms() * 0.001
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_offset_is_zero() {
        assert_eq!(ClockOffset::default().ms(), 0.0);
    }

    #[test]
    fn test_offset_round_trips_negative_values() {
        let offset = ClockOffset::new(0.0);
        offset.set_ms(-1234.5);
        assert_eq!(offset.ms(), -1234.5);
        assert!((offset.seconds() + 1.2345).abs() < 1e-12);
    }

    #[test]
    fn test_unix_clock_is_sane() {
        // After 2020-01-01
        assert!(unix_time_s() > 1_577_836_800.0);
    }
}
