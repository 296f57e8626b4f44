//! Time source for completion timestamps.

use time::OffsetDateTime;

pub trait Clock: Send + Sync {
    /// Current UTC time in seconds since the Unix epoch.
    fn now(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        let now = OffsetDateTime::now_utc();
        now.unix_timestamp() as f64 + f64::from(now.nanosecond()) / 1e9
    }
}

/// A clock stuck at one instant. Used in tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedClock(pub f64);

impl Clock for FixedClock {
    fn now(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_returns_its_instant() {
        assert_eq!(FixedClock(1_700_000_000.5).now(), 1_700_000_000.5);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800.0);
    }
}
