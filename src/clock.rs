//! Wall-clock timestamp arithmetic.
//!
//! `Timespec` is a normalized (seconds, nanoseconds) pair used for start
//! times and elapsed durations throughout the engine. Arithmetic always
//! carries nanosecond overflow/underflow into the seconds field so the
//! invariant `0 <= nanos < 1_000_000_000` holds for every value that escapes
//! this module. Relative timeouts (as opposed to wall-clock timestamps) are
//! handled directly with `tokio::time::timeout`/`Duration` at their call
//! sites rather than through a type in this module.

use std::ops::{Add, Sub};
use std::time::Duration;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A normalized (seconds, nanoseconds) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timespec {
    seconds: i64,
    nanos: u32,
}

impl Timespec {
    pub fn new(seconds: i64, nanos: u32) -> Self {
        let mut seconds = seconds;
        let mut nanos = nanos;
        seconds += (nanos / NANOS_PER_SEC) as i64;
        nanos %= NANOS_PER_SEC;
        Timespec { seconds, nanos }
    }

    pub fn zero() -> Self {
        Timespec { seconds: 0, nanos: 0 }
    }

    pub fn from_duration(d: Duration) -> Self {
        Timespec::new(d.as_secs() as i64, d.subsec_nanos())
    }

    pub fn as_duration(&self) -> Duration {
        Duration::new(self.seconds.max(0) as u64, self.nanos)
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }
}

impl Add for Timespec {
    type Output = Timespec;

    fn add(self, rhs: Timespec) -> Timespec {
        Timespec::new(self.seconds + rhs.seconds, self.nanos + rhs.nanos)
    }
}

impl Sub for Timespec {
    type Output = Timespec;

    fn sub(self, rhs: Timespec) -> Timespec {
        let mut seconds = self.seconds - rhs.seconds;
        let mut nanos = self.nanos as i64 - rhs.nanos as i64;
        if nanos < 0 {
            nanos += NANOS_PER_SEC as i64;
            seconds -= 1;
        }
        Timespec::new(seconds, nanos as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_overflowing_nanos() {
        let t = Timespec::new(1, 1_500_000_000);
        assert_eq!(t.seconds(), 2);
        assert_eq!(t.nanos(), 500_000_000);
    }

    #[test]
    fn subtraction_borrows_from_seconds() {
        let a = Timespec::new(2, 100);
        let b = Timespec::new(1, 200);
        let d = a - b;
        assert_eq!(d.seconds(), 0);
        assert_eq!(d.nanos(), NANOS_PER_SEC - 100);
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = Timespec::new(1, 999_999_999);
        let b = Timespec::new(2, 0);
        assert!(a < b);
    }
}
