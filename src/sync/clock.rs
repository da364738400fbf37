/// A monotonic duration in milliseconds. Kept as a thin newtype instead of
/// `core::time::Duration` so the trait below stays usable on targets where
/// pulling in the full `core::time` machinery is undesirable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Duration(pub u64);

impl Duration {
    pub const fn from_millis(ms: u64) -> Self {
        Duration(ms)
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

/// A monotonic timestamp in milliseconds since an arbitrary epoch (typically
/// boot). Only differences between two `Instant`s are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Instant(pub u64);

impl Instant {
    pub const fn elapsed_since(&self, earlier: Instant) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    pub const fn checked_add(&self, d: Duration) -> Instant {
        Instant(self.0.saturating_add(d.0))
    }
}

/// A monotonic clock, externalized the same way the worker loop's timers are
/// externalized: this crate does not own a tick source or an RTC.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}
