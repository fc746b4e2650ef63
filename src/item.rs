use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};

/// A 100ns tick counted from the Unix epoch. Monotonic and strictly
/// increasing within a single [`crate::time::TimeSource`] domain.
pub type Tick = i64;

/// Number of ticks (100ns intervals) in one second, used to convert to and
/// from [`chrono`] durations.
const TICKS_PER_SECOND: i64 = 10_000_000;

/// A canonical instant: UTC ticks at 100ns resolution. Always the result of
/// normalization (see [`crate::time::normalize`]) — never carries a stored
/// offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Tick);

impl Timestamp {
    /// Constructs a `Timestamp` directly from ticks.
    #[inline]
    pub const fn from_ticks(ticks: Tick) -> Self {
        Self(ticks)
    }

    #[inline]
    pub const fn ticks(self) -> Tick {
        self.0
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let nanos = dt.timestamp_nanos_opt().unwrap_or(0);
        Self(nanos / 100)
    }

    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(
            self.0 / TICKS_PER_SECOND,
            ((self.0 % TICKS_PER_SECOND).unsigned_abs() as u32) * 100,
        )
        .unwrap_or_default()
    }

    pub const MIN: Timestamp = Timestamp(Tick::MIN);
    pub const MAX: Timestamp = Timestamp(Tick::MAX);

    /// Saturating duration between two timestamps, always non-negative.
    pub fn span_since(self, earlier: Timestamp) -> Duration {
        let ticks = self.0.saturating_sub(earlier.0);
        Duration::nanoseconds(ticks.saturating_mul(100))
    }
}

/// An immutable (value, timestamp) pair. Ordering is by ticks ascending only
/// — equality is structural (value and timestamp must both match), matching
/// `spec.md` §3's distinction between ordering and equality.
#[derive(Clone, Copy, Debug)]
pub struct TemporalItem<T> {
    pub value: T,
    pub timestamp: Timestamp,
}

impl<T> TemporalItem<T> {
    pub fn new(value: T, timestamp: Timestamp) -> Self {
        Self { value, timestamp }
    }
}

impl<T: PartialEq> PartialEq for TemporalItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.timestamp == other.timestamp
    }
}
impl<T: Eq> Eq for TemporalItem<T> {}

impl<T> PartialOrd for TemporalItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for TemporalItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp.cmp(&other.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_datetime() {
        let now = Utc::now();
        let ts = Timestamp::from_datetime(now);
        let back = ts.to_datetime();
        // 100ns resolution, so we may lose sub-100ns precision but not more.
        assert!((back - now).num_microseconds().unwrap().abs() < 1);
    }

    #[test]
    fn ordering_ignores_value() {
        let a = TemporalItem::new("z", Timestamp::from_ticks(1));
        let b = TemporalItem::new("a", Timestamp::from_ticks(2));
        assert!(a < b);
        assert_ne!(a, TemporalItem::new("z", Timestamp::from_ticks(2)));
    }
}
