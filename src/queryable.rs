use chrono::Duration;

use crate::{
    error::Result,
    item::{TemporalItem, Timestamp},
};

/// The uniform time-range query/retention surface implemented by every
/// backend in this crate (`spec.md` §4.3).
///
/// Let `S` be the multiset of items currently stored, ordered by `ts`
/// ascending. All range inputs are inclusive on both ends; all cutoff
/// inputs (`before`/`after`/`older_than`) are exclusive, per `spec.md` §3.
/// Range methods fail [`crate::TemporalError::InvalidRange`] when
/// `from > to`; implementations must check this before mutating anything.
///
/// Methods take `&self`: every backend wraps its mutable state behind an
/// internal lock (`spec.md` §5), so both reads and writes are available to
/// any number of concurrent callers without the caller holding `&mut`.
pub trait TimeQueryable<T> {
    /// Items with `from <= ts <= to`, sorted ascending by `ts`.
    fn get_in_range(&self, from: Timestamp, to: Timestamp) -> Result<Vec<TemporalItem<T>>>;

    /// Items with `ts < t`, sorted ascending by `ts`.
    fn get_before(&self, t: Timestamp) -> Vec<TemporalItem<T>>;

    /// Items with `ts > t`, sorted ascending by `ts`.
    fn get_after(&self, t: Timestamp) -> Vec<TemporalItem<T>>;

    /// `== get_in_range(from, to).len()`.
    fn count_in_range(&self, from: Timestamp, to: Timestamp) -> Result<usize> {
        Ok(self.get_in_range(from, to)?.len())
    }

    /// Count of items with `ts >= from` (inclusive lower bound, unlike the
    /// exclusive cutoffs used elsewhere in this trait — see `spec.md` §4.3).
    fn count_since(&self, from: Timestamp) -> usize;

    /// The item with the minimum `ts`, or `None` iff the container is empty.
    fn get_earliest(&self) -> Option<TemporalItem<T>>;

    /// The item with the maximum `ts`, or `None` iff the container is empty.
    fn get_latest(&self) -> Option<TemporalItem<T>>;

    /// `latest.ts - earliest.ts`, or zero if fewer than two items are stored.
    fn get_time_span(&self) -> Duration {
        match (self.get_earliest(), self.get_latest()) {
            (Some(a), Some(b)) if a.timestamp != b.timestamp => b.timestamp.span_since(a.timestamp),
            _ => Duration::zero(),
        }
    }

    /// The item whose `ts` is closest to `t`. On an exact tie between two
    /// items equidistant from `t`, each backend documents and tests one of
    /// two stable policies (prefer-earlier or prefer-later) — see
    /// `DESIGN.md`.
    fn get_nearest(&self, t: Timestamp) -> Option<TemporalItem<T>>;

    /// Removes all items with `ts < t`.
    fn remove_older_than(&self, t: Timestamp);

    /// Removes all items with `from <= ts <= to`.
    fn remove_range(&self, from: Timestamp, to: Timestamp) -> Result<()>;

    /// Removes every stored item.
    fn clear(&self);
}
