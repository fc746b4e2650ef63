//! Thread-safe temporal containers keyed by monotonic UTC timestamps.
//!
//! Every backend in this crate implements [`TimeQueryable`], a uniform
//! time-range query and retention contract (inclusive ranges, exclusive
//! cutoffs — see that trait's docs). Timestamps come from [`time::TimeSource`],
//! a per-value-type monotonic clock, or from [`time::normalize`] when
//! converting externally-supplied wall-clock input. Each backend wraps its
//! mutable state behind a single internal lock; no cross-container
//! linearization is provided or required.
//!
//! - [`segmented_array::SegmentedArray`] — a single time-ordered sequence
//!   split into fixed-capacity segments.
//! - [`multimap::TemporalMultimap`] — many stamped values per key, with
//!   per-key and global time queries.
//! - [`interval_tree::IntervalTree`] — an interval index with overlap
//!   queries, built as an arena-backed treap.
//! - [`priority_queue::TemporalPriorityQueue`] — priority order with a
//!   secondary time view.
//! - [`simple`] — set, dictionary, FIFO queue, LIFO stack, sorted list,
//!   circular buffer, and sliding-window set, specified only through the
//!   contract.
//! - [`extensions`] — value-centric materializers and bucketed aggregation,
//!   generic over any [`TimeQueryable`] backend.

pub mod error;
pub mod extensions;
pub mod interval_tree;
pub mod item;
pub mod multimap;
pub mod priority_queue;
pub mod queryable;
pub mod segmented_array;
pub mod simple;
#[cfg(test)]
mod test_support;
pub mod time;

pub use error::{Result, TemporalError};
pub use interval_tree::{Interval, IntervalTree};
pub use item::{Tick, TemporalItem, Timestamp};
pub use multimap::TemporalMultimap;
pub use priority_queue::TemporalPriorityQueue;
pub use queryable::TimeQueryable;
pub use segmented_array::{SegmentedArray, SegmentedArrayConfig};
pub use simple::{
    CircularBuffer, CircularBufferConfig, SlidingWindowSet, SlidingWindowSetConfig, SortedList,
    TemporalDictionary, TemporalQueue, TemporalSet, TemporalStack,
};
pub use time::{normalize_range, to_utc, Policy, TimeSource, WallClock};
