use parking_lot::Mutex;
use tracing::trace;

use crate::{
    error::{Result, TemporalError},
    item::{TemporalItem, Timestamp},
    queryable::TimeQueryable,
    time::TimeSource,
};

/// Constructor options for [`SegmentedArray`] (`spec.md` §6).
#[derive(Clone, Copy, Debug)]
pub struct SegmentedArrayConfig {
    pub segment_capacity: usize,
}

impl Default for SegmentedArrayConfig {
    fn default() -> Self {
        Self {
            segment_capacity: 1024,
        }
    }
}

struct Segment<T> {
    items: Vec<TemporalItem<T>>,
}

impl<T> Segment<T> {
    fn min_ticks(&self) -> i64 {
        self.items.first().expect("segments are never empty").timestamp.ticks()
    }

    fn max_ticks(&self) -> i64 {
        self.items.last().expect("segments are never empty").timestamp.ticks()
    }
}

struct Inner<T> {
    segments: Vec<Segment<T>>,
    capacity: usize,
    count: usize,
}

impl<T> Inner<T> {
    /// Index of the first segment whose `max_ticks() >= target`, or
    /// `segments.len()` if none qualify.
    fn first_segment_at_least(&self, target: i64) -> usize {
        self.segments.partition_point(|s| s.max_ticks() < target)
    }

    fn recount(&mut self) {
        self.count = self.segments.iter().map(|s| s.items.len()).sum();
    }

    fn drop_empty_segments(&mut self) {
        self.segments.retain(|s| !s.items.is_empty());
    }
}

/// A time-ordered array split into fixed-capacity segments. Chronological
/// appends are O(1) amortized; back-dated positional inserts binary-search
/// for the right segment and split it on overflow; retention drops whole
/// leading segments for free (`spec.md` §4.4).
pub struct SegmentedArray<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> SegmentedArray<T> {
    pub fn new() -> Self {
        Self::try_with_config(SegmentedArrayConfig::default())
            .expect("default configuration is always valid")
    }

    pub fn try_with_config(config: SegmentedArrayConfig) -> Result<Self> {
        if config.segment_capacity == 0 {
            return Err(TemporalError::ConstructionInvalid(
                "segment_capacity must be positive",
            ));
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                segments: Vec::new(),
                capacity: config.segment_capacity,
                count: 0,
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stamps `value` via [`TimeSource`] for domain `T` and inserts it.
    pub fn add_value(&self, value: T) {
        let timestamp = TimeSource::<T>::now();
        self.add(TemporalItem::new(value, timestamp));
    }

    /// Inserts `item`, using the append fast path when possible and falling
    /// back to a binary-search positional insert (with segment split on
    /// overflow) otherwise.
    pub fn add(&self, item: TemporalItem<T>) {
        let mut inner = self.inner.lock();
        Self::insert_locked(&mut inner, item);
    }

    /// Inserts every item in `seq`, preferring the append fast path for each
    /// and falling back to positional insert when chronological order
    /// breaks (`spec.md` §4.4 `addSorted`).
    pub fn add_sorted(&self, seq: impl IntoIterator<Item = TemporalItem<T>>) {
        let mut inner = self.inner.lock();
        for item in seq {
            Self::insert_locked(&mut inner, item);
        }
    }

    fn insert_locked(inner: &mut Inner<T>, item: TemporalItem<T>) {
        let ts = item.timestamp.ticks();
        let fast_path = match inner.segments.last() {
            None => true,
            Some(last) => ts >= last.max_ticks(),
        };
        if fast_path {
            Self::append_locked(inner, item);
        } else {
            Self::positional_insert_locked(inner, item);
        }
        inner.count += 1;
    }

    fn append_locked(inner: &mut Inner<T>, item: TemporalItem<T>) {
        let needs_new_segment = match inner.segments.last() {
            None => true,
            Some(last) => last.items.len() >= inner.capacity,
        };
        if needs_new_segment {
            inner.segments.push(Segment { items: vec![item] });
        } else {
            inner.segments.last_mut().unwrap().items.push(item);
        }
    }

    fn positional_insert_locked(inner: &mut Inner<T>, item: TemporalItem<T>) {
        let ts = item.timestamp.ticks();
        let idx = inner.first_segment_at_least(ts);
        debug_assert!(idx < inner.segments.len());
        let pos = inner.segments[idx]
            .items
            .partition_point(|it| it.timestamp.ticks() <= ts);
        if inner.segments[idx].items.len() < inner.capacity {
            inner.segments[idx].items.insert(pos, item);
            return;
        }
        trace!(segment = idx, "splitting full segment for positional insert");
        let cap = inner.capacity;
        let mid = cap / 2;
        let right_items = inner.segments[idx].items.split_off(mid);
        inner.segments.insert(idx + 1, Segment { items: right_items });
        if pos <= mid {
            inner.segments[idx].items.insert(pos, item);
        } else {
            inner.segments[idx + 1].items.insert(pos - mid, item);
        }
    }

    /// Materializes a full snapshot of the array, ascending by timestamp.
    pub fn to_array(&self) -> Vec<TemporalItem<T>>
    where
        T: Clone,
    {
        let inner = self.inner.lock();
        inner
            .segments
            .iter()
            .flat_map(|s| s.items.iter().cloned())
            .collect()
    }

    /// Shrinks every segment's backing buffer to its current length.
    pub fn trim_excess(&self) {
        let mut inner = self.inner.lock();
        for seg in &mut inner.segments {
            seg.items.shrink_to_fit();
        }
        inner.segments.shrink_to_fit();
    }
}

impl<T> Default for SegmentedArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> TimeQueryable<T> for SegmentedArray<T> {
    fn get_in_range(&self, from: Timestamp, to: Timestamp) -> Result<Vec<TemporalItem<T>>> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let inner = self.inner.lock();
        let (from, to) = (from.ticks(), to.ticks());
        let start = inner.first_segment_at_least(from);
        let mut out = Vec::new();
        for seg in inner.segments.iter().skip(start) {
            if seg.min_ticks() > to {
                break;
            }
            let lo = seg.items.partition_point(|it| it.timestamp.ticks() < from);
            let hi = seg.items.partition_point(|it| it.timestamp.ticks() <= to);
            out.extend(seg.items[lo..hi].iter().cloned());
        }
        Ok(out)
    }

    fn get_before(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        let inner = self.inner.lock();
        let t = t.ticks();
        let mut out = Vec::new();
        for seg in &inner.segments {
            if seg.min_ticks() >= t {
                break;
            }
            let hi = seg.items.partition_point(|it| it.timestamp.ticks() < t);
            out.extend(seg.items[..hi].iter().cloned());
        }
        out
    }

    fn get_after(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        let inner = self.inner.lock();
        let t = t.ticks();
        let start = inner.first_segment_at_least(t + 1);
        let mut out = Vec::new();
        for seg in inner.segments.iter().skip(start) {
            let lo = seg.items.partition_point(|it| it.timestamp.ticks() <= t);
            out.extend(seg.items[lo..].iter().cloned());
        }
        out
    }

    fn count_since(&self, from: Timestamp) -> usize {
        let inner = self.inner.lock();
        let from = from.ticks();
        let start = inner.first_segment_at_least(from);
        inner
            .segments
            .iter()
            .skip(start)
            .map(|seg| seg.items.len() - seg.items.partition_point(|it| it.timestamp.ticks() < from))
            .sum()
    }

    fn get_earliest(&self) -> Option<TemporalItem<T>> {
        let inner = self.inner.lock();
        inner.segments.first().map(|s| s.items[0].clone())
    }

    fn get_latest(&self) -> Option<TemporalItem<T>> {
        let inner = self.inner.lock();
        inner.segments.last().map(|s| s.items.last().unwrap().clone())
    }

    fn get_nearest(&self, t: Timestamp) -> Option<TemporalItem<T>> {
        let inner = self.inner.lock();
        if inner.count == 0 {
            return None;
        }
        let t = t.ticks();
        let idx = inner.first_segment_at_least(t);
        // `after`: first item with ts >= t.
        let after = inner.segments.get(idx).and_then(|seg| {
            let pos = seg.items.partition_point(|it| it.timestamp.ticks() < t);
            seg.items.get(pos).cloned()
        });
        // `before`: last item with ts < t, which may live in the previous segment.
        let before = inner.segments.get(idx).and_then(|seg| {
            let pos = seg.items.partition_point(|it| it.timestamp.ticks() < t);
            if pos > 0 {
                seg.items.get(pos - 1).cloned()
            } else {
                None
            }
        }).or_else(|| {
            idx.checked_sub(1)
                .and_then(|prev| inner.segments.get(prev))
                .map(|seg| seg.items.last().unwrap().clone())
        });
        match (before, after) {
            (Some(b), Some(a)) => {
                let db = (t - b.timestamp.ticks()).abs();
                let da = (a.timestamp.ticks() - t).abs();
                // Tie policy: prefer the earlier item (§9 open question,
                // decided per backend).
                if db <= da {
                    Some(b)
                } else {
                    Some(a)
                }
            },
            (Some(b), None) => Some(b),
            (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }

    fn remove_older_than(&self, t: Timestamp) {
        let mut inner = self.inner.lock();
        let t = t.ticks();
        let drop_until = inner.segments.partition_point(|s| s.max_ticks() < t);
        inner.segments.drain(..drop_until);
        if let Some(first) = inner.segments.first_mut() {
            let keep_from = first.items.partition_point(|it| it.timestamp.ticks() < t);
            first.items.drain(..keep_from);
        }
        inner.drop_empty_segments();
        inner.recount();
    }

    fn remove_range(&self, from: Timestamp, to: Timestamp) -> Result<()> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let mut inner = self.inner.lock();
        let (from, to) = (from.ticks(), to.ticks());
        for seg in &mut inner.segments {
            if seg.max_ticks() < from || seg.min_ticks() > to {
                continue;
            }
            seg.items.retain(|it| {
                let ts = it.timestamp.ticks();
                ts < from || ts > to
            });
        }
        inner.drop_empty_segments();
        inner.recount();
        Ok(())
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.segments.clear();
        inner.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(n: i64) -> Timestamp {
        Timestamp::from_ticks(n)
    }

    fn item(v: i32, n: i64) -> TemporalItem<i32> {
        TemporalItem::new(v, ts(n))
    }

    /// SA-1: segmentCapacity=2; append 10..60; range/count/retention checks.
    #[test]
    fn sa1_append_and_query() {
        let array = SegmentedArray::try_with_config(SegmentedArrayConfig { segment_capacity: 2 }).unwrap();
        let ticks = [1, 2, 3, 4, 5, 6];
        let values = [10, 20, 30, 40, 50, 60];
        for (v, t) in values.into_iter().zip(ticks) {
            array.add(item(v, t));
        }
        let range = array.get_in_range(ts(ticks[1]), ts(ticks[3])).unwrap();
        assert_eq!(range.iter().map(|i| i.value).collect::<Vec<_>>(), vec![20, 30, 40]);
        assert_eq!(array.count_in_range(ts(ticks[1]), ts(ticks[3])).unwrap(), 3);

        array.remove_older_than(ts(ticks[2]));
        let remaining: Vec<_> = array.to_array().into_iter().map(|i| i.value).collect();
        assert_eq!(remaining, vec![30, 40, 50, 60]);
    }

    /// SA-2: segmentCapacity=2; positional insert causes an exact split.
    #[test]
    fn sa2_positional_insert_with_split() {
        let array = SegmentedArray::try_with_config(SegmentedArrayConfig { segment_capacity: 2 }).unwrap();
        array.add(item(1, 10)); // A
        array.add(item(2, 20)); // B
        array.add(item(3, 30)); // C
        array.add(item(4, 40)); // D
        let segments_before = array.inner.lock().segments.len();

        array.add(item(9, 25)); // X, between B and C

        let snapshot: Vec<_> = array.to_array().into_iter().map(|i| i.value).collect();
        assert_eq!(snapshot, vec![1, 2, 9, 3, 4]);

        let inner = array.inner.lock();
        assert!(inner.segments.iter().all(|s| s.items.len() <= 2));
        assert_eq!(inner.segments.len(), segments_before + 1);
    }

    #[test]
    fn invalid_range_rejected() {
        let array: SegmentedArray<i32> = SegmentedArray::new();
        array.add(item(1, 10));
        let err = array.get_in_range(ts(20), ts(10)).unwrap_err();
        assert!(matches!(err, TemporalError::InvalidRange { .. }));
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = SegmentedArray::<i32>::try_with_config(SegmentedArrayConfig { segment_capacity: 0 })
            .unwrap_err();
        assert!(matches!(err, TemporalError::ConstructionInvalid(_)));
    }

    #[test]
    fn positional_insert_keeps_insertion_order_on_equal_ticks() {
        let array: SegmentedArray<&str> = SegmentedArray::new();
        array.add(TemporalItem::new("a", ts(10)));
        array.add(TemporalItem::new("c", ts(20)));
        array.add(TemporalItem::new("b", ts(10))); // back-dated, ties "a"
        let values: Vec<_> = array.to_array().into_iter().map(|i| i.value).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn nearest_prefers_earlier_on_tie() {
        let array: SegmentedArray<i32> = SegmentedArray::new();
        array.add(item(1, 10));
        array.add(item(2, 20));
        let nearest = array.get_nearest(ts(15)).unwrap();
        assert_eq!(nearest.value, 1);
    }

    #[test]
    fn remove_range_drops_inclusive_bounds() {
        let array: SegmentedArray<i32> = SegmentedArray::new();
        for (v, t) in [(1, 10), (2, 20), (3, 30), (4, 40)] {
            array.add(item(v, t));
        }
        array.remove_range(ts(20), ts(30)).unwrap();
        let remaining: Vec<_> = array.to_array().into_iter().map(|i| i.value).collect();
        assert_eq!(remaining, vec![1, 4]);
    }

    #[test]
    fn bulk_vs_scalar_equivalence() {
        let scalar: SegmentedArray<i32> = SegmentedArray::new();
        let bulk: SegmentedArray<i32> = SegmentedArray::new();
        let items: Vec<_> = (0..50).map(|i| item(i, i as i64 * 2)).collect();
        for it in items.clone() {
            scalar.add(it);
        }
        bulk.add_sorted(items);
        assert_eq!(
            scalar.to_array().into_iter().map(|i| i.value).collect::<Vec<_>>(),
            bulk.to_array().into_iter().map(|i| i.value).collect::<Vec<_>>(),
        );
    }
}
