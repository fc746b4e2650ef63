use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::{
    error::{Result, TemporalError},
    item::{TemporalItem, Timestamp},
    queryable::TimeQueryable,
    time::TimeSource,
};

/// Dequeues by priority (smaller sorts first) with insertion-order tiebreak,
/// while also answering the uniform time-range contract (`spec.md` §4.7).
///
/// Primary order is `(priority, ts, sequence)`; `sequence` is a monotonic
/// counter assigned at `enqueue` time so that equal `(priority, ts)` pairs
/// keep a strict weak order. A secondary index ordered by `(ts, sequence)`
/// alone is maintained in lockstep, turning the contract's time-range
/// operations from an O(n) scan into O(log n + k) — the contract permits
/// but does not require this.
pub struct TemporalPriorityQueue<T, P> {
    inner: Mutex<Inner<T, P>>,
}

struct Inner<T, P> {
    primary: BTreeMap<(P, i64, u64), T>,
    secondary: BTreeMap<(i64, u64), P>,
    sequence: u64,
}

impl<T: Clone, P: Ord + Clone> TemporalPriorityQueue<T, P> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                primary: BTreeMap::new(),
                secondary: BTreeMap::new(),
                sequence: 0,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stamps `value` via [`TimeSource`] and inserts it at `priority`.
    pub fn enqueue(&self, value: T, priority: P) {
        let ts = TimeSource::<T>::now();
        let mut inner = self.inner.lock();
        let seq = inner.sequence;
        inner.sequence += 1;
        inner.secondary.insert((ts.ticks(), seq), priority.clone());
        inner.primary.insert((priority, ts.ticks(), seq), value);
    }

    /// The minimum `(priority, ts, sequence)` element, without removing it.
    pub fn try_peek(&self) -> Option<TemporalItem<T>> {
        let inner = self.inner.lock();
        let ((_, ticks, _), value) = inner.primary.iter().next()?;
        Some(TemporalItem::new(value.clone(), Timestamp::from_ticks(*ticks)))
    }

    /// Removes and returns the minimum element.
    pub fn try_dequeue(&self) -> Option<TemporalItem<T>> {
        let mut inner = self.inner.lock();
        let key = inner.primary.keys().next().cloned()?;
        let (_, ticks, seq) = key;
        let value = inner.primary.remove(&key).unwrap();
        inner.secondary.remove(&(ticks, seq));
        Some(TemporalItem::new(value, Timestamp::from_ticks(ticks)))
    }
}

impl<T: Clone, P: Ord + Clone> Default for TemporalPriorityQueue<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P> Inner<T, P> {
    fn value_at(&self, priority: &P, ticks: i64, seq: u64) -> Option<&T>
    where
        P: Ord + Clone,
    {
        self.primary.get(&(priority.clone(), ticks, seq))
    }
}

impl<T: Clone, P: Ord + Clone> TimeQueryable<T> for TemporalPriorityQueue<T, P> {
    fn get_in_range(&self, from: Timestamp, to: Timestamp) -> Result<Vec<TemporalItem<T>>> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let inner = self.inner.lock();
        let out = inner
            .secondary
            .range((from.ticks(), u64::MIN)..=(to.ticks(), u64::MAX))
            .filter_map(|(&(ticks, seq), priority)| {
                inner
                    .value_at(priority, ticks, seq)
                    .map(|v| TemporalItem::new(v.clone(), Timestamp::from_ticks(ticks)))
            })
            .collect();
        Ok(out)
    }

    fn get_before(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        let inner = self.inner.lock();
        inner
            .secondary
            .range(..(t.ticks(), u64::MIN))
            .filter_map(|(&(ticks, seq), priority)| {
                inner
                    .value_at(priority, ticks, seq)
                    .map(|v| TemporalItem::new(v.clone(), Timestamp::from_ticks(ticks)))
            })
            .collect()
    }

    fn get_after(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        let inner = self.inner.lock();
        inner
            .secondary
            .range((t.ticks(), u64::MAX)..)
            .filter(|(&(ticks, _), _)| ticks > t.ticks())
            .filter_map(|(&(ticks, seq), priority)| {
                inner
                    .value_at(priority, ticks, seq)
                    .map(|v| TemporalItem::new(v.clone(), Timestamp::from_ticks(ticks)))
            })
            .collect()
    }

    fn count_since(&self, from: Timestamp) -> usize {
        self.inner.lock().secondary.range((from.ticks(), u64::MIN)..).count()
    }

    fn get_earliest(&self) -> Option<TemporalItem<T>> {
        let inner = self.inner.lock();
        let (&(ticks, seq), priority) = inner.secondary.iter().next()?;
        inner
            .value_at(priority, ticks, seq)
            .map(|v| TemporalItem::new(v.clone(), Timestamp::from_ticks(ticks)))
    }

    fn get_latest(&self) -> Option<TemporalItem<T>> {
        let inner = self.inner.lock();
        let (&(ticks, seq), priority) = inner.secondary.iter().next_back()?;
        inner
            .value_at(priority, ticks, seq)
            .map(|v| TemporalItem::new(v.clone(), Timestamp::from_ticks(ticks)))
    }

    /// Tie policy: prefers the earlier item, matching `SegmentedArray`.
    fn get_nearest(&self, t: Timestamp) -> Option<TemporalItem<T>> {
        let inner = self.inner.lock();
        let before = inner.secondary.range(..=(t.ticks(), u64::MAX)).next_back();
        let after = inner.secondary.range((t.ticks(), u64::MIN)..).next();
        let pick = match (before, after) {
            (Some((&(bt, bs), bp)), Some((&(at, aseq), ap))) => {
                if (bt, bs) == (at, aseq) {
                    Some(((bt, bs), bp))
                } else {
                    let db = (t.ticks() - bt).abs();
                    let da = (at - t.ticks()).abs();
                    if db <= da {
                        Some(((bt, bs), bp))
                    } else {
                        Some(((at, aseq), ap))
                    }
                }
            },
            (Some((&k, p)), None) => Some((k, p)),
            (None, Some((&k, p))) => Some((k, p)),
            (None, None) => None,
        }?;
        let ((ticks, seq), priority) = pick;
        inner
            .value_at(priority, ticks, seq)
            .map(|v| TemporalItem::new(v.clone(), Timestamp::from_ticks(ticks)))
    }

    fn remove_older_than(&self, t: Timestamp) {
        let mut inner = self.inner.lock();
        let stale: Vec<(i64, u64)> = inner.secondary.range(..(t.ticks(), u64::MIN)).map(|(&k, _)| k).collect();
        for (ticks, seq) in stale {
            if let Some(priority) = inner.secondary.remove(&(ticks, seq)) {
                inner.primary.remove(&(priority, ticks, seq));
            }
        }
    }

    fn remove_range(&self, from: Timestamp, to: Timestamp) -> Result<()> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let mut inner = self.inner.lock();
        let doomed: Vec<(i64, u64)> = inner
            .secondary
            .range((from.ticks(), u64::MIN)..=(to.ticks(), u64::MAX))
            .map(|(&k, _)| k)
            .collect();
        for (ticks, seq) in doomed {
            if let Some(priority) = inner.secondary.remove(&(ticks, seq)) {
                inner.primary.remove(&(priority, ticks, seq));
            }
        }
        Ok(())
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.primary.clear();
        inner.secondary.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// PQ-1: dequeue order follows priority first, insertion order among
    /// equal priorities second.
    #[test]
    fn pq1_priority_then_insertion_order() {
        let pq: TemporalPriorityQueue<&str, i32> = TemporalPriorityQueue::new();
        pq.enqueue("low-a", 5);
        pq.enqueue("high", 1);
        pq.enqueue("low-b", 5);

        assert_eq!(pq.try_dequeue().unwrap().value, "high");
        assert_eq!(pq.try_dequeue().unwrap().value, "low-a");
        assert_eq!(pq.try_dequeue().unwrap().value, "low-b");
        assert!(pq.try_dequeue().is_none());
    }

    #[test]
    fn peek_does_not_remove() {
        let pq: TemporalPriorityQueue<i32, i32> = TemporalPriorityQueue::new();
        pq.enqueue(1, 10);
        assert_eq!(pq.try_peek().unwrap().value, 1);
        assert_eq!(pq.len(), 1);
    }

    #[test]
    fn time_view_sorted_by_ts_not_priority() {
        let pq: TemporalPriorityQueue<&str, i32> = TemporalPriorityQueue::new();
        pq.enqueue("a", 9);
        pq.enqueue("b", 1);
        let all = pq.get_in_range(Timestamp::MIN, Timestamp::MAX).unwrap();
        let ticks: Vec<_> = all.iter().map(|it| it.timestamp.ticks()).collect();
        assert!(ticks.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(all[0].value, "a");
    }

    #[test]
    fn remove_range_drops_matching_and_keeps_rest() {
        let pq: TemporalPriorityQueue<i32, i32> = TemporalPriorityQueue::new();
        pq.enqueue(1, 1);
        pq.enqueue(2, 1);
        let first_ts = pq.get_earliest().unwrap().timestamp;
        pq.remove_range(Timestamp::MIN, first_ts).unwrap();
        assert_eq!(pq.len(), 1);
    }
}
