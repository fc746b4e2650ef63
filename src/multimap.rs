use std::{collections::HashMap, hash::Hash};

use parking_lot::Mutex;

use crate::{
    error::{Result, TemporalError},
    item::{TemporalItem, Timestamp},
    queryable::TimeQueryable,
    time::TimeSource,
};

/// Stores many stamped values per key. Per-key runs are sorted by ticks
/// ascending; global queries merge across runs, pruning any run whose
/// `[first, last]` span can't overlap the query window (`spec.md` §4.5).
pub struct TemporalMultimap<K, V> {
    inner: Mutex<HashMap<K, Vec<TemporalItem<V>>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TemporalMultimap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn key_len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn total_len(&self) -> usize {
        self.inner.lock().values().map(Vec::len).sum()
    }

    /// Stamps `value` via [`TimeSource`] for domain `V` and inserts it under
    /// `key`.
    pub fn add_value(&self, key: K, value: V) {
        let timestamp = TimeSource::<V>::now();
        self.add(key, TemporalItem::new(value, timestamp));
    }

    /// Inserts `item` under `key`, using the run's append fast path when
    /// possible and falling back to a binary-search insert otherwise.
    pub fn add(&self, key: K, item: TemporalItem<V>) {
        let mut inner = self.inner.lock();
        let run = inner.entry(key).or_default();
        Self::insert_run(run, item);
    }

    fn insert_run(run: &mut Vec<TemporalItem<V>>, item: TemporalItem<V>) {
        let fast_path = match run.last() {
            None => true,
            Some(last) => item.timestamp >= last.timestamp,
        };
        if fast_path {
            run.push(item);
        } else {
            let pos = run.partition_point(|it| it.timestamp <= item.timestamp);
            run.insert(pos, item);
        }
    }

    /// Adds every value in `values` under `key`, each stamped independently.
    pub fn add_range(&self, key: K, values: impl IntoIterator<Item = V>) {
        for value in values {
            self.add_value(key.clone(), value);
        }
    }

    /// Adds every already-stamped item in `items` under `key`.
    pub fn add_range_items(&self, key: K, items: impl IntoIterator<Item = TemporalItem<V>>) {
        let mut inner = self.inner.lock();
        let run = inner.entry(key).or_default();
        for item in items {
            Self::insert_run(run, item);
        }
    }

    /// Drops `key` and every value stored under it.
    pub fn remove_key(&self, key: &K) {
        self.inner.lock().remove(key);
    }

    /// Values under `key` with `from <= ts <= to`.
    pub fn get_values_in_range(
        &self,
        key: &K,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<TemporalItem<V>>> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let inner = self.inner.lock();
        let Some(run) = inner.get(key) else {
            return Ok(Vec::new());
        };
        Ok(slice_in_range(run, from, to).to_vec())
    }

    /// Removes values under `key` with `ts < t`. Drops the key entirely if
    /// its run becomes empty.
    pub fn remove_older_than_key(&self, key: &K, t: Timestamp) {
        let mut inner = self.inner.lock();
        let mut now_empty = false;
        if let Some(run) = inner.get_mut(key) {
            let keep_from = run.partition_point(|it| it.timestamp < t);
            run.drain(..keep_from);
            now_empty = run.is_empty();
        }
        if now_empty {
            inner.remove(key);
        }
    }

    /// Removes values under `key` with `from <= ts <= to`. Drops the key
    /// entirely if its run becomes empty.
    pub fn remove_range_key(&self, key: &K, from: Timestamp, to: Timestamp) -> Result<()> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let mut inner = self.inner.lock();
        let mut now_empty = false;
        if let Some(run) = inner.get_mut(key) {
            run.retain(|it| it.timestamp < from || it.timestamp > to);
            now_empty = run.is_empty();
        }
        if now_empty {
            inner.remove(key);
        }
        Ok(())
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for TemporalMultimap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn slice_in_range<V>(run: &[TemporalItem<V>], from: Timestamp, to: Timestamp) -> &[TemporalItem<V>] {
    let lo = run.partition_point(|it| it.timestamp < from);
    let hi = run.partition_point(|it| it.timestamp <= to);
    &run[lo..hi]
}

fn nearest_in_run<V: Clone>(run: &[TemporalItem<V>], t: Timestamp) -> Option<TemporalItem<V>> {
    if run.is_empty() {
        return None;
    }
    let pos = run.partition_point(|it| it.timestamp < t);
    let after = run.get(pos);
    let before = pos.checked_sub(1).and_then(|i| run.get(i));
    match (before, after) {
        (Some(b), Some(a)) => {
            let db = (t.ticks() - b.timestamp.ticks()).abs();
            let da = (a.timestamp.ticks() - t.ticks()).abs();
            // Tie policy: prefer the earlier item, matching `SegmentedArray`.
            if db <= da {
                Some(b.clone())
            } else {
                Some(a.clone())
            }
        },
        (Some(b), None) => Some(b.clone()),
        (None, Some(a)) => Some(a.clone()),
        (None, None) => None,
    }
}

impl<K: Eq + Hash + Clone, V: Clone> TimeQueryable<(K, V)> for TemporalMultimap<K, V> {
    fn get_in_range(&self, from: Timestamp, to: Timestamp) -> Result<Vec<TemporalItem<(K, V)>>> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let inner = self.inner.lock();
        let mut out = Vec::new();
        for (key, run) in inner.iter() {
            if run.is_empty() {
                continue;
            }
            if run.last().unwrap().timestamp < from || run.first().unwrap().timestamp > to {
                continue;
            }
            out.extend(slice_in_range(run, from, to).iter().map(|it| {
                TemporalItem::new((key.clone(), it.value.clone()), it.timestamp)
            }));
        }
        out.sort_by_key(|it| it.timestamp);
        Ok(out)
    }

    fn get_before(&self, t: Timestamp) -> Vec<TemporalItem<(K, V)>> {
        let inner = self.inner.lock();
        let mut out = Vec::new();
        for (key, run) in inner.iter() {
            if run.is_empty() || run.first().unwrap().timestamp >= t {
                continue;
            }
            let hi = run.partition_point(|it| it.timestamp < t);
            out.extend(run[..hi].iter().map(|it| TemporalItem::new((key.clone(), it.value.clone()), it.timestamp)));
        }
        out.sort_by_key(|it| it.timestamp);
        out
    }

    fn get_after(&self, t: Timestamp) -> Vec<TemporalItem<(K, V)>> {
        let inner = self.inner.lock();
        let mut out = Vec::new();
        for (key, run) in inner.iter() {
            if run.is_empty() || run.last().unwrap().timestamp <= t {
                continue;
            }
            let lo = run.partition_point(|it| it.timestamp <= t);
            out.extend(run[lo..].iter().map(|it| TemporalItem::new((key.clone(), it.value.clone()), it.timestamp)));
        }
        out.sort_by_key(|it| it.timestamp);
        out
    }

    fn count_since(&self, from: Timestamp) -> usize {
        let inner = self.inner.lock();
        inner
            .values()
            .filter(|run| !run.is_empty() && run.last().unwrap().timestamp >= from)
            .map(|run| run.len() - run.partition_point(|it| it.timestamp < from))
            .sum()
    }

    fn get_earliest(&self) -> Option<TemporalItem<(K, V)>> {
        let inner = self.inner.lock();
        inner
            .iter()
            .filter_map(|(k, run)| run.first().map(|it| TemporalItem::new((k.clone(), it.value.clone()), it.timestamp)))
            .min_by_key(|it| it.timestamp)
    }

    fn get_latest(&self) -> Option<TemporalItem<(K, V)>> {
        let inner = self.inner.lock();
        inner
            .iter()
            .filter_map(|(k, run)| run.last().map(|it| TemporalItem::new((k.clone(), it.value.clone()), it.timestamp)))
            .max_by_key(|it| it.timestamp)
    }

    fn get_nearest(&self, t: Timestamp) -> Option<TemporalItem<(K, V)>> {
        let inner = self.inner.lock();
        let mut best: Option<(i64, TemporalItem<(K, V)>)> = None;
        for (key, run) in inner.iter() {
            let Some(candidate) = nearest_in_run(run, t) else {
                continue;
            };
            let diff = (candidate.timestamp.ticks() - t.ticks()).abs();
            let item = TemporalItem::new((key.clone(), candidate.value), candidate.timestamp);
            best = Some(match best {
                None => (diff, item),
                Some((best_diff, best_item)) => {
                    if diff < best_diff || (diff == best_diff && item.timestamp < best_item.timestamp) {
                        (diff, item)
                    } else {
                        (best_diff, best_item)
                    }
                },
            });
        }
        best.map(|(_, item)| item)
    }

    fn remove_older_than(&self, t: Timestamp) {
        let mut inner = self.inner.lock();
        inner.retain(|_, run| {
            let keep_from = run.partition_point(|it| it.timestamp < t);
            run.drain(..keep_from);
            !run.is_empty()
        });
    }

    fn remove_range(&self, from: Timestamp, to: Timestamp) -> Result<()> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let mut inner = self.inner.lock();
        inner.retain(|_, run| {
            run.retain(|it| it.timestamp < from || it.timestamp > to);
            !run.is_empty()
        });
        Ok(())
    }

    fn clear(&self) {
        self.inner.lock().clear();
    }
}
