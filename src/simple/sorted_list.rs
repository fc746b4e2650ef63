use parking_lot::Mutex;

use crate::{
    error::{Result, TemporalError},
    item::{TemporalItem, Timestamp},
    queryable::TimeQueryable,
    time::TimeSource,
};

/// A single sorted run of stamped items, ascending by timestamp. The
/// single-segment degenerate case of [`crate::segmented_array::SegmentedArray`]
/// (`spec.md` §2, "simple backends") — kept as its own small type rather
/// than a configured `SegmentedArray` so callers get a plain `Vec` snapshot
/// without segment boundaries leaking through the API.
pub struct SortedList<T> {
    items: Mutex<Vec<TemporalItem<T>>>,
}

impl<T: Clone> SortedList<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_value(&self, value: T) {
        let timestamp = TimeSource::<T>::now();
        self.add(TemporalItem::new(value, timestamp));
    }

    pub fn add(&self, item: TemporalItem<T>) {
        let mut items = self.items.lock();
        let pos = items.partition_point(|it| it.timestamp < item.timestamp);
        items.insert(pos, item);
    }

    pub fn to_vec(&self) -> Vec<TemporalItem<T>> {
        self.items.lock().clone()
    }
}

impl<T: Clone> Default for SortedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> TimeQueryable<T> for SortedList<T> {
    fn get_in_range(&self, from: Timestamp, to: Timestamp) -> Result<Vec<TemporalItem<T>>> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let items = self.items.lock();
        let lo = items.partition_point(|it| it.timestamp < from);
        let hi = items.partition_point(|it| it.timestamp <= to);
        Ok(items[lo..hi].to_vec())
    }

    fn get_before(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        let items = self.items.lock();
        let hi = items.partition_point(|it| it.timestamp < t);
        items[..hi].to_vec()
    }

    fn get_after(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        let items = self.items.lock();
        let lo = items.partition_point(|it| it.timestamp <= t);
        items[lo..].to_vec()
    }

    fn count_since(&self, from: Timestamp) -> usize {
        let items = self.items.lock();
        items.len() - items.partition_point(|it| it.timestamp < from)
    }

    fn get_earliest(&self) -> Option<TemporalItem<T>> {
        self.items.lock().first().cloned()
    }

    fn get_latest(&self) -> Option<TemporalItem<T>> {
        self.items.lock().last().cloned()
    }

    fn get_nearest(&self, t: Timestamp) -> Option<TemporalItem<T>> {
        let items = self.items.lock();
        if items.is_empty() {
            return None;
        }
        let pos = items.partition_point(|it| it.timestamp < t);
        let after = items.get(pos);
        let before = pos.checked_sub(1).and_then(|i| items.get(i));
        match (before, after) {
            (Some(b), Some(a)) => {
                let db = (t.ticks() - b.timestamp.ticks()).abs();
                let da = (a.timestamp.ticks() - t.ticks()).abs();
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

    fn remove_older_than(&self, t: Timestamp) {
        let mut items = self.items.lock();
        let keep_from = items.partition_point(|it| it.timestamp < t);
        items.drain(..keep_from);
    }

    fn remove_range(&self, from: Timestamp, to: Timestamp) -> Result<()> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        self.items.lock().retain(|it| it.timestamp < from || it.timestamp > to);
        Ok(())
    }

    fn clear(&self) {
        self.items.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(n: i64) -> Timestamp {
        Timestamp::from_ticks(n)
    }

    #[test]
    fn insert_maintains_sort_order() {
        let list: SortedList<i32> = SortedList::new();
        list.add(TemporalItem::new(3, ts(30)));
        list.add(TemporalItem::new(1, ts(10)));
        list.add(TemporalItem::new(2, ts(20)));
        let values: Vec<_> = list.to_vec().into_iter().map(|it| it.value).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }
}
