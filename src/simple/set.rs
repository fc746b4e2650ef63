use std::{collections::HashSet, hash::Hash};

use parking_lot::Mutex;

use crate::{
    error::Result,
    item::{TemporalItem, Timestamp},
    queryable::TimeQueryable,
    segmented_array::SegmentedArray,
    time::TimeSource,
};

/// A dedup-by-value set with time-range queries. A thin adapter over
/// [`SegmentedArray`]: the segmented array holds the temporal order, a
/// `HashSet` tracks membership so `add_value` can reject duplicates in O(1)
/// (`spec.md` §2, "simple backends").
pub struct TemporalSet<T> {
    items: SegmentedArray<T>,
    members: Mutex<HashSet<T>>,
}

impl<T: Eq + Hash + Clone> TemporalSet<T> {
    pub fn new() -> Self {
        Self {
            items: SegmentedArray::new(),
            members: Mutex::new(HashSet::new()),
        }
    }

    /// Stamps and inserts `value` iff it is not already present. Returns
    /// `true` if it was inserted.
    pub fn add_value(&self, value: T) -> bool {
        let mut members = self.members.lock();
        if members.contains(&value) {
            return false;
        }
        members.insert(value.clone());
        drop(members);
        self.items.add_value(value);
        true
    }

    pub fn contains(&self, value: &T) -> bool {
        self.members.lock().contains(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Eq + Hash + Clone> Default for TemporalSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> TimeQueryable<T> for TemporalSet<T> {
    fn get_in_range(&self, from: Timestamp, to: Timestamp) -> Result<Vec<TemporalItem<T>>> {
        self.items.get_in_range(from, to)
    }

    fn get_before(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        self.items.get_before(t)
    }

    fn get_after(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        self.items.get_after(t)
    }

    fn count_since(&self, from: Timestamp) -> usize {
        self.items.count_since(from)
    }

    fn get_earliest(&self) -> Option<TemporalItem<T>> {
        self.items.get_earliest()
    }

    fn get_latest(&self) -> Option<TemporalItem<T>> {
        self.items.get_latest()
    }

    fn get_nearest(&self, t: Timestamp) -> Option<TemporalItem<T>> {
        self.items.get_nearest(t)
    }

    fn remove_older_than(&self, t: Timestamp) {
        let removed = self.items.get_before(t);
        self.items.remove_older_than(t);
        let mut members = self.members.lock();
        for it in removed {
            members.remove(&it.value);
        }
    }

    fn remove_range(&self, from: Timestamp, to: Timestamp) -> Result<()> {
        let removed = self.items.get_in_range(from, to)?;
        self.items.remove_range(from, to)?;
        let mut members = self.members.lock();
        for it in removed {
            members.remove(&it.value);
        }
        Ok(())
    }

    fn clear(&self) {
        self.items.clear();
        self.members.lock().clear();
    }
}
