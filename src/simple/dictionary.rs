use std::{collections::HashMap, hash::Hash};

use parking_lot::Mutex;

use crate::{
    error::Result,
    item::{TemporalItem, Timestamp},
    queryable::TimeQueryable,
    segmented_array::SegmentedArray,
};

/// A last-write-wins map with time-range queries over its write history.
/// Current values live in a plain `HashMap`; every write is additionally
/// logged into a `SegmentedArray<(K, V)>` so the uniform time contract can
/// be answered over the full history, mirroring [`crate::multimap`]'s
/// per-key-run idea collapsed to a single current value per key
/// (`spec.md` §2, "simple backends").
pub struct TemporalDictionary<K, V> {
    log: SegmentedArray<(K, V)>,
    current: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TemporalDictionary<K, V> {
    pub fn new() -> Self {
        Self {
            log: SegmentedArray::new(),
            current: Mutex::new(HashMap::new()),
        }
    }

    /// Stamps and logs `(key, value)`, then updates the current value.
    pub fn set(&self, key: K, value: V) {
        self.log.add_value((key.clone(), value.clone()));
        self.current.lock().insert(key, value);
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.current.lock().get(key).cloned()
    }

    /// Drops `key` from the current view. The write log is left untouched,
    /// so historical queries still see it.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.current.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.current.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.lock().is_empty()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for TemporalDictionary<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> TimeQueryable<(K, V)> for TemporalDictionary<K, V> {
    fn get_in_range(&self, from: Timestamp, to: Timestamp) -> Result<Vec<TemporalItem<(K, V)>>> {
        self.log.get_in_range(from, to)
    }

    fn get_before(&self, t: Timestamp) -> Vec<TemporalItem<(K, V)>> {
        self.log.get_before(t)
    }

    fn get_after(&self, t: Timestamp) -> Vec<TemporalItem<(K, V)>> {
        self.log.get_after(t)
    }

    fn count_since(&self, from: Timestamp) -> usize {
        self.log.count_since(from)
    }

    fn get_earliest(&self) -> Option<TemporalItem<(K, V)>> {
        self.log.get_earliest()
    }

    fn get_latest(&self) -> Option<TemporalItem<(K, V)>> {
        self.log.get_latest()
    }

    fn get_nearest(&self, t: Timestamp) -> Option<TemporalItem<(K, V)>> {
        self.log.get_nearest(t)
    }

    fn remove_older_than(&self, t: Timestamp) {
        self.log.remove_older_than(t);
    }

    fn remove_range(&self, from: Timestamp, to: Timestamp) -> Result<()> {
        self.log.remove_range(from, to)
    }

    fn clear(&self) {
        self.log.clear();
        self.current.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let dict: TemporalDictionary<&str, i32> = TemporalDictionary::new();
        dict.set("a", 1);
        dict.set("a", 2);
        assert_eq!(dict.get(&"a"), Some(2));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn remove_keeps_history_queryable() {
        let dict: TemporalDictionary<&str, i32> = TemporalDictionary::new();
        dict.set("a", 1);
        dict.remove(&"a");
        assert_eq!(dict.get(&"a"), None);
        let history = dict.get_in_range(Timestamp::MIN, Timestamp::MAX).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].value, ("a", 1));
    }
}
