use std::{collections::HashSet, hash::Hash};

use chrono::Duration;
use parking_lot::Mutex;

use crate::{
    error::{Result, TemporalError},
    item::{TemporalItem, Timestamp},
    queryable::TimeQueryable,
    time::TimeSource,
};

/// Constructor options for [`SlidingWindowSet`] (`spec.md` §6).
#[derive(Clone, Copy, Debug)]
pub struct SlidingWindowSetConfig {
    pub window_size: Duration,
}

/// A dedup-by-value set where items older than `now - window_size` are
/// eligible for explicit expiry via [`SlidingWindowSet::remove_expired`].
///
/// `get_in_range` deliberately does **not** implicitly drop expired entries
/// before answering — the conservative reading of an ambiguous contract
/// (`spec.md` §9): only `remove_expired` and `remove_older_than` prune.
pub struct SlidingWindowSet<T> {
    items: Mutex<Vec<TemporalItem<T>>>,
    members: Mutex<HashSet<T>>,
    window_ticks: i64,
}

impl<T: Eq + Hash + Clone> SlidingWindowSet<T> {
    pub fn try_with_config(config: SlidingWindowSetConfig) -> Result<Self> {
        let window_ticks = config
            .window_size
            .num_nanoseconds()
            .map(|n| n / 100)
            .unwrap_or(0);
        if window_ticks <= 0 {
            return Err(TemporalError::ConstructionInvalid("window_size must be positive"));
        }
        Ok(Self {
            items: Mutex::new(Vec::new()),
            members: Mutex::new(HashSet::new()),
            window_ticks,
        })
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, value: &T) -> bool {
        self.members.lock().contains(value)
    }

    /// Stamps and appends `value` iff not already present. Returns `true`
    /// if it was inserted.
    pub fn add_value(&self, value: T) -> bool {
        let mut members = self.members.lock();
        if members.contains(&value) {
            return false;
        }
        members.insert(value.clone());
        let timestamp = TimeSource::<T>::now();
        self.items.lock().push(TemporalItem::new(value, timestamp));
        true
    }

    /// Removes every item with `ts < now - window_size`.
    pub fn remove_expired(&self) {
        let now = TimeSource::<T>::now();
        let cutoff = now.ticks().saturating_sub(self.window_ticks);
        self.remove_older_than(Timestamp::from_ticks(cutoff));
    }
}

impl<T: Eq + Hash + Clone> TimeQueryable<T> for SlidingWindowSet<T> {
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
        let removed: Vec<T> = items.drain(..keep_from).map(|it| it.value).collect();
        drop(items);
        let mut members = self.members.lock();
        for v in removed {
            members.remove(&v);
        }
    }

    fn remove_range(&self, from: Timestamp, to: Timestamp) -> Result<()> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let mut items = self.items.lock();
        let mut removed = Vec::new();
        items.retain(|it| {
            if it.timestamp >= from && it.timestamp <= to {
                removed.push(it.value.clone());
                false
            } else {
                true
            }
        });
        drop(items);
        let mut members = self.members.lock();
        for v in removed {
            members.remove(&v);
        }
        Ok(())
    }

    fn clear(&self) {
        self.items.lock().clear();
        self.members.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(secs: i64) -> SlidingWindowSetConfig {
        SlidingWindowSetConfig {
            window_size: Duration::seconds(secs),
        }
    }

    #[test]
    fn zero_window_rejected() {
        let err = SlidingWindowSet::<i32>::try_with_config(window(0)).unwrap_err();
        assert!(matches!(err, TemporalError::ConstructionInvalid(_)));
    }

    #[test]
    fn get_in_range_does_not_implicitly_expire() {
        let set: SlidingWindowSet<i32> = SlidingWindowSet::try_with_config(window(3600)).unwrap();
        set.add_value(1);
        set.add_value(2);
        let all = set.get_in_range(Timestamp::MIN, Timestamp::MAX).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn remove_older_than_prunes_membership_too() {
        let set: SlidingWindowSet<i32> = SlidingWindowSet::try_with_config(window(3600)).unwrap();
        set.add_value(1);
        set.add_value(2);
        let cutoff = set.get_latest().unwrap().timestamp;
        set.remove_older_than(cutoff);
        assert!(!set.contains(&1));
        assert!(set.contains(&2));
        assert!(set.add_value(1));
    }
}
