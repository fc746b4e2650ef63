use std::{
    collections::{HashMap, HashSet, VecDeque},
    hash::Hash,
};

use chrono::Duration;

use crate::{
    error::{Result, TemporalError},
    item::Timestamp,
    queryable::TimeQueryable,
};

/// Value-centric extensions over any [`TimeQueryable`] backend: projecting
/// the stored value component out of the time dimension, and fixed-interval
/// bucketed aggregation (`spec.md` §4.8). Implemented as free functions
/// rather than trait methods so they stay generic over every backend
/// without widening the core trait.

/// All values, chronological by `ts`.
pub fn to_value_vec<T: Clone>(source: &impl TimeQueryable<T>) -> Vec<T> {
    source
        .get_in_range(Timestamp::MIN, Timestamp::MAX)
        .expect("MIN..=MAX is always a valid range")
        .into_iter()
        .map(|it| it.value)
        .collect()
}

/// Alias of [`to_value_vec`] — the contract calls this `toValueArray`.
pub fn to_value_array<T: Clone>(source: &impl TimeQueryable<T>) -> Vec<T> {
    to_value_vec(source)
}

pub fn to_value_hash_set<T: Clone + Eq + Hash>(source: &impl TimeQueryable<T>) -> HashSet<T> {
    to_value_vec(source).into_iter().collect()
}

/// Last-wins on duplicate keys, resolved in chronological order.
pub fn to_value_dictionary<T: Clone, K: Eq + Hash, V>(
    source: &impl TimeQueryable<T>,
    key_fn: impl Fn(&T) -> K,
    value_fn: impl Fn(T) -> V,
) -> HashMap<K, V> {
    let mut out = HashMap::new();
    for value in to_value_vec(source) {
        let key = key_fn(&value);
        out.insert(key, value_fn(value));
    }
    out
}

/// Chronological order, front = earliest.
pub fn to_value_queue<T: Clone>(source: &impl TimeQueryable<T>) -> VecDeque<T> {
    to_value_vec(source).into_iter().collect()
}

/// Chronological order, last element = most recently added (stack top).
pub fn to_value_stack<T: Clone>(source: &impl TimeQueryable<T>) -> Vec<T> {
    to_value_vec(source)
}

/// Floors each item's `ts` to the nearest `interval` boundary relative to
/// `alignment`, groups items per bucket, and runs `aggregator` over each
/// bucket's values. Buckets are emitted in chronological order. Fails
/// [`TemporalError::InvalidBucket`] when `interval <= 0`.
pub fn bucket_by<T: Clone, A>(
    source: &impl TimeQueryable<T>,
    interval: Duration,
    alignment: Timestamp,
    aggregator: impl Fn(&[T]) -> A,
) -> Result<Vec<(Timestamp, A)>> {
    let interval_ticks = interval.num_nanoseconds().map(|n| n / 100).unwrap_or(0);
    if interval_ticks <= 0 {
        return Err(TemporalError::InvalidBucket(interval));
    }

    let items = source
        .get_in_range(Timestamp::MIN, Timestamp::MAX)
        .expect("MIN..=MAX is always a valid range");

    let mut buckets: Vec<(i64, Vec<T>)> = Vec::new();
    for it in items {
        let offset = it.timestamp.ticks() - alignment.ticks();
        let bucket_index = offset.div_euclid(interval_ticks);
        let bucket_start = alignment.ticks() + bucket_index * interval_ticks;
        match buckets.last_mut() {
            Some((start, values)) if *start == bucket_start => values.push(it.value),
            _ => buckets.push((bucket_start, vec![it.value])),
        }
    }

    Ok(buckets
        .into_iter()
        .map(|(start, values)| (Timestamp::from_ticks(start), aggregator(&values)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmented_array::SegmentedArray;

    fn ts(n: i64) -> Timestamp {
        Timestamp::from_ticks(n)
    }

    fn seeded() -> SegmentedArray<i32> {
        let array: SegmentedArray<i32> = SegmentedArray::new();
        for (v, t) in [(1, 10), (2, 20), (3, 110), (4, 120)] {
            array.add(crate::item::TemporalItem::new(v, ts(t)));
        }
        array
    }

    #[test]
    fn materializers_project_value_only() {
        let array = seeded();
        assert_eq!(to_value_vec(&array), vec![1, 2, 3, 4]);
        let set = to_value_hash_set(&array);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn dictionary_last_wins_chronologically() {
        let array: SegmentedArray<(&str, i32)> = SegmentedArray::new();
        array.add(crate::item::TemporalItem::new(("a", 1), ts(10)));
        array.add(crate::item::TemporalItem::new(("a", 2), ts(20)));
        let dict = to_value_dictionary(&array, |(k, _)| *k, |(_, v)| v);
        assert_eq!(dict.get("a"), Some(&2));
    }

    #[test]
    fn bucket_by_groups_on_interval_boundaries() {
        let array = seeded();
        // 5 microseconds == 50 ticks: groups (10, 20) into bucket 0 and
        // (110, 120) into bucket 100.
        let buckets = bucket_by(&array, Duration::microseconds(5), ts(0), |vs| vs.len()).unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0], (ts(0), 2));
        assert_eq!(buckets[1], (ts(100), 2));
    }

    #[test]
    fn zero_interval_rejected() {
        let array = seeded();
        let err = bucket_by(&array, Duration::zero(), ts(0), |vs: &[i32]| vs.len()).unwrap_err();
        assert!(matches!(err, TemporalError::InvalidBucket(_)));
    }
}
