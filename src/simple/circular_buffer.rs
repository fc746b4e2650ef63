use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::{
    error::{Result, TemporalError},
    item::{TemporalItem, Timestamp},
    queryable::TimeQueryable,
    time::TimeSource,
};

/// Constructor options for [`CircularBuffer`] (`spec.md` §6).
#[derive(Clone, Copy, Debug)]
pub struct CircularBufferConfig {
    pub capacity: usize,
}

/// A fixed-capacity ring: on overflow the oldest item is overwritten
/// (`spec.md` §4, "CircularBuffer").
pub struct CircularBuffer<T> {
    items: Mutex<VecDeque<TemporalItem<T>>>,
    capacity: usize,
}

impl<T: Clone> CircularBuffer<T> {
    pub fn try_with_config(config: CircularBufferConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(TemporalError::ConstructionInvalid("capacity must be positive"));
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(config.capacity)),
            capacity: config.capacity,
        })
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stamps `value` via [`TimeSource`] and pushes it, overwriting the
    /// oldest item if the buffer is already at capacity.
    pub fn add_value(&self, value: T) {
        let timestamp = TimeSource::<T>::now();
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            items.pop_front();
        }
        items.push_back(TemporalItem::new(value, timestamp));
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().iter().map(|it| it.value.clone()).collect()
    }
}

impl<T: Clone> TimeQueryable<T> for CircularBuffer<T> {
    fn get_in_range(&self, from: Timestamp, to: Timestamp) -> Result<Vec<TemporalItem<T>>> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        Ok(self
            .items
            .lock()
            .iter()
            .filter(|it| it.timestamp >= from && it.timestamp <= to)
            .cloned()
            .collect())
    }

    fn get_before(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        self.items.lock().iter().filter(|it| it.timestamp < t).cloned().collect()
    }

    fn get_after(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        self.items.lock().iter().filter(|it| it.timestamp > t).cloned().collect()
    }

    fn count_since(&self, from: Timestamp) -> usize {
        self.items.lock().iter().filter(|it| it.timestamp >= from).count()
    }

    fn get_earliest(&self) -> Option<TemporalItem<T>> {
        self.items.lock().front().cloned()
    }

    fn get_latest(&self) -> Option<TemporalItem<T>> {
        self.items.lock().back().cloned()
    }

    fn get_nearest(&self, t: Timestamp) -> Option<TemporalItem<T>> {
        self.items
            .lock()
            .iter()
            .min_by_key(|it| ((it.timestamp.ticks() - t.ticks()).abs(), it.timestamp.ticks()))
            .cloned()
    }

    fn remove_older_than(&self, t: Timestamp) {
        self.items.lock().retain(|it| it.timestamp >= t);
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
