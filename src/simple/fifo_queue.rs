use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::{
    error::{Result, TemporalError},
    item::{TemporalItem, Timestamp},
    queryable::TimeQueryable,
    time::TimeSource,
};

/// A stamped FIFO queue. `TimeQueryable` is answered by linear scan: FIFO
/// depths are not expected to need segment-tree-grade range queries
/// (`spec.md` §2, "simple backends").
pub struct TemporalQueue<T> {
    items: Mutex<VecDeque<TemporalItem<T>>>,
}

impl<T: Clone> TemporalQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stamps `value` via [`TimeSource`] and pushes it to the back.
    pub fn enqueue(&self, value: T) {
        let timestamp = TimeSource::<T>::now();
        self.items.lock().push_back(TemporalItem::new(value, timestamp));
    }

    pub fn try_peek(&self) -> Option<TemporalItem<T>> {
        self.items.lock().front().cloned()
    }

    pub fn try_dequeue(&self) -> Option<TemporalItem<T>> {
        self.items.lock().pop_front()
    }

    pub fn peek(&self) -> Result<TemporalItem<T>> {
        self.try_peek().ok_or(TemporalError::EmptyContainer)
    }

    pub fn dequeue(&self) -> Result<TemporalItem<T>> {
        self.try_dequeue().ok_or(TemporalError::EmptyContainer)
    }
}

impl<T: Clone> Default for TemporalQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> TimeQueryable<T> for TemporalQueue<T> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let q: TemporalQueue<i32> = TemporalQueue::new();
        q.enqueue(1);
        q.enqueue(2);
        q.enqueue(3);
        assert_eq!(q.dequeue().unwrap().value, 1);
        assert_eq!(q.dequeue().unwrap().value, 2);
        assert_eq!(q.dequeue().unwrap().value, 3);
    }

    #[test]
    fn empty_dequeue_fails() {
        let q: TemporalQueue<i32> = TemporalQueue::new();
        assert!(q.try_dequeue().is_none());
        assert_eq!(q.dequeue().unwrap_err(), TemporalError::EmptyContainer);
    }
}
