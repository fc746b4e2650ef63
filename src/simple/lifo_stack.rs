use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::{
    error::{Result, TemporalError},
    item::{TemporalItem, Timestamp},
    queryable::TimeQueryable,
    time::TimeSource,
};

/// A stamped LIFO stack. `TimeQueryable` is answered by linear scan, same
/// rationale as [`crate::simple::fifo_queue::TemporalQueue`].
pub struct TemporalStack<T> {
    items: Mutex<VecDeque<TemporalItem<T>>>,
}

impl<T: Clone> TemporalStack<T> {
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

    /// Stamps `value` via [`TimeSource`] and pushes it on top.
    pub fn push(&self, value: T) {
        let timestamp = TimeSource::<T>::now();
        self.items.lock().push_back(TemporalItem::new(value, timestamp));
    }

    pub fn try_peek(&self) -> Option<TemporalItem<T>> {
        self.items.lock().back().cloned()
    }

    pub fn try_pop(&self) -> Option<TemporalItem<T>> {
        self.items.lock().pop_back()
    }

    pub fn peek(&self) -> Result<TemporalItem<T>> {
        self.try_peek().ok_or(TemporalError::EmptyContainer)
    }

    pub fn pop(&self) -> Result<TemporalItem<T>> {
        self.try_pop().ok_or(TemporalError::EmptyContainer)
    }
}

impl<T: Clone> Default for TemporalStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> TimeQueryable<T> for TemporalStack<T> {
    fn get_in_range(&self, from: Timestamp, to: Timestamp) -> Result<Vec<TemporalItem<T>>> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let mut out: Vec<_> = self
            .items
            .lock()
            .iter()
            .filter(|it| it.timestamp >= from && it.timestamp <= to)
            .cloned()
            .collect();
        out.sort_by_key(|it| it.timestamp);
        Ok(out)
    }

    fn get_before(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        let mut out: Vec<_> = self.items.lock().iter().filter(|it| it.timestamp < t).cloned().collect();
        out.sort_by_key(|it| it.timestamp);
        out
    }

    fn get_after(&self, t: Timestamp) -> Vec<TemporalItem<T>> {
        let mut out: Vec<_> = self.items.lock().iter().filter(|it| it.timestamp > t).cloned().collect();
        out.sort_by_key(|it| it.timestamp);
        out
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
    fn lifo_order() {
        let s: TemporalStack<i32> = TemporalStack::new();
        s.push(1);
        s.push(2);
        s.push(3);
        assert_eq!(s.pop().unwrap().value, 3);
        assert_eq!(s.pop().unwrap().value, 2);
        assert_eq!(s.pop().unwrap().value, 1);
    }

    #[test]
    fn empty_pop_fails() {
        let s: TemporalStack<i32> = TemporalStack::new();
        assert!(s.try_pop().is_none());
        assert_eq!(s.pop().unwrap_err(), TemporalError::EmptyContainer);
    }
}
