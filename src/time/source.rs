use std::{
    marker::PhantomData,
    sync::atomic::{AtomicI64, Ordering},
};

use chrono::Utc;

use crate::item::Timestamp;

/// Yields strictly increasing UTC timestamps for a given value-type domain
/// `T`. Successive calls for the same `T` return strictly increasing ticks
/// even under concurrent callers and coarse OS clock resolution; ticks never
/// go backwards even if the wall clock steps backwards.
///
/// There is conceptually "one counter per `T`" (per `spec.md` §4.1, domain
/// isolation avoids cross-type contention). We realize this without a
/// runtime type registry: `now` is a generic function with a function-local
/// `static`, and each monomorphization of a generic function gets its own
/// independent static item, so `TimeSource::<A>::now()` and
/// `TimeSource::<B>::now()` never touch the same counter.
pub struct TimeSource<T> {
    _domain: PhantomData<T>,
}

impl<T> TimeSource<T> {
    /// Returns the next timestamp for this domain, lock-free via CAS.
    pub fn now() -> Timestamp {
        static LAST: AtomicI64 = AtomicI64::new(i64::MIN);
        Self::now_with(&LAST)
    }

    // Split out so tests can exercise the CAS loop against a private counter
    // instead of the real wall clock / the shared domain static.
    fn now_with(counter: &AtomicI64) -> Timestamp {
        let wall = Timestamp::from_datetime(Utc::now()).ticks();
        let mut last = counter.load(Ordering::Relaxed);
        loop {
            let candidate = std::cmp::max(last.saturating_add(1), wall);
            match counter.compare_exchange_weak(
                last,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Timestamp::from_ticks(candidate),
                Err(observed) => last = observed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    enum DomainA {}
    enum DomainB {}

    #[test]
    fn strictly_increasing_single_threaded() {
        let mut last = Timestamp::MIN;
        for _ in 0..1000 {
            let next = TimeSource::<DomainA>::now();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn domains_are_independent() {
        // Just exercises that both compile and run without interfering;
        // actual isolation is a property of separate monomorphized statics.
        let a = TimeSource::<DomainA>::now();
        let b = TimeSource::<DomainB>::now();
        assert!(a.ticks() > 0 || b.ticks() > 0);
    }

    #[test]
    fn strictly_increasing_under_concurrency() {
        let counter = Arc::new(AtomicI64::new(i64::MIN));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                let mut local = Vec::with_capacity(1000);
                for _ in 0..1000 {
                    local.push(TimeSource::<DomainA>::now_with(&counter).ticks());
                }
                local
            }));
        }
        let mut all: Vec<i64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total, "no two calls observed the same tick");
    }
}
