//! Microbenchmarks for the hot paths of each backend. Grounded on
//! `interval_map/benches/bench.rs`'s `divan`-based harness (minus its
//! `tikv-jemallocator` global allocator, which isn't part of this crate's
//! dependency stack).
use std::hint::black_box;

use temporal_containers::{
    item::{TemporalItem, Timestamp},
    IntervalTree, SegmentedArray, TemporalMultimap, TemporalPriorityQueue,
};

fn main() {
    divan::main();
}

fn ts(n: i64) -> Timestamp {
    Timestamp::from_ticks(n)
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn segmented_array_append(bencher: divan::Bencher, n: i64) {
    bencher.bench(|| {
        let array: SegmentedArray<i64> = SegmentedArray::new();
        for i in 0..black_box(n) {
            array.add_value(i);
        }
        array
    });
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn segmented_array_positional_insert(bencher: divan::Bencher, n: i64) {
    let array: SegmentedArray<i64> = SegmentedArray::new();
    for i in 0..n {
        array.add(TemporalItem::new(i, ts(i * 2)));
    }
    bencher.bench(|| {
        // Back-dated insert forces a binary search and possible segment split.
        array.add(TemporalItem::new(black_box(-1), ts(1)));
    });
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn interval_tree_insert(bencher: divan::Bencher, n: i64) {
    bencher.bench(|| {
        let tree: IntervalTree<i64> = IntervalTree::new();
        for i in 0..black_box(n) {
            tree.insert(ts(i), ts(i + 10), i).unwrap();
        }
        tree
    });
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn interval_tree_query(bencher: divan::Bencher, n: i64) {
    let tree: IntervalTree<i64> = IntervalTree::new();
    for i in 0..n {
        tree.insert(ts(i), ts(i + 10), i).unwrap();
    }
    bencher.bench(|| tree.query(ts(black_box(n / 2)), ts(n / 2 + 5)).unwrap());
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn multimap_add(bencher: divan::Bencher, n: i64) {
    bencher.bench(|| {
        let map: TemporalMultimap<u8, i64> = TemporalMultimap::new();
        for i in 0..black_box(n) {
            map.add((i % 16) as u8, TemporalItem::new(i, ts(i)));
        }
        map
    });
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn priority_queue_enqueue_dequeue(bencher: divan::Bencher, n: i64) {
    bencher.bench(|| {
        let queue: TemporalPriorityQueue<i64, i64> = TemporalPriorityQueue::new();
        for i in 0..black_box(n) {
            queue.enqueue(i, i % 32);
        }
        while queue.try_dequeue().is_some() {}
    });
}
