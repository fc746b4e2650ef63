use std::num::NonZeroU32;
use std::ops::{Index, IndexMut};

use fastrand::Rng;
use parking_lot::Mutex;
use slab::Slab;

use crate::{
    error::{Result, TemporalError},
    item::{TemporalItem, Timestamp},
    queryable::TimeQueryable,
};

/// A half-open-free, fully inclusive interval `[start, end]` in tick space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    start: Timestamp,
    end: Timestamp,
}

impl Interval {
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self> {
        if end < start {
            return Err(TemporalError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    fn overlaps(&self, qs: Timestamp, qe: Timestamp) -> bool {
        self.start <= qe && self.end >= qs
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct NodeKey(NonZeroU32);

impl NodeKey {
    fn new(index: usize) -> Self {
        NonZeroU32::new(u32::try_from(index + 1).expect("interval tree overflowed u32 node count"))
            .map(Self)
            .expect("index + 1 is never zero")
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

impl<V> Index<NodeKey> for Slab<Node<V>> {
    type Output = Node<V>;

    fn index(&self, key: NodeKey) -> &Self::Output {
        &self[key.index()]
    }
}

impl<V> IndexMut<NodeKey> for Slab<Node<V>> {
    fn index_mut(&mut self, key: NodeKey) -> &mut Self::Output {
        &mut self[key.index()]
    }
}

struct Node<V> {
    weight: u32,
    interval: Interval,
    value: V,
    parent: Option<NodeKey>,
    child: [Option<NodeKey>; 2],
    /// Points at the node with the largest `interval.end` in this subtree.
    max_end: NodeKey,
}

impl<V> Node<V> {
    fn replace_child(&mut self, from: NodeKey, to: Option<NodeKey>) {
        if self.child[0] == Some(from) {
            self.child[0] = to;
        } else {
            debug_assert_eq!(self.child[1], Some(from));
            self.child[1] = to;
        }
    }
}

/// An interval index with overlap queries against a query range, keyed by
/// `interval.start` (`spec.md` §4.6). Implemented as an arena-backed treap:
/// BST order on `start`, min-heap order on a randomized `weight`, with a
/// `max_end` annotation refreshed on every mutation so overlap queries can
/// prune whole subtrees.
pub struct IntervalTree<V> {
    inner: Mutex<Inner<V>>,
}

struct Inner<V> {
    nodes: Slab<Node<V>>,
    root: Option<NodeKey>,
    rng: Rng,
}

impl<V: Clone> IntervalTree<V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                nodes: Slab::new(),
                root: None,
                rng: Rng::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts `(start, end, value)`, failing [`TemporalError::InvalidInterval`]
    /// if `end < start`. A no-op if an identical `(start, end)` pair
    /// carrying an equal value (per [`PartialEq`]) is already present.
    pub fn insert(&self, start: Timestamp, end: Timestamp, value: V) -> Result<()>
    where
        V: PartialEq,
    {
        let interval = Interval::new(start, end)?;
        let mut inner = self.inner.lock();
        if inner.contains_exact(interval, &value) {
            return Ok(());
        }
        let weight = inner.rng.u32(..);
        let entry = inner.nodes.vacant_entry();
        let key = NodeKey::new(entry.key());
        entry.insert(Node {
            weight,
            interval,
            value,
            parent: None,
            child: [None, None],
            max_end: key,
        });
        inner.root = Some(match inner.root {
            None => key,
            Some(root) => inner.insert_node(root, interval.start, key),
        });
        Ok(())
    }

    /// Removes the first node matching `(start, end, value)` exactly.
    pub fn remove(&self, start: Timestamp, end: Timestamp, value: &V) -> Result<bool>
    where
        V: PartialEq,
    {
        let interval = Interval::new(start, end)?;
        let mut inner = self.inner.lock();
        let Some(key) = inner.find_exact(interval, value) else {
            return Ok(false);
        };
        inner.remove_node(key);
        Ok(true)
    }

    /// Values whose interval overlaps `[qs, qe]`.
    pub fn query(&self, qs: Timestamp, qe: Timestamp) -> Result<Vec<V>> {
        if qs > qe {
            return Err(TemporalError::InvalidRange { from: qs, to: qe });
        }
        let inner = self.inner.lock();
        let mut out = Vec::new();
        inner.query_subtree(inner.root, qs, qe, &mut |node| out.push(node.value.clone()));
        Ok(out)
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        let inner = self.inner.lock();
        if let Some(root) = inner.root {
            assert_eq!(inner.nodes[root].parent, None);
            let (_, count) = inner.check_invariants_at(root, Timestamp::MIN, Timestamp::MAX);
            assert_eq!(count, inner.nodes.len());
        }
    }
}

impl<V: Clone> Default for IntervalTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Inner<V> {
    fn contains_exact(&self, interval: Interval, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.find_exact(interval, value).is_some()
    }

    /// Linear scan for the node matching `(interval, value)` exactly. A
    /// treap only orders by `start`, so exact-duplicate lookup can't be
    /// pruned below the first matching `start` without risking missed
    /// duplicates on the other side of an equal-key split; `insert`/`remove`
    /// are not hot-path operations the way overlap queries are.
    fn find_exact(&self, interval: Interval, value: &V) -> Option<NodeKey>
    where
        V: PartialEq,
    {
        let mut order = Vec::new();
        self.in_order(self.root, &mut order);
        order
            .into_iter()
            .find(|&k| self.nodes[k].interval == interval && self.nodes[k].value == *value)
    }

    fn insert_node(&mut self, parent: NodeKey, key: Timestamp, node: NodeKey) -> NodeKey {
        if self.nodes[node].weight < self.nodes[parent].weight {
            let (l, r) = self.split(parent, key);
            self.nodes[node].child = [l, r];
            if let Some(l) = l {
                self.nodes[l].parent = Some(node);
            }
            if let Some(r) = r {
                self.nodes[r].parent = Some(node);
            }
            self.recalculate_annotation(node);
            return node;
        }
        let side = usize::from(key >= self.nodes[parent].interval.start);
        let inserted = if let Some(child) = self.nodes[parent].child[side] {
            self.insert_node(child, key, node)
        } else {
            node
        };
        self.nodes[parent].child[side] = Some(inserted);
        self.nodes[inserted].parent = Some(parent);
        self.recalculate_annotation(parent);
        parent
    }

    /// Splits the subtree at `node` into `(<= key, > key)`.
    fn split(&mut self, node: NodeKey, key: Timestamp) -> (Option<NodeKey>, Option<NodeKey>) {
        if self.nodes[node].interval.start <= key {
            if let Some(child) = self.nodes[node].child[1] {
                let (r0, r1) = self.split(child, key);
                self.nodes[node].child[1] = r0;
                if let Some(r0) = r0 {
                    self.nodes[r0].parent = Some(node);
                }
                self.recalculate_annotation(node);
                (Some(node), r1)
            } else {
                (Some(node), None)
            }
        } else {
            if let Some(child) = self.nodes[node].child[0] {
                let (l0, l1) = self.split(child, key);
                self.nodes[node].child[0] = l1;
                if let Some(l1) = l1 {
                    self.nodes[l1].parent = Some(node);
                }
                self.recalculate_annotation(node);
                (l0, Some(node))
            } else {
                (None, Some(node))
            }
        }
    }

    fn remove_node(&mut self, n: NodeKey) {
        let merged = self.merge(self.nodes[n].child[0], self.nodes[n].child[1]);
        let parent = self.nodes[n].parent;
        if let Some(c) = merged {
            self.nodes[c].parent = parent;
        }
        if let Some(p) = parent {
            self.nodes[p].replace_child(n, merged);
            self.recalculate_to_root(p);
        } else {
            self.root = merged;
        }
        self.nodes.remove(n.index());
    }

    /// Merges two subtrees where every key under `n` is `<=` every key under `m`.
    fn merge(&mut self, n: Option<NodeKey>, m: Option<NodeKey>) -> Option<NodeKey> {
        let (n, m) = match (n, m) {
            (None, m) => return m,
            (n, None) => return n,
            (Some(n), Some(m)) => (n, m),
        };
        if self.nodes[n].weight <= self.nodes[m].weight {
            let right = self.merge(self.nodes[n].child[1], Some(m));
            self.nodes[n].child[1] = right;
            if let Some(r) = right {
                self.nodes[r].parent = Some(n);
            }
            self.recalculate_annotation(n);
            Some(n)
        } else {
            let left = self.merge(Some(n), self.nodes[m].child[0]);
            self.nodes[m].child[0] = left;
            if let Some(l) = left {
                self.nodes[l].parent = Some(m);
            }
            self.recalculate_annotation(m);
            Some(m)
        }
    }

    fn recalculate_annotation(&mut self, node: NodeKey) {
        let mut best = node;
        for child in self.nodes[node].child.into_iter().flatten() {
            let candidate = self.nodes[child].max_end;
            if self.nodes[candidate].interval.end > self.nodes[best].interval.end {
                best = candidate;
            }
        }
        self.nodes[node].max_end = best;
    }

    fn recalculate_to_root(&mut self, node: NodeKey) {
        let mut cursor = Some(node);
        while let Some(n) = cursor {
            self.recalculate_annotation(n);
            cursor = self.nodes[n].parent;
        }
    }

    fn max_end_of(&self, node: Option<NodeKey>) -> Option<Timestamp> {
        node.map(|n| self.nodes[self.nodes[n].max_end].interval.end)
    }

    fn query_subtree(
        &self,
        node: Option<NodeKey>,
        qs: Timestamp,
        qe: Timestamp,
        cb: &mut impl FnMut(&Node<V>),
    ) {
        let Some(node) = node else {
            return;
        };
        if self.max_end_of(Some(node)).unwrap() < qs {
            return;
        }
        let n = &self.nodes[node];
        if n.interval.start <= qe {
            self.query_subtree(n.child[0], qs, qe, cb);
            if n.interval.overlaps(qs, qe) {
                cb(n);
            }
            self.query_subtree(n.child[1], qs, qe, cb);
        } else {
            self.query_subtree(n.child[0], qs, qe, cb);
        }
    }

    fn leftmost(&self, mut node: NodeKey) -> NodeKey {
        while let Some(l) = self.nodes[node].child[0] {
            node = l;
        }
        node
    }

    fn rightmost(&self, mut node: NodeKey) -> NodeKey {
        while let Some(r) = self.nodes[node].child[1] {
            node = r;
        }
        node
    }

    fn in_order(&self, node: Option<NodeKey>, out: &mut Vec<NodeKey>) {
        let Some(node) = node else {
            return;
        };
        self.in_order(self.nodes[node].child[0], out);
        out.push(node);
        self.in_order(self.nodes[node].child[1], out);
    }

    #[cfg(test)]
    fn check_invariants_at(
        &self,
        n: NodeKey,
        lo: Timestamp,
        hi: Timestamp,
    ) -> (NodeKey, usize) {
        let node = &self.nodes[n];
        assert!(node.interval.start >= lo && node.interval.start <= hi);
        let mut max_end_node = n;
        let mut count = 1;
        if let Some(l) = node.child[0] {
            assert_eq!(self.nodes[l].parent, Some(n));
            assert!(self.nodes[l].weight >= node.weight);
            let (cand, c) = self.check_invariants_at(l, lo, node.interval.start);
            count += c;
            if self.nodes[cand].interval.end > self.nodes[max_end_node].interval.end {
                max_end_node = cand;
            }
        }
        if let Some(r) = node.child[1] {
            assert_eq!(self.nodes[r].parent, Some(n));
            assert!(self.nodes[r].weight >= node.weight);
            let (cand, c) = self.check_invariants_at(r, node.interval.start, hi);
            count += c;
            if self.nodes[cand].interval.end > self.nodes[max_end_node].interval.end {
                max_end_node = cand;
            }
        }
        assert_eq!(
            self.nodes[self.nodes[n].max_end].interval.end,
            self.nodes[max_end_node].interval.end
        );
        (max_end_node, count)
    }
}

impl<V: Clone> TimeQueryable<V> for IntervalTree<V> {
    fn get_in_range(&self, from: Timestamp, to: Timestamp) -> Result<Vec<TemporalItem<V>>> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let inner = self.inner.lock();
        let mut out = Vec::new();
        inner.query_subtree(inner.root, from, to, &mut |node| {
            out.push(TemporalItem::new(node.value.clone(), node.interval.start));
        });
        out.sort_by_key(|it| it.timestamp);
        Ok(out)
    }

    fn get_before(&self, t: Timestamp) -> Vec<TemporalItem<V>> {
        let inner = self.inner.lock();
        let mut order = Vec::new();
        inner.in_order(inner.root, &mut order);
        order
            .into_iter()
            .map(|k| &inner.nodes[k])
            .filter(|n| n.interval.start < t)
            .map(|n| TemporalItem::new(n.value.clone(), n.interval.start))
            .collect()
    }

    fn get_after(&self, t: Timestamp) -> Vec<TemporalItem<V>> {
        let inner = self.inner.lock();
        let mut order = Vec::new();
        inner.in_order(inner.root, &mut order);
        order
            .into_iter()
            .map(|k| &inner.nodes[k])
            .filter(|n| n.interval.start > t)
            .map(|n| TemporalItem::new(n.value.clone(), n.interval.start))
            .collect()
    }

    fn count_since(&self, from: Timestamp) -> usize {
        let inner = self.inner.lock();
        let mut order = Vec::new();
        inner.in_order(inner.root, &mut order);
        order
            .into_iter()
            .filter(|k| inner.nodes[*k].interval.start >= from)
            .count()
    }

    fn get_earliest(&self) -> Option<TemporalItem<V>> {
        let inner = self.inner.lock();
        let root = inner.root?;
        let k = inner.leftmost(root);
        let n = &inner.nodes[k];
        Some(TemporalItem::new(n.value.clone(), n.interval.start))
    }

    fn get_latest(&self) -> Option<TemporalItem<V>> {
        let inner = self.inner.lock();
        let root = inner.root?;
        let k = inner.rightmost(root);
        let n = &inner.nodes[k];
        Some(TemporalItem::new(n.value.clone(), n.interval.start))
    }

    /// Tie policy: unlike the other backends, prefers the later (in-order
    /// successor) item on an exact tie — see `DESIGN.md`.
    fn get_nearest(&self, t: Timestamp) -> Option<TemporalItem<V>> {
        let inner = self.inner.lock();
        let mut order = Vec::new();
        inner.in_order(inner.root, &mut order);
        if order.is_empty() {
            return None;
        }
        let starts: Vec<Timestamp> = order.iter().map(|k| inner.nodes[*k].interval.start).collect();
        let pos = starts.partition_point(|&s| s < t);
        let after = order.get(pos);
        let before = pos.checked_sub(1).and_then(|i| order.get(i));
        let chosen = match (before, after) {
            (Some(&b), Some(&a)) => {
                let db = (t.ticks() - inner.nodes[b].interval.start.ticks()).abs();
                let da = (inner.nodes[a].interval.start.ticks() - t.ticks()).abs();
                if da <= db { a } else { b }
            },
            (Some(&b), None) => b,
            (None, Some(&a)) => a,
            (None, None) => return None,
        };
        let n = &inner.nodes[chosen];
        Some(TemporalItem::new(n.value.clone(), n.interval.start))
    }

    fn remove_older_than(&self, cutoff: Timestamp) {
        let mut inner = self.inner.lock();
        loop {
            let mut order = Vec::new();
            inner.in_order(inner.root, &mut order);
            let Some(&target) = order.iter().find(|&&k| inner.nodes[k].interval.end < cutoff) else {
                break;
            };
            inner.remove_node(target);
        }
    }

    fn remove_range(&self, from: Timestamp, to: Timestamp) -> Result<()> {
        if from > to {
            return Err(TemporalError::InvalidRange { from, to });
        }
        let mut inner = self.inner.lock();
        loop {
            let mut order = Vec::new();
            inner.in_order(inner.root, &mut order);
            let Some(&target) = order
                .iter()
                .find(|&&k| inner.nodes[k].interval.start >= from && inner.nodes[k].interval.start <= to)
            else {
                break;
            };
            inner.remove_node(target);
        }
        Ok(())
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.nodes.clear();
        inner.root = None;
    }
}


/// Differential model-based test: every action is applied to both the real
/// `IntervalTree` and a brute-force reference model; their query answers
/// must agree after every step. Grounded on the `Model`/`Action`/`Test`
/// harness used by the arena treap this module's mechanics were learned
/// from (`interval_map`'s proptest suite).
#[cfg(test)]
mod proptest_model {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;
    use crate::test_support::env_config;

    fn ts(n: i64) -> Timestamp {
        Timestamp::from_ticks(n)
    }

    #[derive(Default)]
    struct Model {
        entries: BTreeMap<u64, (i64, i64, i32)>,
        next_id: u64,
    }

    impl Model {
        fn insert(&mut self, start: i64, end: i64, value: i32) -> u64 {
            let id = self.next_id;
            self.next_id += 1;
            self.entries.insert(id, (start, end, value));
            id
        }

        fn remove(&mut self, id: u64) {
            self.entries.remove(&id);
        }

        fn overlapping(&self, qs: i64, qe: i64) -> Vec<i32> {
            let mut out: Vec<_> = self
                .entries
                .values()
                .filter(|(s, e, _)| *s <= qe && *e >= qs)
                .map(|(_, _, v)| *v)
                .collect();
            out.sort_unstable();
            out
        }
    }

    #[derive(Debug, Clone)]
    enum Action {
        Insert { start: i64, len: u16, value: i32 },
        Remove(u64),
        Query { start: i64, len: u16 },
    }

    fn action_strategy() -> impl Strategy<Value = Action> {
        prop_oneof![
            (-1000i64..1000, 0u16..200, any::<i32>())
                .prop_map(|(start, len, value)| Action::Insert { start, len, value }),
            any::<u64>().prop_map(Action::Remove),
            (-1000i64..1000, 0u16..200).prop_map(|(start, len)| Action::Query { start, len }),
        ]
    }

    struct Test {
        tree: IntervalTree<i32>,
        model: Model,
        ids: Vec<(u64, i64, i64, i32)>,
    }

    impl Default for Test {
        fn default() -> Self {
            Self {
                tree: IntervalTree::new(),
                model: Model::default(),
                ids: Vec::new(),
            }
        }
    }

    impl Test {
        fn execute(&mut self, action: Action) {
            match action {
                Action::Insert { start, len, value } => {
                    let end = start + len as i64;
                    self.tree.insert(ts(start), ts(end), value).unwrap();
                    let id = self.model.insert(start, end, value);
                    self.ids.push((id, start, end, value));
                    self.tree.check_invariants();
                },
                Action::Remove(slot) => {
                    if self.ids.is_empty() {
                        return;
                    }
                    let i = (slot as usize) % self.ids.len();
                    let (id, start, end, value) = self.ids.swap_remove(i);
                    self.tree.remove(ts(start), ts(end), &value).unwrap();
                    self.model.remove(id);
                    self.tree.check_invariants();
                },
                Action::Query { start, len } => {
                    let end = start + len as i64;
                    let mut got = self.tree.query(ts(start), ts(end)).unwrap();
                    got.sort_unstable();
                    assert_eq!(got, self.model.overlapping(start, end));
                },
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 32 * env_config("TEMPORAL_CONTAINERS_PROPTEST_MULTIPLIER", 1),
            failure_persistence: None,
            .. ProptestConfig::default()
        })]
        #[test]
        fn agrees_with_brute_force_model(actions in prop::collection::vec(action_strategy(), 1..64)) {
            let mut test = Test::default();
            for action in actions {
                test.execute(action);
            }
        }
    }
}
