//! Bounded key -> count table with least-recently-used eviction.
//!
//! Every dimension the aggregator tracks (source IPs, query names, ports, ...)
//! is one of these. Memory stays at `capacity` entries no matter how many
//! distinct keys go by, which is what keeps a random-subdomain flood from
//! eating the host. Entries live in a slab threaded by a doubly linked recency
//! list; the hash index maps keys to slab slots, so `touch` is O(1).

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use std::mem;

/// Slab index meaning "no node".
const NIL: usize = usize::MAX;

/// One ranked row handed out by [`CounterTable::top_n`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterEntry<K> {
    pub key: K,
    pub count: u64,
}

#[derive(Debug)]
struct Node<K> {
    key: K,
    count: u64,
    prev: usize,
    next: usize,
}

/// A capacity-bounded counter table.
#[derive(Debug)]
pub struct CounterTable<K> {
    capacity: usize,
    index: HashMap<K, usize>,
    nodes: Vec<Node<K>>,
    // most recently touched
    head: usize,
    // least recently touched, next to go
    tail: usize,
    evictions: u64,
}

impl<K> CounterTable<K>
where
    K: Hash + Eq + Clone,
{
    /// Creates an empty table holding at most `capacity` keys.
    ///
    /// A capacity of zero is treated as one; configuration rejects zero before
    /// it gets here.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            index: HashMap::with_capacity(capacity.min(16_384)),
            nodes: Vec::with_capacity(capacity.min(16_384)),
            head: NIL,
            tail: NIL,
            evictions: 0,
        }
    }

    /// Counts one occurrence of `key` and returns its new count.
    ///
    /// A known key moves to the most-recently-used position. An unknown key is
    /// inserted there with a count of one; if the table is full, the
    /// least-recently-used entry is evicted (and its count forgotten) to make
    /// room.
    pub fn touch<Q>(&mut self, key: &Q) -> u64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(&slot) = self.index.get(key) {
            let node = &mut self.nodes[slot];
            node.count = node.count.saturating_add(1);
            let count = node.count;
            if self.head != slot {
                self.detach(slot);
                self.push_front(slot);
            }
            return count;
        }

        let owned = key.to_owned();
        let slot = if self.nodes.len() < self.capacity {
            self.nodes.push(Node {
                key: owned.clone(),
                count: 1,
                prev: NIL,
                next: NIL,
            });
            self.nodes.len() - 1
        } else {
            // Full: recycle the least-recently-used slot for the new key.
            let slot = self.tail;
            self.detach(slot);
            let evicted = mem::replace(&mut self.nodes[slot].key, owned.clone());
            self.nodes[slot].count = 1;
            self.index.remove::<K>(&evicted);
            self.evictions += 1;
            slot
        };

        self.index.insert(owned, slot);
        self.push_front(slot);
        1
    }

    /// Current count for `key`, without touching its recency.
    pub fn get<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&slot| self.nodes[slot].count)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries pushed out to make room since creation (or the last `clear`).
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Drops every entry. Capacity is kept.
    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.head = NIL;
        self.tail = NIL;
        self.evictions = 0;
    }

    /// Walks entries from most to least recently touched.
    pub fn iter(&self) -> RecencyIter<'_, K> {
        RecencyIter {
            table: self,
            cursor: self.head,
        }
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = self.head;
        if self.head == NIL {
            self.tail = slot;
        } else {
            self.nodes[self.head].prev = slot;
        }
        self.head = slot;
    }
}

impl<K> CounterTable<K>
where
    K: Hash + Eq + Clone + Ord,
{
    /// Up to `n` entries ranked by count, highest first.
    ///
    /// The table is only read: recency order is left exactly as it was. Equal
    /// counts are ordered by key ascending so that snapshots are reproducible.
    pub fn top_n(&self, n: usize) -> Vec<CounterEntry<K>> {
        if n == 0 || self.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<(&K, u64)> = self
            .nodes
            .iter()
            .map(|node| (&node.key, node.count))
            .collect();

        if n < ranked.len() {
            ranked.select_nth_unstable_by(n, rank_order);
            ranked.truncate(n);
        }
        ranked.sort_unstable_by(rank_order);

        ranked
            .into_iter()
            .map(|(key, count)| CounterEntry {
                key: key.clone(),
                count,
            })
            .collect()
    }
}

fn rank_order<K: Ord>(a: &(&K, u64), b: &(&K, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// Iterator returned by [`CounterTable::iter`].
pub struct RecencyIter<'a, K> {
    table: &'a CounterTable<K>,
    cursor: usize,
}

impl<'a, K> Iterator for RecencyIter<'a, K> {
    type Item = (&'a K, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let node = &self.table.nodes[self.cursor];
        self.cursor = node.next;
        Some((&node.key, node.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn keys(table: &CounterTable<String>) -> Vec<String> {
        table.iter().map(|(k, _)| k.clone()).collect()
    }

    #[test]
    fn test_oldest_key_evicted_first() {
        let mut table = CounterTable::<String>::new(3);
        for key in ["a", "b", "c", "d"] {
            table.touch(key);
        }

        assert_eq!(table.len(), 3);
        assert!(!table.contains("a"));
        assert_eq!(keys(&table), vec!["d", "c", "b"]);
        assert_eq!(table.evictions(), 1);
    }

    #[test]
    fn test_retouch_protects_from_eviction() {
        let mut table = CounterTable::<String>::new(3);
        for key in ["a", "b", "c", "a", "d"] {
            table.touch(key);
        }

        assert!(!table.contains("b"));
        assert_eq!(table.get("a"), Some(2));
        assert_eq!(table.get("c"), Some(1));
        assert_eq!(table.get("d"), Some(1));
    }

    #[test]
    fn test_count_accumulates() {
        let mut table = CounterTable::<Ipv4Addr>::new(10);
        let addr = Ipv4Addr::new(192, 0, 2, 1);
        let mut last = 0;
        for _ in 0..25 {
            last = table.touch(&addr);
        }
        assert_eq!(last, 25);
        assert_eq!(table.get(&addr), Some(25));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let mut table = CounterTable::<u16>::new(64);
        for port in 0..10_000u16 {
            table.touch(&port);
            assert!(table.len() <= 64);
        }
        assert_eq!(table.len(), 64);
        assert_eq!(table.evictions(), 10_000 - 64);
        // survivors are the 64 most recent
        assert!(table.contains(&9_999u16));
        assert!(table.contains(&9_936u16));
        assert!(!table.contains(&9_935u16));
    }

    #[test]
    fn test_capacity_one() {
        let mut table = CounterTable::<String>::new(1);
        table.touch("x");
        table.touch("x");
        table.touch("y");
        assert_eq!(keys(&table), vec!["y"]);
        assert_eq!(table.get("y"), Some(1));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut table = CounterTable::<String>::new(0);
        assert_eq!(table.capacity(), 1);
        table.touch("only");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_top_n_ranks_by_count_then_key() {
        let mut table = CounterTable::<String>::new(10);
        for key in ["b", "a", "c", "c", "c", "d", "d", "a"] {
            table.touch(key);
        }

        let top = table.top_n(10);
        let rows: Vec<(&str, u64)> = top.iter().map(|e| (e.key.as_str(), e.count)).collect();
        assert_eq!(rows, vec![("c", 3), ("a", 2), ("d", 2), ("b", 1)]);

        let top2 = table.top_n(2);
        assert_eq!(top2.len(), 2);
        assert_eq!(top2[0].key, "c");
        assert_eq!(top2[1].key, "a");
    }

    #[test]
    fn test_top_n_does_not_disturb_recency() {
        let mut table = CounterTable::<String>::new(3);
        for key in ["a", "a", "a", "b", "c"] {
            table.touch(key);
        }
        let before = keys(&table);
        let _ = table.top_n(3);
        assert_eq!(keys(&table), before);

        // "a" is still the eviction candidate even though it ranks first
        table.touch("d");
        assert!(!table.contains("a"));
    }

    #[test]
    fn test_top_n_on_empty_and_zero() {
        let mut table = CounterTable::<String>::new(4);
        assert!(table.top_n(5).is_empty());
        table.touch("k");
        assert!(table.top_n(0).is_empty());
    }

    #[test]
    fn test_empty_string_is_a_key() {
        let mut table = CounterTable::<String>::new(4);
        table.touch("");
        table.touch("");
        assert_eq!(table.get(""), Some(2));
        assert_eq!(table.top_n(1)[0].key, "");
    }

    #[test]
    fn test_clear_resets() {
        let mut table = CounterTable::<String>::new(2);
        for key in ["a", "b", "c"] {
            table.touch(key);
        }
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.evictions(), 0);
        assert_eq!(table.iter().count(), 0);
        table.touch("z");
        assert_eq!(keys(&table), vec!["z"]);
    }
}
