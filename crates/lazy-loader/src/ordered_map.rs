//! Ordered Map
//!
//! Insertion-ordered registry with constant-time membership. Used for a
//! node's children and for its per-event subscriber queues.

use std::hash::Hash;

use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct OrderedMap<K, V> {
    entries: IndexMap<K, V>,
}

impl<K: Hash + Eq + Clone, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        Self { entries: IndexMap::new() }
    }

    /// Insert or replace. A replaced key keeps its original position.
    pub fn set(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn has(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove, preserving the order of the remaining entries
    pub fn rm(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key)
    }

    /// Snapshot of the keys in insertion order
    pub fn keys(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Hash + Eq + Clone, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order() {
        let mut map = OrderedMap::new();
        map.set(3, "c");
        map.set(1, "a");
        map.set(2, "b");
        assert_eq!(map.keys(), vec![3, 1, 2]);

        // Replacing keeps the slot
        map.set(3, "z");
        assert_eq!(map.keys(), vec![3, 1, 2]);
        assert_eq!(map.get(&3), Some(&"z"));
    }

    #[test]
    fn test_rm_keeps_order() {
        let mut map = OrderedMap::new();
        for k in 0..5 {
            map.set(k, ());
        }
        assert_eq!(map.rm(&2), Some(()));
        assert_eq!(map.rm(&2), None);
        assert_eq!(map.keys(), vec![0, 1, 3, 4]);
        assert!(!map.has(&2));
        assert_eq!(map.size(), 4);
    }
}
