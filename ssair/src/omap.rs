//! Insertion-ordered associative container.
//!
//! [`OrderedMap`] backs the member, variable and mask tables of a value. Keys
//! iterate in insertion order, and [`OrderedMap::bring_key_to_last`] lets a
//! caller promote a key to the "most recent" position without losing the rest
//! of the history. Lookups go through a `BTreeMap` index, positional access
//! through the ordered key list.
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A map that remembers the order in which keys were first inserted.
///
/// ```rust
/// # use ssair::omap::OrderedMap;
/// let mut map = OrderedMap::new();
/// map.set("a", 1);
/// map.set("b", 2);
/// map.set("a", 3);
/// assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec!["a", "b"]);
///
/// map.bring_key_to_last(&"a");
/// assert_eq!(map.last(), Some((&"a", &3)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderedMap<K: Ord, V> {
    order: Vec<K>,
    entries: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Insert or overwrite `key`. An existing key keeps its position.
    ///
    /// Returns the previous value if any.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.entries.insert(key.clone(), value);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    /// Remove `key` and return its value.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let removed = self.entries.remove(key)?;
        if let Some(index) = self.position(key) {
            self.order.remove(index);
        }
        Some(removed)
    }

    /// Position of `key` in iteration order.
    pub fn position(&self, key: &K) -> Option<usize> {
        self.order.iter().position(|k| k == key)
    }

    pub fn get_by_index(&self, index: usize) -> Option<(&K, &V)> {
        let key = self.order.get(index)?;
        self.entries.get(key).map(|value| (key, value))
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        self.get_by_index(0)
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        self.order.len().checked_sub(1).and_then(|i| self.get_by_index(i))
    }

    /// Move `key` to the end of the iteration order. Returns `false` when the
    /// key is absent.
    pub fn bring_key_to_last(&mut self, key: &K) -> bool {
        match self.position(key) {
            Some(index) => {
                let key = self.order.remove(index);
                self.order.push(key);
                true
            }
            None => false,
        }
    }

    /// Rename `old` to `new` in place, keeping the position of `old`.
    ///
    /// If `new` is already present its value wins and the `old` entry is
    /// dropped. Returns `false` when `old` is absent.
    pub fn replace_key(&mut self, old: &K, new: K) -> bool {
        if old == &new {
            return self.contains_key(old);
        }

        let Some(index) = self.position(old) else {
            return false;
        };

        if self.entries.contains_key(&new) {
            self.order.remove(index);
            self.entries.remove(old);
        } else if let Some(value) = self.entries.remove(old) {
            self.order[index] = new.clone();
            self.entries.insert(new, value);
        }
        true
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.order.iter().filter_map(|k| self.entries.get(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k, v)))
    }

    /// Mutable access to every value. Yields in key order, not insertion order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.values_mut()
    }

    /// Visit entries in order until `f` returns `false`.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V) -> bool) {
        for (k, v) in self.iter() {
            if !f(k, v) {
                break;
            }
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

impl<K: Ord + Clone, V: Default> OrderedMap<K, V> {
    /// Set-style insertion: add `key` with a default value unless already present.
    pub fn add(&mut self, key: K) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.set(key, V::default());
        true
    }
}

impl<K: Ord, V> IntoIterator for OrderedMap<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    /// Consume the map in insertion order.
    fn into_iter(mut self) -> Self::IntoIter {
        self.order
            .into_iter()
            .filter_map(|k| self.entries.remove(&k).map(|v| (k, v)))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl<K: Ord + Clone, V> FromIterator<(K, V)> for OrderedMap<K, V> {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_follows_first_insertion() {
        let mut map = OrderedMap::new();
        map.set(3, "c");
        map.set(1, "a");
        map.set(2, "b");
        map.set(1, "z");

        let entries: Vec<_> = map.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(entries, vec![(3, "c"), (1, "z"), (2, "b")]);
        assert_eq!(map.get_by_index(1), Some((&1, &"z")));
        assert_eq!(map.get_by_index(3), None);
    }

    #[test]
    fn delete_keeps_remaining_order() {
        let mut map: OrderedMap<_, _> = [(1, 'a'), (2, 'b'), (3, 'c')].into_iter().collect();
        assert_eq!(map.delete(&2), Some('b'));
        assert_eq!(map.delete(&2), None);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn bring_to_last_promotes_without_losing_history() {
        let mut map = OrderedMap::new();
        map.set("a", 1);
        map.set("b", 2);
        assert!(map.bring_key_to_last(&"a"));
        assert!(!map.bring_key_to_last(&"missing"));
        assert_eq!(map.last(), Some((&"a", &1)));
        assert_eq!(map.first(), Some((&"b", &2)));
    }

    #[test]
    fn replace_key_keeps_position_and_merges() {
        let mut map = OrderedMap::new();
        map.set(1, "one");
        map.set(2, "two");
        map.set(3, "three");

        assert!(map.replace_key(&2, 20));
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1, 20, 3]);
        assert_eq!(map.get(&20), Some(&"two"));

        // Renaming onto an existing key keeps the existing entry.
        assert!(map.replace_key(&1, 3));
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![20, 3]);
        assert_eq!(map.get(&3), Some(&"three"));
    }

    #[test]
    fn add_is_set_semantics() {
        let mut set: OrderedMap<u32, ()> = OrderedMap::new();
        assert!(set.add(7));
        assert!(!set.add(7));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn for_each_stops_early() {
        let map: OrderedMap<_, _> = (0..10).map(|i| (i, i * 2)).collect();
        let mut seen = Vec::new();
        map.for_each(|k, _| {
            seen.push(*k);
            *k < 2
        });
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
