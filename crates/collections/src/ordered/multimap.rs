use core::fmt;

use cairn_memory::allocator::Allocator;
use cairn_memory::{MemoryResult, handle_alloc_failure};

use crate::function::{KeyCompare, Less, SelectFirst};
use crate::tree::{self, RbTree};
use crate::{SharedPool, fresh_pool};

/// Ordered map allowing several values per key. Values under one key keep
/// their insertion order.
#[derive(Clone)]
pub struct MultiMap<K, V, C = Less, A: Allocator = SharedPool> {
    tree: RbTree<(K, V), SelectFirst, C, A>,
}

impl<K, V> MultiMap<K, V> {
    pub fn new() -> Self {
        Self::new_in(fresh_pool())
    }
}

impl<K, V> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A: Allocator> MultiMap<K, V, Less, A> {
    pub fn new_in(alloc: A) -> Self {
        Self::with_compare_in(Less, alloc)
    }
}

impl<K, V, C> MultiMap<K, V, C> {
    pub fn with_compare(compare: C) -> Self {
        Self::with_compare_in(compare, fresh_pool())
    }
}

impl<K, V, C, A: Allocator> MultiMap<K, V, C, A> {
    pub fn with_compare_in(compare: C, alloc: A) -> Self {
        Self {
            tree: RbTree::new_in(SelectFirst, compare, alloc),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> + ExactSizeIterator {
        self.tree.iter().map(|(k, v)| (k, v))
    }

    pub fn as_tree(&self) -> &RbTree<(K, V), SelectFirst, C, A> {
        &self.tree
    }

    pub fn try_clone(&self) -> MemoryResult<Self>
    where
        K: Clone,
        V: Clone,
        C: Clone,
        A: Clone,
    {
        Ok(Self {
            tree: self.tree.try_clone()?,
        })
    }
}

impl<K, V, C: KeyCompare<K>, A: Allocator> MultiMap<K, V, C, A> {
    /// Always inserts, after any values already stored under `key`.
    pub fn insert(&mut self, key: K, value: V) -> MemoryResult<()> {
        self.tree.insert_equal((key, value))?;
        Ok(())
    }

    pub fn count(&self, key: &K) -> usize {
        self.tree.count(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.tree.contains(key)
    }

    /// Values stored under `key`, oldest first.
    pub fn get_all(&self, key: &K) -> impl DoubleEndedIterator<Item = &V> {
        self.tree.equal_range(key).map(|(_, v)| v)
    }

    pub fn equal_range(&self, key: &K) -> tree::Range<'_, (K, V)> {
        self.tree.equal_range(key)
    }

    /// Removes every value under `key`; returns how many.
    pub fn remove_all(&mut self, key: &K) -> usize {
        self.tree.erase_key(key)
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C, A: Allocator> fmt::Debug for MultiMap<K, V, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, C: KeyCompare<K>, A: Allocator> Extend<(K, V)> for MultiMap<K, V, C, A> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        if let Err(err) = self.tree.insert_equal_iter(iter) {
            handle_alloc_failure(err);
        }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for MultiMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, C, A: Allocator> IntoIterator for MultiMap<K, V, C, A> {
    type Item = (K, V);
    type IntoIter = tree::IntoIter<(K, V), A>;

    fn into_iter(self) -> Self::IntoIter {
        self.tree.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_keep_insertion_order() {
        let map: MultiMap<_, _> = [(2, 'x'), (1, 'a'), (2, 'y'), (1, 'b'), (2, 'z')]
            .into_iter()
            .collect();
        assert_eq!(map.get_all(&2).copied().collect::<Vec<_>>(), vec!['x', 'y', 'z']);
        assert_eq!(map.get_all(&1).rev().copied().collect::<Vec<_>>(), vec!['b', 'a']);
        assert_eq!(map.count(&3), 0);
    }

    #[test]
    fn test_remove_all() {
        let mut map = MultiMap::new();
        for v in 0..4 {
            map.insert("k", v).unwrap();
        }
        map.insert("j", 9).unwrap();
        assert_eq!(map.remove_all(&"k"), 4);
        assert_eq!(map.len(), 1);
        assert!(!map.contains_key(&"k"));
        map.as_tree().verify().unwrap();
    }
}
