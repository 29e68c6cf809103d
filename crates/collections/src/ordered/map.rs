use core::fmt;
use core::iter::FusedIterator;
use core::mem;
use core::ops::RangeBounds;

use cairn_memory::allocator::Allocator;
use cairn_memory::{MemoryResult, handle_alloc_failure};

use crate::function::{KeyCompare, Less, SelectFirst};
use crate::tree::{self, RbTree};
use crate::{SharedPool, fresh_pool};

/// Ordered map with unique keys.
///
/// ```
/// use cairn_collections::Map;
///
/// let mut map = Map::new();
/// map.insert(3, "c")?;
/// map.insert(1, "a")?;
/// assert_eq!(map.insert(3, "C")?, Some("c"));
/// assert_eq!(map.keys().copied().collect::<Vec<_>>(), [1, 3]);
/// # Ok::<(), cairn_memory::MemoryError>(())
/// ```
#[derive(Clone)]
pub struct Map<K, V, C = Less, A: Allocator = SharedPool> {
    tree: RbTree<(K, V), SelectFirst, C, A>,
}

impl<K, V> Map<K, V> {
    /// Creates an empty map on a fresh pool.
    pub fn new() -> Self {
        Self::new_in(fresh_pool())
    }
}

impl<K, V> Default for Map<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A: Allocator> Map<K, V, Less, A> {
    pub fn new_in(alloc: A) -> Self {
        Self::with_compare_in(Less, alloc)
    }
}

impl<K, V, C> Map<K, V, C> {
    pub fn with_compare(compare: C) -> Self {
        Self::with_compare_in(compare, fresh_pool())
    }
}

impl<K, V, C, A: Allocator> Map<K, V, C, A> {
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

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator {
        self.tree.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator {
        self.tree.iter().map(|(_, v)| v)
    }

    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree.first().map(|(k, v)| (k, v))
    }

    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree.last().map(|(k, v)| (k, v))
    }

    /// The underlying tree, e.g. for [`RbTree::verify`].
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

impl<K, V, C: KeyCompare<K>, A: Allocator> Map<K, V, C, A> {
    /// Inserts or replaces; returns the previous value for `key`.
    pub fn insert(&mut self, key: K, value: V) -> MemoryResult<Option<V>> {
        if let Some((_, slot)) = self.tree.find_mut(&key) {
            return Ok(Some(mem::replace(slot, value)));
        }
        self.tree.insert_unique((key, value))?;
        Ok(None)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.tree.find(key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.tree.find_mut(key).map(|(_, v)| v)
    }

    /// Value for `key`, inserting `make()` first if the key is absent.
    pub fn get_or_insert_with(
        &mut self,
        key: K,
        make: impl FnOnce() -> V,
    ) -> MemoryResult<&mut V> {
        let slot = self.tree.unique_slot(&key);
        let (_, value) = self.tree.slot_value_mut(slot, || (key, make()))?;
        Ok(value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.tree.contains(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.tree
            .find_cursor_mut(key)
            .remove_current()
            .map(|(_, v)| v)
    }

    /// Entries whose keys fall within `bounds`, in key order.
    pub fn range<R: RangeBounds<K>>(
        &self,
        bounds: R,
    ) -> impl DoubleEndedIterator<Item = (&K, &V)> {
        self.tree.range(bounds).map(|(k, v)| (k, v))
    }
}

/// Iterator over `(&K, &V)` in key order.
pub struct Iter<'a, K, V> {
    inner: tree::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, v)| (k, v))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug, C, A: Allocator> fmt::Debug for Map<K, V, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq, C, A: Allocator> PartialEq for Map<K, V, C, A> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K: Eq, V: Eq, C, A: Allocator> Eq for Map<K, V, C, A> {}

impl<K, V, C: KeyCompare<K>, A: Allocator> Extend<(K, V)> for Map<K, V, C, A> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            if let Err(err) = self.insert(key, value) {
                handle_alloc_failure(err);
            }
        }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for Map<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, C, A: Allocator> IntoIterator for &'a Map<K, V, C, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<K, V, C, A: Allocator> IntoIterator for Map<K, V, C, A> {
    type Item = (K, V);
    type IntoIter = tree::IntoIter<(K, V), A>;

    fn into_iter(self) -> Self::IntoIter {
        self.tree.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Greater;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_replaces_value() {
        let mut map = Map::new();
        assert_eq!(map.insert("k", 1).unwrap(), None);
        assert_eq!(map.insert("k", 2).unwrap(), Some(1));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&"k"), Some(&2));
    }

    #[test]
    fn test_get_or_insert_with_counts_words() {
        let mut counts: Map<&str, usize> = Map::new();
        for word in "a b a c a b".split(' ') {
            *counts.get_or_insert_with(word, || 0).unwrap() += 1;
        }
        let pairs: Vec<_> = counts.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(pairs, vec![("a", 3), ("b", 2), ("c", 1)]);
        counts.as_tree().verify().unwrap();
    }

    #[test]
    fn test_remove_and_extremes() {
        let mut map: Map<i32, char> = (0..5).zip('a'..).collect();
        assert_eq!(map.remove(&2), Some('c'));
        assert_eq!(map.remove(&2), None);
        assert_eq!(map.first_key_value(), Some((&0, &'a')));
        assert_eq!(map.last_key_value(), Some((&4, &'e')));
        assert_eq!(
            map.range(1..4).map(|(k, _)| *k).collect::<Vec<_>>(),
            vec![1, 3]
        );
    }

    #[test]
    fn test_custom_compare() {
        let mut map = Map::with_compare(Greater);
        map.extend([(1, ()), (3, ()), (2, ())]);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
    }

    #[test]
    fn test_get_mut_and_owned_iteration() {
        let mut map: Map<u8, String> = Map::new();
        map.insert(1, "x".into()).unwrap();
        map.get_mut(&1).unwrap().push('y');
        let owned: Vec<_> = map.into_iter().collect();
        assert_eq!(owned, vec![(1, "xy".to_string())]);
    }
}
