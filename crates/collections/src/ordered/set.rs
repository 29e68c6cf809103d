use core::fmt;
use core::ops::RangeBounds;

use cairn_memory::allocator::Allocator;
use cairn_memory::{MemoryResult, handle_alloc_failure};

use crate::function::{Identity, KeyCompare, Less};
use crate::tree::{self, RbTree};
use crate::{SharedPool, fresh_pool};

/// Ordered set of unique keys.
#[derive(Clone)]
pub struct Set<K, C = Less, A: Allocator = SharedPool> {
    tree: RbTree<K, Identity, C, A>,
}

impl<K> Set<K> {
    pub fn new() -> Self {
        Self::new_in(fresh_pool())
    }
}

impl<K> Default for Set<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A: Allocator> Set<K, Less, A> {
    pub fn new_in(alloc: A) -> Self {
        Self::with_compare_in(Less, alloc)
    }
}

impl<K, C> Set<K, C> {
    pub fn with_compare(compare: C) -> Self {
        Self::with_compare_in(compare, fresh_pool())
    }
}

impl<K, C, A: Allocator> Set<K, C, A> {
    pub fn with_compare_in(compare: C, alloc: A) -> Self {
        Self {
            tree: RbTree::new_in(Identity, compare, alloc),
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

    pub fn iter(&self) -> tree::Iter<'_, K> {
        self.tree.iter()
    }

    pub fn first(&self) -> Option<&K> {
        self.tree.first()
    }

    pub fn last(&self) -> Option<&K> {
        self.tree.last()
    }

    pub fn pop_first(&mut self) -> Option<K> {
        self.tree.pop_first()
    }

    pub fn pop_last(&mut self) -> Option<K> {
        self.tree.pop_last()
    }

    pub fn as_tree(&self) -> &RbTree<K, Identity, C, A> {
        &self.tree
    }

    pub fn try_clone(&self) -> MemoryResult<Self>
    where
        K: Clone,
        C: Clone,
        A: Clone,
    {
        Ok(Self {
            tree: self.tree.try_clone()?,
        })
    }
}

impl<K, C: KeyCompare<K>, A: Allocator> Set<K, C, A> {
    /// Returns `false` if an equivalent key was already present; `key` is
    /// dropped in that case.
    pub fn insert(&mut self, key: K) -> MemoryResult<bool> {
        let (_, inserted) = self.tree.insert_unique(key)?;
        Ok(inserted)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.tree.contains(key)
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.tree.erase_key(key) > 0
    }

    pub fn range<R: RangeBounds<K>>(&self, bounds: R) -> tree::Range<'_, K> {
        self.tree.range(bounds)
    }
}

impl<K: fmt::Debug, C, A: Allocator> fmt::Debug for Set<K, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, C, A: Allocator> PartialEq for Set<K, C, A> {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}

impl<K: Eq, C, A: Allocator> Eq for Set<K, C, A> {}

impl<K, C: KeyCompare<K>, A: Allocator> Extend<K> for Set<K, C, A> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        if let Err(err) = self.tree.insert_unique_iter(iter) {
            handle_alloc_failure(err);
        }
    }
}

impl<K: Ord> FromIterator<K> for Set<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a, K, C, A: Allocator> IntoIterator for &'a Set<K, C, A> {
    type Item = &'a K;
    type IntoIter = tree::Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, C, A: Allocator> IntoIterator for Set<K, C, A> {
    type Item = K;
    type IntoIter = tree::IntoIter<K, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.tree.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_duplicates() {
        let mut set = Set::new();
        assert!(set.insert(5).unwrap());
        assert!(!set.insert(5).unwrap());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_sorted_iteration_and_pops() {
        let mut set: Set<_> = [5, 3, 8, 1, 4].into_iter().collect();
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![1, 3, 4, 5, 8]);
        assert_eq!(set.pop_first(), Some(1));
        assert_eq!(set.pop_last(), Some(8));
        assert!(set.remove(&4));
        assert!(!set.remove(&4));
        assert_eq!(format!("{set:?}"), "{3, 5}");
    }
}
