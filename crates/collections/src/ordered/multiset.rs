use core::fmt;

use cairn_memory::allocator::Allocator;
use cairn_memory::{MemoryResult, handle_alloc_failure};

use crate::function::{Identity, KeyCompare, Less};
use crate::tree::{self, RbTree};
use crate::{SharedPool, fresh_pool};

/// Ordered bag: equivalent keys may repeat.
#[derive(Clone)]
pub struct MultiSet<K, C = Less, A: Allocator = SharedPool> {
    tree: RbTree<K, Identity, C, A>,
}

impl<K> MultiSet<K> {
    pub fn new() -> Self {
        Self::new_in(fresh_pool())
    }
}

impl<K> Default for MultiSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A: Allocator> MultiSet<K, Less, A> {
    pub fn new_in(alloc: A) -> Self {
        Self::with_compare_in(Less, alloc)
    }
}

impl<K, C> MultiSet<K, C> {
    pub fn with_compare(compare: C) -> Self {
        Self::with_compare_in(compare, fresh_pool())
    }
}

impl<K, C, A: Allocator> MultiSet<K, C, A> {
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

impl<K, C: KeyCompare<K>, A: Allocator> MultiSet<K, C, A> {
    pub fn insert(&mut self, key: K) -> MemoryResult<()> {
        self.tree.insert_equal(key)?;
        Ok(())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.tree.contains(key)
    }

    pub fn count(&self, key: &K) -> usize {
        self.tree.count(key)
    }

    pub fn equal_range(&self, key: &K) -> tree::Range<'_, K> {
        self.tree.equal_range(key)
    }

    pub fn remove_all(&mut self, key: &K) -> usize {
        self.tree.erase_key(key)
    }
}

impl<K: fmt::Debug, C, A: Allocator> fmt::Debug for MultiSet<K, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<K, C: KeyCompare<K>, A: Allocator> Extend<K> for MultiSet<K, C, A> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        if let Err(err) = self.tree.insert_equal_iter(iter) {
            handle_alloc_failure(err);
        }
    }
}

impl<K: Ord> FromIterator<K> for MultiSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a, K, C, A: Allocator> IntoIterator for &'a MultiSet<K, C, A> {
    type Item = &'a K;
    type IntoIter = tree::Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, C, A: Allocator> IntoIterator for MultiSet<K, C, A> {
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
    fn test_counts_duplicates() {
        let mut bag: MultiSet<_> = "mississippi".chars().collect();
        assert_eq!(bag.count(&'s'), 4);
        assert_eq!(bag.count(&'i'), 4);
        assert_eq!(bag.equal_range(&'p').count(), 2);
        assert_eq!(bag.remove_all(&'s'), 4);
        assert_eq!(bag.iter().collect::<String>(), "iiiimpp");
        bag.as_tree().verify().unwrap();
    }
}
