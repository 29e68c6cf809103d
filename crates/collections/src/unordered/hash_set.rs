use core::fmt;

use cairn_memory::allocator::Allocator;
use cairn_memory::{MemoryResult, handle_alloc_failure};

use super::DEFAULT_BUCKET_HINT;
use crate::function::{EqualTo, Identity, KeyEqual, KeyHash, SimpleHash};
use crate::hashtable::{self, HashTable};
use crate::{SharedPool, fresh_pool};

/// Unordered set of unique keys.
#[derive(Clone)]
pub struct HashSet<K, H = SimpleHash, E = EqualTo, A: Allocator = SharedPool> {
    table: HashTable<K, Identity, H, E, A>,
}

impl<K> HashSet<K> {
    pub fn new() -> Self {
        Self::new_in(fresh_pool())
    }

    pub fn with_buckets(hint: usize) -> MemoryResult<Self> {
        Self::with_buckets_in(hint, fresh_pool())
    }
}

impl<K> Default for HashSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A: Allocator> HashSet<K, SimpleHash, EqualTo, A> {
    pub fn new_in(alloc: A) -> Self {
        match Self::with_buckets_in(DEFAULT_BUCKET_HINT, alloc) {
            Ok(set) => set,
            Err(err) => handle_alloc_failure(err),
        }
    }

    pub fn with_buckets_in(hint: usize, alloc: A) -> MemoryResult<Self> {
        Self::with_hasher_in(hint, SimpleHash, EqualTo, alloc)
    }
}

impl<K, H, E, A: Allocator> HashSet<K, H, E, A> {
    pub fn with_hasher_in(hint: usize, hash: H, eq: E, alloc: A) -> MemoryResult<Self> {
        Ok(Self {
            table: HashTable::with_buckets_in(hint, Identity, hash, eq, alloc)?,
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    pub fn iter(&self) -> hashtable::Iter<'_, K> {
        self.table.iter()
    }

    pub fn as_table(&self) -> &HashTable<K, Identity, H, E, A> {
        &self.table
    }

    pub fn try_clone(&self) -> MemoryResult<Self>
    where
        K: Clone,
        H: Clone,
        E: Clone,
        A: Clone,
    {
        Ok(Self {
            table: self.table.try_clone()?,
        })
    }
}

impl<K, H, E, A> HashSet<K, H, E, A>
where
    H: KeyHash<K>,
    E: KeyEqual<K>,
    A: Allocator,
{
    /// Returns `false` if an equal key was already present.
    pub fn insert(&mut self, key: K) -> MemoryResult<bool> {
        let (_, inserted) = self.table.insert_unique(key)?;
        Ok(inserted)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.table.contains(key)
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.table.remove_one(key).is_some()
    }

    pub fn reserve(&mut self, additional: usize) -> MemoryResult<()> {
        self.table.resize(self.len().saturating_add(additional))
    }
}

impl<K: fmt::Debug, H, E, A: Allocator> fmt::Debug for HashSet<K, H, E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K, H, E, A> Extend<K> for HashSet<K, H, E, A>
where
    H: KeyHash<K>,
    E: KeyEqual<K>,
    A: Allocator,
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        if let Err(err) = self.table.insert_unique_iter(iter) {
            handle_alloc_failure(err);
        }
    }
}

impl<K> FromIterator<K> for HashSet<K>
where
    SimpleHash: KeyHash<K>,
    EqualTo: KeyEqual<K>,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a, K, H, E, A: Allocator> IntoIterator for &'a HashSet<K, H, E, A> {
    type Item = &'a K;
    type IntoIter = hashtable::Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, H, E, A: Allocator> IntoIterator for HashSet<K, H, E, A> {
    type Item = K;
    type IntoIter = hashtable::IntoIter<K, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}
