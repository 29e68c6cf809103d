use core::fmt;

use cairn_memory::allocator::Allocator;
use cairn_memory::{MemoryResult, handle_alloc_failure};

use super::DEFAULT_BUCKET_HINT;
use crate::function::{EqualTo, KeyEqual, KeyHash, SelectFirst, SimpleHash};
use crate::hashtable::{self, HashTable};
use crate::{SharedPool, fresh_pool};

/// Unordered map allowing several values per key. Entries sharing a key are
/// stored next to each other.
#[derive(Clone)]
pub struct HashMultiMap<K, V, H = SimpleHash, E = EqualTo, A: Allocator = SharedPool> {
    table: HashTable<(K, V), SelectFirst, H, E, A>,
}

impl<K, V> HashMultiMap<K, V> {
    pub fn new() -> Self {
        Self::new_in(fresh_pool())
    }
}

impl<K, V> Default for HashMultiMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A: Allocator> HashMultiMap<K, V, SimpleHash, EqualTo, A> {
    pub fn new_in(alloc: A) -> Self {
        match Self::with_buckets_in(DEFAULT_BUCKET_HINT, alloc) {
            Ok(map) => map,
            Err(err) => handle_alloc_failure(err),
        }
    }

    pub fn with_buckets_in(hint: usize, alloc: A) -> MemoryResult<Self> {
        Self::with_hasher_in(hint, SimpleHash, EqualTo, alloc)
    }
}

impl<K, V, H, E, A: Allocator> HashMultiMap<K, V, H, E, A> {
    pub fn with_hasher_in(hint: usize, hash: H, eq: E, alloc: A) -> MemoryResult<Self> {
        Ok(Self {
            table: HashTable::with_buckets_in(hint, SelectFirst, hash, eq, alloc)?,
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

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&K, &V)> {
        self.table.iter().map(|(k, v)| (k, v))
    }

    pub fn as_table(&self) -> &HashTable<(K, V), SelectFirst, H, E, A> {
        &self.table
    }

    pub fn try_clone(&self) -> MemoryResult<Self>
    where
        K: Clone,
        V: Clone,
        H: Clone,
        E: Clone,
        A: Clone,
    {
        Ok(Self {
            table: self.table.try_clone()?,
        })
    }
}

impl<K, V, H, E, A> HashMultiMap<K, V, H, E, A>
where
    H: KeyHash<K>,
    E: KeyEqual<K>,
    A: Allocator,
{
    pub fn insert(&mut self, key: K, value: V) -> MemoryResult<()> {
        self.table.insert_equal((key, value))?;
        Ok(())
    }

    pub fn count(&self, key: &K) -> usize {
        self.table.count(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.table.contains(key)
    }

    pub fn get_all(&self, key: &K) -> impl ExactSizeIterator<Item = &V> {
        self.table.equal_range(key).map(|(_, v)| v)
    }

    pub fn remove_all(&mut self, key: &K) -> usize {
        self.table.erase(key)
    }
}

impl<K: fmt::Debug, V: fmt::Debug, H, E, A: Allocator> fmt::Debug
    for HashMultiMap<K, V, H, E, A>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, H, E, A> Extend<(K, V)> for HashMultiMap<K, V, H, E, A>
where
    H: KeyHash<K>,
    E: KeyEqual<K>,
    A: Allocator,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        if let Err(err) = self.table.insert_equal_iter(iter) {
            handle_alloc_failure(err);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for HashMultiMap<K, V>
where
    SimpleHash: KeyHash<K>,
    EqualTo: KeyEqual<K>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, H, E, A: Allocator> IntoIterator for HashMultiMap<K, V, H, E, A> {
    type Item = (K, V);
    type IntoIter = hashtable::IntoIter<(K, V), A>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}
