use core::fmt;
use core::mem;

use cairn_memory::allocator::Allocator;
use cairn_memory::{MemoryResult, handle_alloc_failure};

use super::DEFAULT_BUCKET_HINT;
use crate::function::{EqualTo, KeyEqual, KeyHash, SelectFirst, SimpleHash};
use crate::hashtable::{self, HashTable};
use crate::{SharedPool, fresh_pool};

/// Unordered map with unique keys.
///
/// ```
/// use cairn_collections::HashMap;
///
/// let mut ports = HashMap::new();
/// ports.insert("http", 80)?;
/// ports.insert("ssh", 22)?;
/// assert_eq!(ports.get(&"ssh"), Some(&22));
/// assert_eq!(ports.bucket_count(), 193);
/// # Ok::<(), cairn_memory::MemoryError>(())
/// ```
#[derive(Clone)]
pub struct HashMap<K, V, H = SimpleHash, E = EqualTo, A: Allocator = SharedPool> {
    table: HashTable<(K, V), SelectFirst, H, E, A>,
}

impl<K, V> HashMap<K, V> {
    /// Empty map on a fresh pool with the default bucket hint.
    ///
    /// Aborts through `handle_alloc_failure` if the bucket array cannot be
    /// allocated.
    pub fn new() -> Self {
        Self::new_in(fresh_pool())
    }

    pub fn with_buckets(hint: usize) -> MemoryResult<Self> {
        Self::with_buckets_in(hint, fresh_pool())
    }
}

impl<K, V> Default for HashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A: Allocator> HashMap<K, V, SimpleHash, EqualTo, A> {
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

impl<K, V, H, E, A: Allocator> HashMap<K, V, H, E, A> {
    /// Empty map with custom hashing and equality strategies.
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

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> {
        self.table.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> {
        self.table.iter().map(|(_, v)| v)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) {
        self.table.retain(|(k, v)| keep(k, v));
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

impl<K, V, H, E, A> HashMap<K, V, H, E, A>
where
    H: KeyHash<K>,
    E: KeyEqual<K>,
    A: Allocator,
{
    /// Inserts or replaces; returns the previous value for `key`.
    pub fn insert(&mut self, key: K, value: V) -> MemoryResult<Option<V>> {
        if let Some((_, slot)) = self.table.find_mut(&key) {
            return Ok(Some(mem::replace(slot, value)));
        }
        self.table.insert_unique((key, value))?;
        Ok(None)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.table.find(key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.table.find_mut(key).map(|(_, v)| v)
    }

    pub fn get_or_insert_with(
        &mut self,
        key: K,
        make: impl FnOnce() -> V,
    ) -> MemoryResult<&mut V> {
        let slot = self.table.locate(&key);
        let (_, value) = self.table.fill_slot(slot, || (key, make()))?;
        Ok(value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.table.contains(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.table.remove_one(key).map(|(_, v)| v)
    }

    /// Grows the bucket array so `additional` more entries fit without a
    /// rehash.
    pub fn reserve(&mut self, additional: usize) -> MemoryResult<()> {
        self.table.resize(self.len().saturating_add(additional))
    }
}

impl<K: fmt::Debug, V: fmt::Debug, H, E, A: Allocator> fmt::Debug for HashMap<K, V, H, E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, H, E, A> Extend<(K, V)> for HashMap<K, V, H, E, A>
where
    H: KeyHash<K>,
    E: KeyEqual<K>,
    A: Allocator,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        if let Err(err) = self.reserve(iter.size_hint().0) {
            handle_alloc_failure(err);
        }
        for (key, value) in iter {
            if let Err(err) = self.insert(key, value) {
                handle_alloc_failure(err);
            }
        }
    }
}

impl<K, V> FromIterator<(K, V)> for HashMap<K, V>
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

impl<K, V, H, E, A: Allocator> IntoIterator for HashMap<K, V, H, E, A> {
    type Item = (K, V);
    type IntoIter = hashtable::IntoIter<(K, V), A>;

    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::StdHash;
    use cairn_memory::allocator::SystemAllocator;

    #[test]
    fn test_default_bucket_hint() {
        let map: HashMap<u32, u32> = HashMap::new();
        assert_eq!(map.bucket_count(), 193);
    }

    #[test]
    fn test_insert_get_remove() {
        let mut map = HashMap::new();
        assert_eq!(map.insert(1u64, "one").unwrap(), None);
        assert_eq!(map.insert(1, "uno").unwrap(), Some("one"));
        assert_eq!(map.get(&1), Some(&"uno"));
        *map.get_mut(&1).unwrap() = "eins";
        assert_eq!(map.remove(&1), Some("eins"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut map: HashMap<String, Vec<u8>> = HashMap::new();
        map.get_or_insert_with("a".into(), Vec::new).unwrap().push(1);
        map.get_or_insert_with("a".into(), Vec::new).unwrap().push(2);
        assert_eq!(map.get(&"a".to_string()), Some(&vec![1, 2]));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_std_hasher_for_tuple_keys() {
        let mut map = HashMap::with_hasher_in(
            0,
            StdHash::<std::collections::hash_map::RandomState>::default(),
            EqualTo,
            SystemAllocator,
        )
        .unwrap();
        map.insert((1, 'a'), 10).unwrap();
        map.insert((2, 'b'), 20).unwrap();
        assert_eq!(map.get(&(2, 'b')), Some(&20));
        map.as_table().verify().unwrap();
    }

    #[test]
    fn test_reserve_and_retain() {
        let mut map = HashMap::new();
        map.reserve(400).unwrap();
        assert_eq!(map.bucket_count(), 769);
        map.extend((0u32..100).map(|k| (k, k * k)));
        map.retain(|k, _| k % 10 == 0);
        assert_eq!(map.len(), 10);
        assert_eq!(map.get(&90), Some(&8100));
    }
}
