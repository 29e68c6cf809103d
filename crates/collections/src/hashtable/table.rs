use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr::{self, NonNull};
use core::slice;

use cairn_memory::allocator::{Allocator, TypedAllocator};
use cairn_memory::{MemoryResult, handle_alloc_failure};
use tracing::debug;

use super::iter::{IntoIter, Iter};
use super::primes::{MAX_BUCKET_COUNT, is_listed, next_prime};
use crate::error::InvariantViolation;
use crate::function::{KeyEqual, KeyHash, KeyOfValue};

pub(crate) type Link<T> = Option<NonNull<HashNode<T>>>;

/// A chain link carrying one value.
pub(crate) struct HashNode<T> {
    pub(crate) next: Link<T>,
    pub(crate) value: T,
}

/// Result of looking a key up ahead of a possible insertion.
#[derive(Debug)]
pub(crate) enum HashSlot<T> {
    Occupied(NonNull<HashNode<T>>),
    Vacant,
}

/// Separate-chaining hash table over `T`, keyed by the projection `KoV`,
/// hashed by `H` and compared by `E`.
///
/// The bucket count is always a member of the fixed prime table. Every
/// insertion that adds a node grows the table so that the element count
/// never exceeds the bucket count, rehashing every node into the new array. Nodes with
/// equivalent keys inserted through [`insert_equal`](Self::insert_equal)
/// stay adjacent in their chain.
pub struct HashTable<T, KoV, H, E, A: Allocator> {
    buckets: NonNull<Link<T>>,
    bucket_count: usize,
    len: usize,
    key_of: KoV,
    hash: H,
    eq: E,
    alloc: A,
    marker: PhantomData<Box<HashNode<T>>>,
}

// SAFETY: the table owns its nodes and bucket array exclusively.
unsafe impl<T: Send, KoV: Send, H: Send, E: Send, A: Allocator + Send> Send
    for HashTable<T, KoV, H, E, A>
{
}
// SAFETY: `&self` methods only read nodes and buckets.
unsafe impl<T: Sync, KoV: Sync, H: Sync, E: Sync, A: Allocator + Sync> Sync
    for HashTable<T, KoV, H, E, A>
{
}

/// Allocates `count` empty chain heads.
fn alloc_buckets<T, A: Allocator>(alloc: &A, count: usize) -> MemoryResult<NonNull<Link<T>>> {
    // SAFETY: released with dealloc_array and the same count.
    let buckets = unsafe { alloc.alloc_array::<Link<T>>(count)? };
    for i in 0..count {
        // SAFETY: i < count, inside the fresh allocation.
        unsafe { buckets.as_ptr().add(i).write(None) };
    }
    Ok(buckets)
}

// ============================================================================
// Structure-only operations
// ============================================================================

impl<T, KoV, H, E, A: Allocator> HashTable<T, KoV, H, E, A> {
    /// Creates an empty table with at least `hint` buckets, rounded up to the
    /// next listed prime.
    pub fn with_buckets_in(
        hint: usize,
        key_of: KoV,
        hash: H,
        eq: E,
        alloc: A,
    ) -> MemoryResult<Self> {
        Self::with_exact_buckets(next_prime(hint), key_of, hash, eq, alloc)
    }

    fn with_exact_buckets(
        bucket_count: usize,
        key_of: KoV,
        hash: H,
        eq: E,
        alloc: A,
    ) -> MemoryResult<Self> {
        let buckets = alloc_buckets::<T, A>(&alloc, bucket_count)?;
        Ok(Self {
            buckets,
            bucket_count,
            len: 0,
            key_of,
            hash,
            eq,
            alloc,
            marker: PhantomData,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn max_bucket_count(&self) -> usize {
        MAX_BUCKET_COUNT
    }

    /// Length of chain `bucket`.
    ///
    /// # Panics
    /// If `bucket >= self.bucket_count()`.
    pub fn elements_in_bucket(&self, bucket: usize) -> usize {
        let mut count = 0;
        let mut cur = self.buckets()[bucket];
        while let Some(node) = cur {
            count += 1;
            // SAFETY: chain nodes are live.
            cur = unsafe { (*node.as_ptr()).next };
        }
        count
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    pub fn hasher(&self) -> &H {
        &self.hash
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.buckets(), self.len)
    }

    /// Drops every element. The bucket count is kept.
    pub fn clear(&mut self) {
        for i in 0..self.bucket_count {
            // SAFETY: i is in range; each chain is detached before its nodes
            // are freed.
            unsafe {
                let head = self.buckets.as_ptr().add(i);
                let mut cur = (*head).take();
                while let Some(node) = cur {
                    cur = (*node.as_ptr()).next;
                    drop(self.destroy_node(node));
                }
            }
        }
        self.len = 0;
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Removes every element for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        let mut removed = 0;
        for i in 0..self.bucket_count {
            // SAFETY: `link` always points at a live chain slot: a bucket
            // head or the `next` field of a node still in the chain.
            unsafe {
                let mut link: *mut Link<T> = self.buckets.as_ptr().add(i);
                while let Some(node) = *link {
                    if keep(&(*node.as_ptr()).value) {
                        link = &raw mut (*node.as_ptr()).next;
                    } else {
                        *link = (*node.as_ptr()).next;
                        drop(self.destroy_node(node));
                        removed += 1;
                    }
                }
            }
        }
        self.len -= removed;
    }

    #[inline]
    pub(crate) fn buckets(&self) -> &[Link<T>] {
        // SAFETY: buckets holds bucket_count initialized links.
        unsafe { slice::from_raw_parts(self.buckets.as_ptr(), self.bucket_count) }
    }

    fn create_node(&self, value: T) -> MemoryResult<NonNull<HashNode<T>>> {
        // SAFETY: released through destroy_node.
        unsafe { self.alloc.alloc_init(HashNode { next: None, value }) }
    }

    /// # Safety
    /// `node` must come from `create_node` and be unlinked.
    unsafe fn destroy_node(&self, node: NonNull<HashNode<T>>) -> T {
        // SAFETY: the value is read exactly once before the memory goes.
        unsafe {
            let value = ptr::read(&raw const (*node.as_ptr()).value);
            self.alloc.dealloc_typed(node);
            value
        }
    }

    /// Replaces the bucket array with `count` empty buckets. The table must
    /// be empty.
    fn rebucket_empty(&mut self, count: usize) -> MemoryResult<()> {
        debug_assert!(self.is_empty());
        if count == self.bucket_count {
            return Ok(());
        }
        let buckets = alloc_buckets::<T, A>(&self.alloc, count)?;
        // SAFETY: the old array came from alloc_buckets with bucket_count.
        unsafe { self.alloc.dealloc_array(self.buckets, self.bucket_count) };
        self.buckets = buckets;
        self.bucket_count = count;
        Ok(())
    }

    /// Appends copies of every chain of `source`, keeping chain order. Both
    /// tables must have the same bucket count and `self` must be empty.
    fn copy_chains(&mut self, source: &Self) -> MemoryResult<()>
    where
        T: Clone,
    {
        debug_assert_eq!(self.bucket_count, source.bucket_count);
        for (i, head) in source.buckets().iter().enumerate() {
            // SAFETY: `tail` points at the last slot of chain i; every new
            // node is linked before the next clone runs, so Drop reaches it
            // if a later allocation fails.
            unsafe {
                let mut tail: *mut Link<T> = self.buckets.as_ptr().add(i);
                let mut cur = *head;
                while let Some(src) = cur {
                    let node = self.create_node((*src.as_ptr()).value.clone())?;
                    *tail = Some(node);
                    tail = &raw mut (*node.as_ptr()).next;
                    self.len += 1;
                    cur = (*src.as_ptr()).next;
                }
            }
        }
        Ok(())
    }

    /// Fallible copy with the same bucket count and chain order.
    pub fn try_clone(&self) -> MemoryResult<Self>
    where
        T: Clone,
        KoV: Clone,
        H: Clone,
        E: Clone,
        A: Clone,
    {
        let mut table = Self::with_exact_buckets(
            self.bucket_count,
            self.key_of.clone(),
            self.hash.clone(),
            self.eq.clone(),
            self.alloc.clone(),
        )?;
        table.copy_chains(self)?;
        Ok(table)
    }

    /// Replaces the contents with a copy of `source`, keeping this table's
    /// allocator. On failure the table is left empty.
    pub fn try_clone_from(&mut self, source: &Self) -> MemoryResult<()>
    where
        T: Clone,
        KoV: Clone,
        H: Clone,
        E: Clone,
    {
        if ptr::eq(self, source) {
            return Ok(());
        }
        self.clear();
        self.rebucket_empty(source.bucket_count)?;
        self.key_of = source.key_of.clone();
        self.hash = source.hash.clone();
        self.eq = source.eq.clone();
        if let Err(err) = self.copy_chains(source) {
            self.clear();
            return Err(err);
        }
        Ok(())
    }
}

// ============================================================================
// Keyed operations
// ============================================================================

impl<T, KoV, H, E, A> HashTable<T, KoV, H, E, A>
where
    KoV: KeyOfValue<T>,
    H: KeyHash<KoV::Key>,
    E: KeyEqual<KoV::Key>,
    A: Allocator,
{
    #[inline]
    fn bucket_for(&self, key: &KoV::Key, count: usize) -> usize {
        self.hash.hash(key) % count
    }

    /// Bucket that holds (or would hold) `key`.
    #[inline]
    pub fn bucket_index(&self, key: &KoV::Key) -> usize {
        self.bucket_for(key, self.bucket_count)
    }

    /// # Safety
    /// `node` must be a live node of this table.
    #[inline]
    unsafe fn node_key(&self, node: NonNull<HashNode<T>>) -> &KoV::Key {
        // SAFETY: forwarded.
        self.key_of.key(unsafe { &(*node.as_ptr()).value })
    }

    fn find_in_bucket(&self, bucket: usize, key: &KoV::Key) -> Option<NonNull<HashNode<T>>> {
        let mut cur = self.buckets()[bucket];
        while let Some(node) = cur {
            // SAFETY: chain nodes are live.
            unsafe {
                if self.eq.eq(self.node_key(node), key) {
                    return Some(node);
                }
                cur = (*node.as_ptr()).next;
            }
        }
        None
    }

    /// Grows to at least `hint` buckets. Every node is moved to the head of
    /// its bucket in the new array before the old array is released. On
    /// allocation failure the table is unchanged.
    pub fn resize(&mut self, hint: usize) -> MemoryResult<()> {
        let old_count = self.bucket_count;
        if hint <= old_count {
            return Ok(());
        }
        let new_count = next_prime(hint);
        if new_count <= old_count {
            return Ok(());
        }

        let new_buckets = alloc_buckets::<T, A>(&self.alloc, new_count)?;
        for i in 0..old_count {
            // SAFETY: both arrays are live and initialized; each node is
            // unlinked from the old chain before being pushed onto the new.
            unsafe {
                let mut cur = (*self.buckets.as_ptr().add(i)).take();
                while let Some(node) = cur {
                    let target = self.bucket_for(self.node_key(node), new_count);
                    cur = (*node.as_ptr()).next;
                    let head = new_buckets.as_ptr().add(target);
                    (*node.as_ptr()).next = *head;
                    *head = Some(node);
                }
            }
        }
        // SAFETY: the old array came from alloc_buckets with old_count.
        unsafe { self.alloc.dealloc_array(self.buckets, old_count) };
        self.buckets = new_buckets;
        self.bucket_count = new_count;

        debug!(
            old_buckets = old_count,
            new_buckets = new_count,
            len = self.len,
            "hash table rehashed"
        );
        Ok(())
    }

    /// Grows for one more element now that `node` exists. On failure `node`
    /// is destroyed and the table is unchanged.
    fn grow_for(&mut self, node: NonNull<HashNode<T>>) -> MemoryResult<()> {
        if let Err(err) = self.resize(self.len.saturating_add(1)) {
            // SAFETY: node came from create_node and was never linked.
            drop(unsafe { self.destroy_node(node) });
            return Err(err);
        }
        Ok(())
    }

    fn link_unique(&mut self, value: T) -> MemoryResult<(NonNull<HashNode<T>>, bool)> {
        let key = self.key_of.key(&value);
        if let Some(existing) = self.find_in_bucket(self.bucket_index(key), key) {
            return Ok((existing, false));
        }
        let node = self.create_node(value)?;
        self.grow_for(node)?;
        // SAFETY: node is live; the bucket is taken under the final count.
        let bucket = self.bucket_index(unsafe { self.node_key(node) });
        self.push_front(bucket, node);
        Ok((node, true))
    }

    fn link_equal(&mut self, value: T) -> MemoryResult<NonNull<HashNode<T>>> {
        let node = self.create_node(value)?;
        self.grow_for(node)?;
        // SAFETY: node is live and still unlinked, so the scan cannot meet it.
        let key = unsafe { self.node_key(node) };
        let bucket = self.bucket_index(key);
        let first_match = self.find_in_bucket(bucket, key);
        match first_match {
            // SAFETY: both nodes are live; node is spliced in right after the
            // first equivalent node.
            Some(prev) => unsafe {
                (*node.as_ptr()).next = (*prev.as_ptr()).next;
                (*prev.as_ptr()).next = Some(node);
                self.len += 1;
            },
            None => self.push_front(bucket, node),
        }
        Ok(node)
    }

    fn push_front(&mut self, bucket: usize, node: NonNull<HashNode<T>>) {
        // SAFETY: bucket < bucket_count; node is fresh and unlinked.
        unsafe {
            let head = self.buckets.as_ptr().add(bucket);
            (*node.as_ptr()).next = *head;
            *head = Some(node);
        }
        self.len += 1;
    }

    /// Inserts `value` unless an equivalent key is present. Returns the new
    /// or existing element and whether an insertion happened.
    ///
    /// The node is allocated before any growth, so a failed insertion
    /// leaves the table exactly as it was.
    pub fn insert_unique(&mut self, value: T) -> MemoryResult<(&T, bool)> {
        let (node, inserted) = self.link_unique(value)?;
        // SAFETY: node is live and borrowed through &mut self.
        Ok((unsafe { &(*node.as_ptr()).value }, inserted))
    }

    /// Inserts `value`, next to the first equivalent element if any.
    pub fn insert_equal(&mut self, value: T) -> MemoryResult<&T> {
        let node = self.link_equal(value)?;
        // SAFETY: node is live and borrowed through &mut self.
        Ok(unsafe { &(*node.as_ptr()).value })
    }

    pub fn insert_unique_iter<I: IntoIterator<Item = T>>(&mut self, iter: I) -> MemoryResult<()> {
        let iter = iter.into_iter();
        self.resize(self.len.saturating_add(iter.size_hint().0))?;
        for value in iter {
            self.insert_unique(value)?;
        }
        Ok(())
    }

    pub fn insert_equal_iter<I: IntoIterator<Item = T>>(&mut self, iter: I) -> MemoryResult<()> {
        let iter = iter.into_iter();
        self.resize(self.len.saturating_add(iter.size_hint().0))?;
        for value in iter {
            self.insert_equal(value)?;
        }
        Ok(())
    }

    /// Locates `key` ahead of a possible insertion.
    pub(crate) fn locate(&self, key: &KoV::Key) -> HashSlot<T> {
        match self.find_in_bucket(self.bucket_index(key), key) {
            Some(node) => HashSlot::Occupied(node),
            None => HashSlot::Vacant,
        }
    }

    /// Element at `slot`, inserting `make()` first when it is vacant. `slot`
    /// must come from [`locate`](Self::locate) with no mutation since.
    pub(crate) fn fill_slot(
        &mut self,
        slot: HashSlot<T>,
        make: impl FnOnce() -> T,
    ) -> MemoryResult<&mut T> {
        let node = match slot {
            HashSlot::Occupied(node) => node,
            HashSlot::Vacant => {
                let node = self.create_node(make())?;
                self.grow_for(node)?;
                // SAFETY: node is live; the bucket is taken under the final count.
                let bucket = self.bucket_index(unsafe { self.node_key(node) });
                self.push_front(bucket, node);
                node
            }
        };
        // SAFETY: node is live and borrowed through &mut self.
        Ok(unsafe { &mut (*node.as_ptr()).value })
    }

    /// The existing element with `value`'s key, or `value` freshly inserted.
    ///
    /// The returned reference must not be used to change the key.
    pub fn find_or_insert(&mut self, value: T) -> MemoryResult<&mut T> {
        let slot = self.locate(self.key_of.key(&value));
        self.fill_slot(slot, || value)
    }

    pub fn find(&self, key: &KoV::Key) -> Option<&T> {
        let node = self.find_in_bucket(self.bucket_index(key), key)?;
        // SAFETY: node is live and borrowed through &self.
        Some(unsafe { &(*node.as_ptr()).value })
    }

    pub(crate) fn find_mut(&mut self, key: &KoV::Key) -> Option<&mut T> {
        let node = self.find_in_bucket(self.bucket_index(key), key)?;
        // SAFETY: node is live and borrowed through &mut self.
        Some(unsafe { &mut (*node.as_ptr()).value })
    }

    pub fn contains(&self, key: &KoV::Key) -> bool {
        self.find(key).is_some()
    }

    /// Number of elements with an equivalent key.
    pub fn count(&self, key: &KoV::Key) -> usize {
        let mut count = 0;
        let mut cur = self.buckets()[self.bucket_index(key)];
        while let Some(node) = cur {
            // SAFETY: chain nodes are live.
            unsafe {
                if self.eq.eq(self.node_key(node), key) {
                    count += 1;
                }
                cur = (*node.as_ptr()).next;
            }
        }
        count
    }

    /// The contiguous run of elements equivalent to `key`.
    pub fn equal_range(&self, key: &KoV::Key) -> Iter<'_, T> {
        let bucket = self.bucket_index(key);
        let Some(first) = self.find_in_bucket(bucket, key) else {
            return Iter::empty(self.buckets());
        };
        let mut run = 0;
        let mut cur = Some(first);
        while let Some(node) = cur {
            // SAFETY: chain nodes are live.
            unsafe {
                if !self.eq.eq(self.node_key(node), key) {
                    break;
                }
                run += 1;
                cur = (*node.as_ptr()).next;
            }
        }
        Iter::starting_at(self.buckets(), bucket, first, run)
    }

    /// Erases every element with an equivalent key; returns how many.
    pub fn erase(&mut self, key: &KoV::Key) -> usize {
        let bucket = self.bucket_index(key);
        let mut erased = 0;
        // SAFETY: `link` always points at a live chain slot; matched nodes are
        // unlinked before they are destroyed.
        unsafe {
            let mut link: *mut Link<T> = self.buckets.as_ptr().add(bucket);
            while let Some(node) = *link {
                if self.eq.eq(self.node_key(node), key) {
                    *link = (*node.as_ptr()).next;
                    drop(self.destroy_node(node));
                    erased += 1;
                } else {
                    link = &raw mut (*node.as_ptr()).next;
                }
            }
        }
        self.len -= erased;
        erased
    }

    /// Removes the first element found for `key`.
    pub fn remove_one(&mut self, key: &KoV::Key) -> Option<T> {
        let bucket = self.bucket_index(key);
        // SAFETY: as in erase.
        unsafe {
            let mut link: *mut Link<T> = self.buckets.as_ptr().add(bucket);
            while let Some(node) = *link {
                if self.eq.eq(self.node_key(node), key) {
                    *link = (*node.as_ptr()).next;
                    self.len -= 1;
                    return Some(self.destroy_node(node));
                }
                link = &raw mut (*node.as_ptr()).next;
            }
        }
        None
    }

    /// Checks that the bucket count is a listed prime, that every node sits
    /// in the bucket its hash selects, that equivalent keys form a single
    /// run per bucket and that the recorded length matches.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        if !is_listed(self.bucket_count) {
            return Err(InvariantViolation::BucketCountNotPrime(self.bucket_count));
        }
        let mut counted = 0;
        for (bucket, head) in self.buckets().iter().enumerate() {
            let mut seen: Vec<NonNull<HashNode<T>>> = Vec::new();
            let mut cur = *head;
            while let Some(node) = cur {
                // SAFETY: chain nodes are live.
                unsafe {
                    let key = self.node_key(node);
                    let expected = self.bucket_index(key);
                    if expected != bucket {
                        return Err(InvariantViolation::MisplacedNode {
                            found: bucket,
                            expected,
                        });
                    }
                    let same_key =
                        |prev: &NonNull<HashNode<T>>| self.eq.eq(self.node_key(*prev), key);
                    if !seen.last().is_some_and(same_key) && seen.iter().any(same_key) {
                        return Err(InvariantViolation::ScatteredDuplicates { bucket });
                    }
                    seen.push(node);
                    cur = (*node.as_ptr()).next;
                }
            }
            counted += seen.len();
        }
        if counted != self.len {
            return Err(InvariantViolation::LengthMismatch {
                recorded: self.len,
                counted,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Trait impls
// ============================================================================

impl<T, KoV, H, E, A: Allocator> Drop for HashTable<T, KoV, H, E, A> {
    fn drop(&mut self) {
        self.clear();
        // SAFETY: the array came from alloc_buckets with bucket_count.
        unsafe { self.alloc.dealloc_array(self.buckets, self.bucket_count) };
    }
}

impl<T, KoV, H, E, A> Clone for HashTable<T, KoV, H, E, A>
where
    T: Clone,
    KoV: Clone,
    H: Clone,
    E: Clone,
    A: Allocator + Clone,
{
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(table) => table,
            Err(err) => handle_alloc_failure(err),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if let Err(err) = self.try_clone_from(source) {
            handle_alloc_failure(err);
        }
    }
}

impl<T: fmt::Debug, KoV, H, E, A: Allocator> fmt::Debug for HashTable<T, KoV, H, E, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T, KoV, H, E, A: Allocator> IntoIterator for &'a HashTable<T, KoV, H, E, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T, KoV, H, E, A: Allocator> IntoIterator for HashTable<T, KoV, H, E, A> {
    type Item = T;
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> IntoIter<T, A> {
        let mut table = mem::ManuallyDrop::new(self);
        let (buckets, bucket_count, len) = (table.buckets, table.bucket_count, table.len);
        // SAFETY: table is never dropped; the allocator is moved out once and
        // the strategy objects are dropped in place once. Nodes and the
        // bucket array pass to the iterator.
        unsafe {
            let alloc = ptr::read(&raw const table.alloc);
            ptr::drop_in_place(&raw mut table.key_of);
            ptr::drop_in_place(&raw mut table.hash);
            ptr::drop_in_place(&raw mut table.eq);
            IntoIter::new(buckets, bucket_count, len, alloc)
        }
    }
}
