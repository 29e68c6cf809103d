use core::fmt;
use core::iter::FusedIterator;
use core::ptr::{self, NonNull};

use cairn_memory::allocator::{Allocator, TypedAllocator};

use super::table::{HashNode, Link};

/// Forward iterator in bucket order, then chain order.
pub struct Iter<'a, T> {
    buckets: &'a [Link<T>],
    node: Link<T>,
    bucket: usize,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    /// Iterates the whole table holding `len` elements.
    pub(crate) fn new(buckets: &'a [Link<T>], len: usize) -> Self {
        let (bucket, node) = first_occupied(buckets, 0);
        Self {
            buckets,
            node,
            bucket,
            remaining: len,
        }
    }

    pub(crate) fn empty(buckets: &'a [Link<T>]) -> Self {
        Self {
            buckets,
            node: None,
            bucket: buckets.len(),
            remaining: 0,
        }
    }

    /// Yields `count` elements starting at `node` in `bucket`.
    pub(crate) fn starting_at(
        buckets: &'a [Link<T>],
        bucket: usize,
        node: NonNull<HashNode<T>>,
        count: usize,
    ) -> Self {
        Self {
            buckets,
            node: Some(node),
            bucket,
            remaining: count,
        }
    }
}

fn first_occupied<T>(buckets: &[Link<T>], from: usize) -> (usize, Link<T>) {
    buckets
        .iter()
        .enumerate()
        .skip(from)
        .find_map(|(i, head)| head.map(|node| (i, Some(node))))
        .unwrap_or((buckets.len(), None))
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.node?;
        self.remaining -= 1;
        // SAFETY: nodes reachable from the borrowed bucket array live for 'a.
        let next = unsafe { (*node.as_ptr()).next };
        self.node = match next {
            Some(_) => next,
            None => {
                let (bucket, head) = first_occupied(self.buckets, self.bucket + 1);
                self.bucket = bucket;
                head
            }
        };
        // SAFETY: as above.
        Some(unsafe { &(*node.as_ptr()).value })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<T: fmt::Debug> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

// SAFETY: Iter only hands out shared references to T.
unsafe impl<T: Sync> Send for Iter<'_, T> {}
// SAFETY: through `&Iter` nodes and buckets are only read, and `T: Sync`.
unsafe impl<T: Sync> Sync for Iter<'_, T> {}

/// Consuming iterator. Each node is unlinked and freed as its value is
/// yielded; the bucket array is released on drop.
pub struct IntoIter<T, A: Allocator> {
    buckets: NonNull<Link<T>>,
    bucket_count: usize,
    bucket: usize,
    remaining: usize,
    alloc: A,
}

impl<T, A: Allocator> IntoIter<T, A> {
    pub(crate) fn new(
        buckets: NonNull<Link<T>>,
        bucket_count: usize,
        len: usize,
        alloc: A,
    ) -> Self {
        Self {
            buckets,
            bucket_count,
            bucket: 0,
            remaining: len,
            alloc,
        }
    }
}

impl<T, A: Allocator> Iterator for IntoIter<T, A> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.remaining == 0 {
            return None;
        }
        while self.bucket < self.bucket_count {
            // SAFETY: bucket < bucket_count; the head node is unlinked before
            // its value is moved out and its memory released.
            unsafe {
                let head = self.buckets.as_ptr().add(self.bucket);
                if let Some(node) = *head {
                    *head = (*node.as_ptr()).next;
                    self.remaining -= 1;
                    let value = ptr::read(&raw const (*node.as_ptr()).value);
                    self.alloc.dealloc_typed(node);
                    return Some(value);
                }
            }
            self.bucket += 1;
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, A: Allocator> ExactSizeIterator for IntoIter<T, A> {}
impl<T, A: Allocator> FusedIterator for IntoIter<T, A> {}

impl<T, A: Allocator> Drop for IntoIter<T, A> {
    fn drop(&mut self) {
        for value in self.by_ref() {
            drop(value);
        }
        // SAFETY: every chain is empty now; the array came from the table.
        unsafe { self.alloc.dealloc_array(self.buckets, self.bucket_count) };
    }
}

// SAFETY: IntoIter owns its nodes exactly like the table it came from.
unsafe impl<T: Send, A: Allocator + Send> Send for IntoIter<T, A> {}
// SAFETY: shared access only reads counters.
unsafe impl<T: Sync, A: Allocator + Sync> Sync for IntoIter<T, A> {}
