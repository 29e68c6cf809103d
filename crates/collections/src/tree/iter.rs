//! Borrowing, range and consuming iterators over an [`RbTree`](super::RbTree).

use core::fmt;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ptr;

use cairn_memory::allocator::{Allocator, TypedAllocator};

use super::node::{Link, NodePtr};
use super::rebalance::{decrement, increment, root};

/// Frees every node below and including `x`. Values are dropped only when
/// `drop_values` is set; otherwise they must already have been moved out.
///
/// # Safety
/// `x` must be a subtree of nodes allocated from `alloc` as `Node<T>`, with no
/// other owner.
pub(crate) unsafe fn free_subtree<T, A: Allocator>(alloc: &A, mut x: Link, drop_values: bool) {
    // Recurse right, loop left: depth is bounded by the tree height.
    while let Some(node) = x {
        // SAFETY: node is a live Node<T> of this subtree; its links are read
        // before it is freed.
        unsafe {
            free_subtree::<T, A>(alloc, node.right(), drop_values);
            x = node.left();
            let raw = node.as_node::<T>();
            if drop_values {
                ptr::drop_in_place(&raw mut (*raw.as_ptr()).value);
            }
            alloc.dealloc_typed(raw);
        }
    }
}

// ============================================================================
// Iter
// ============================================================================

/// In-order iterator over a whole tree.
pub struct Iter<'a, T> {
    front: NodePtr,
    back: NodePtr,
    header: NodePtr,
    len: usize,
    marker: PhantomData<&'a T>,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(front: NodePtr, header: NodePtr, len: usize) -> Self {
        Self {
            front,
            back: header,
            header,
            len,
            marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.len == 0 {
            return None;
        }
        let node = self.front;
        self.len -= 1;
        // SAFETY: len > 0, so front is a real node borrowed for 'a.
        unsafe {
            self.front = increment(node);
            Some(node.value::<T>())
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<&'a T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: len > 0, so the predecessor of back is a real node.
        unsafe {
            self.back = decrement(self.back, self.header);
            Some(self.back.value::<T>())
        }
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

// ============================================================================
// Range
// ============================================================================

/// In-order iterator over the half-open node interval `[front, back)`.
pub struct Range<'a, T> {
    front: NodePtr,
    back: NodePtr,
    header: NodePtr,
    marker: PhantomData<&'a T>,
}

impl<'a, T> Range<'a, T> {
    pub(crate) fn new(front: NodePtr, back: NodePtr, header: NodePtr) -> Self {
        Self {
            front,
            back,
            header,
            marker: PhantomData,
        }
    }

    pub(crate) fn empty(header: NodePtr) -> Self {
        Self::new(header, header, header)
    }
}

impl<'a, T> Iterator for Range<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.front == self.back {
            return None;
        }
        let node = self.front;
        // SAFETY: front precedes back, so it is a real node.
        unsafe {
            self.front = increment(node);
            Some(node.value::<T>())
        }
    }
}

impl<'a, T> DoubleEndedIterator for Range<'a, T> {
    fn next_back(&mut self) -> Option<&'a T> {
        if self.front == self.back {
            return None;
        }
        // SAFETY: back follows front, so its predecessor is a real node.
        unsafe {
            self.back = decrement(self.back, self.header);
            Some(self.back.value::<T>())
        }
    }
}

impl<T> FusedIterator for Range<'_, T> {}

impl<T> Clone for Range<'_, T> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<T: fmt::Debug> fmt::Debug for Range<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

// ============================================================================
// IntoIter
// ============================================================================

/// Consuming in-order iterator. Links stay intact while values are moved out;
/// the nodes themselves are freed when the iterator is dropped.
pub struct IntoIter<T, A: Allocator> {
    header: NodePtr,
    front: NodePtr,
    back: NodePtr,
    len: usize,
    alloc: A,
    marker: PhantomData<T>,
}

impl<T, A: Allocator> IntoIter<T, A> {
    pub(crate) fn new(header: NodePtr, front: NodePtr, len: usize, alloc: A) -> Self {
        Self {
            header,
            front,
            back: header,
            len,
            alloc,
            marker: PhantomData,
        }
    }
}

impl<T, A: Allocator> Iterator for IntoIter<T, A> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let node = self.front;
        self.len -= 1;
        // SAFETY: node is a real node whose value has not been moved out yet;
        // increment only reads links.
        unsafe {
            self.front = increment(node);
            Some(ptr::read(node.value::<T>()))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T, A: Allocator> DoubleEndedIterator for IntoIter<T, A> {
    fn next_back(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: as in next.
        unsafe {
            self.back = decrement(self.back, self.header);
            Some(ptr::read(self.back.value::<T>()))
        }
    }
}

impl<T, A: Allocator> ExactSizeIterator for IntoIter<T, A> {}
impl<T, A: Allocator> FusedIterator for IntoIter<T, A> {}

impl<T, A: Allocator> Drop for IntoIter<T, A> {
    fn drop(&mut self) {
        for value in self.by_ref() {
            drop(value);
        }
        // SAFETY:
        // - every value has been moved out, so nodes are freed without drop
        // - the header came from Box::into_raw in RbTree::new_in
        unsafe {
            free_subtree::<T, A>(&self.alloc, root(self.header), false);
            drop(Box::from_raw(self.header.as_base().as_ptr()));
        }
    }
}

// SAFETY: IntoIter owns its nodes exactly like the tree it came from.
unsafe impl<T: Send, A: Allocator + Send> Send for IntoIter<T, A> {}
// SAFETY: shared access only reads the length.
unsafe impl<T: Sync, A: Allocator + Sync> Sync for IntoIter<T, A> {}

// SAFETY: Iter only hands out shared references to T.
unsafe impl<T: Sync> Send for Iter<'_, T> {}
// SAFETY: through `&Iter` nodes are only read, and `T: Sync`.
unsafe impl<T: Sync> Sync for Iter<'_, T> {}
// SAFETY: Range only hands out shared references to T.
unsafe impl<T: Sync> Send for Range<'_, T> {}
// SAFETY: through `&Range` nodes are only read, and `T: Sync`.
unsafe impl<T: Sync> Sync for Range<'_, T> {}
