//! Intrusive free lists, one per size class.
//!
//! # Safety
//!
//! A block is either *live* (owned by a caller, contents opaque to the pool)
//! or *free* (linked into exactly one list, its first word reinterpreted as a
//! [`FreeBlock`]). The two views never overlap in time: a block is only ever
//! read as a `FreeBlock` while it sits on a list, and [`FreeLists::pop`]
//! unlinks it before handing it out. Each list holds blocks of exactly
//! `class_size(index)` bytes.

use core::ptr::NonNull;

use super::size_class::{N_FREE_LISTS, class_size};

/// Overlay written into the first word of a free block.
#[repr(C)]
pub(super) struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

/// Heads of the segmented free lists plus their lengths.
pub(super) struct FreeLists {
    heads: [Option<NonNull<FreeBlock>>; N_FREE_LISTS],
    lens: [usize; N_FREE_LISTS],
}

impl FreeLists {
    pub(super) const fn new() -> Self {
        Self {
            heads: [None; N_FREE_LISTS],
            lens: [0; N_FREE_LISTS],
        }
    }

    /// Links `block` in as the new head of list `index`.
    ///
    /// # Safety
    /// - `block` must point to `class_size(index)` writable bytes, aligned for
    ///   a pointer, that nobody else uses until they are popped again
    /// - `block` must not already be on any list
    #[inline]
    pub(super) unsafe fn push(&mut self, index: usize, block: NonNull<u8>) {
        let node = block.cast::<FreeBlock>();
        // SAFETY:
        // - block is at least 8 bytes and 8-aligned (every class is)
        // - the caller gave up the block, so reinterpreting it is exclusive
        unsafe {
            node.as_ptr().write(FreeBlock {
                next: self.heads[index],
            });
        }
        self.heads[index] = Some(node);
        self.lens[index] += 1;
    }

    /// Unlinks and returns the head of list `index`, if any.
    #[inline]
    pub(super) fn pop(&mut self, index: usize) -> Option<NonNull<u8>> {
        let head = self.heads[index]?;
        // SAFETY: head is on the list, so its first word is a valid FreeBlock
        // written by `push`.
        self.heads[index] = unsafe { head.as_ref().next };
        self.lens[index] -= 1;
        Some(head.cast())
    }

    #[inline]
    pub(super) fn len(&self, index: usize) -> usize {
        self.lens[index]
    }

    pub(super) fn lens(&self) -> [usize; N_FREE_LISTS] {
        self.lens
    }

    /// Total bytes sitting on all lists.
    pub(super) fn free_bytes(&self) -> usize {
        self.lens
            .iter()
            .enumerate()
            .map(|(index, &len)| len * class_size(index))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_lifo() {
        let mut storage = [[0u64; 2]; 3];
        let mut lists = FreeLists::new();

        unsafe {
            for slot in &mut storage {
                lists.push(1, NonNull::from(slot).cast());
            }
        }
        assert_eq!(lists.len(1), 3);
        assert_eq!(lists.free_bytes(), 48);

        let last = NonNull::from(&mut storage[2]).cast::<u8>();
        assert_eq!(lists.pop(1), Some(last));
        assert_eq!(lists.len(1), 2);
        assert!(lists.pop(0).is_none());

        lists.pop(1);
        lists.pop(1);
        assert!(lists.pop(1).is_none());
        assert_eq!(lists.lens(), [0; N_FREE_LISTS]);
    }
}
