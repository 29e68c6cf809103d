//! System allocator implementation
//!
//! Thin wrapper over [`std::alloc::System`]. The pool uses it as its default
//! backing allocator and for every request above the pooled size limit.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};
use std::alloc::System;

use super::traits::dangling_for;
use super::{AllocError, AllocResult, Allocator, MemoryUsage};

/// Wrapper for the system's default allocator
///
/// Stateless and inherently thread-safe; copying it is free.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemAllocator;

impl SystemAllocator {
    /// Creates a new SystemAllocator
    #[inline]
    pub const fn new() -> Self {
        SystemAllocator
    }
}

// SAFETY: every request is forwarded to `System`, which upholds the
// GlobalAlloc contract; zero-sized requests never reach it.
unsafe impl Allocator for SystemAllocator {
    #[inline]
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            return Ok(dangling_for(layout));
        }

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { System.alloc(layout) };
        match NonNull::new(raw) {
            Some(ptr) => Ok(NonNull::slice_from_raw_parts(ptr, layout.size())),
            None => Err(AllocError::out_of_memory_with_layout(layout)),
        }
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        // SAFETY: caller guarantees ptr came from `allocate` with this layout.
        unsafe { System.dealloc(ptr.as_ptr(), layout) };
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        if old_layout.align() == new_layout.align()
            && old_layout.size() > 0
            && new_layout.size() > 0
        {
            // SAFETY:
            // - ptr was allocated by System with old_layout (caller contract)
            // - new size is non-zero and alignment is unchanged
            let raw = unsafe { System.realloc(ptr.as_ptr(), old_layout, new_layout.size()) };
            return match NonNull::new(raw) {
                Some(new_ptr) => Ok(NonNull::slice_from_raw_parts(new_ptr, new_layout.size())),
                None => Err(AllocError::out_of_memory_with_layout(new_layout)),
            };
        }

        // SAFETY: new_layout is a valid Layout.
        let new_ptr = unsafe { self.allocate(new_layout)? };
        let copy_size = old_layout.size().min(new_layout.size());
        if copy_size > 0 {
            // SAFETY: both regions are live, distinct and at least copy_size long.
            unsafe {
                ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.cast::<u8>().as_ptr(), copy_size);
            }
        }
        // SAFETY: ptr/old_layout describe the original allocation.
        unsafe { self.deallocate(ptr, old_layout) };
        Ok(new_ptr)
    }
}

// System allocator does not track its allocations
impl MemoryUsage for SystemAllocator {
    fn used_memory(&self) -> usize {
        0
    }

    fn available_memory(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_allocation() {
        let allocator = SystemAllocator::new();
        let layout = Layout::new::<u64>();

        unsafe {
            let ptr = allocator.allocate(layout).unwrap();
            assert_eq!(ptr.len(), layout.size());
            allocator.deallocate(ptr.cast(), layout);
        }
    }

    #[test]
    fn test_zero_sized_allocation() {
        let allocator = SystemAllocator::new();
        let layout = Layout::from_size_align(0, 16).unwrap();

        unsafe {
            let ptr = allocator.allocate(layout).unwrap();
            assert_eq!(ptr.len(), 0);
            assert_eq!(ptr.cast::<u8>().as_ptr() as usize % 16, 0);
            allocator.deallocate(ptr.cast(), layout);
        }
    }

    #[test]
    fn test_reallocate_preserves_prefix() {
        let allocator = SystemAllocator::new();
        let old = Layout::from_size_align(256, 8).unwrap();
        let new = Layout::from_size_align(1024, 8).unwrap();

        unsafe {
            let ptr = allocator.allocate(old).unwrap().cast::<u8>();
            ptr::write_bytes(ptr.as_ptr(), 0x5A, 256);

            let grown = allocator.reallocate(ptr, old, new).unwrap().cast::<u8>();
            let prefix = core::slice::from_raw_parts(grown.as_ptr(), 256);
            assert!(prefix.iter().all(|&b| b == 0x5A));
            allocator.deallocate(grown, new);
        }
    }

    #[test]
    fn test_memory_usage_unknown() {
        let allocator = SystemAllocator::new();
        assert_eq!(allocator.used_memory(), 0);
        assert_eq!(allocator.total_memory(), None);
        assert_eq!(allocator.memory_usage_percent(), None);
    }
}
