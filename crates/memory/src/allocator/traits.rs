//! Allocator traits shared by the pool, the system passthrough and the
//! containers.
//!
//! The system is built around three traits:
//! - `Allocator`: raw allocation/deallocation/reallocation by [`Layout`]
//! - `TypedAllocator`: typed helpers used for container nodes and bucket
//!   arrays (blanket-implemented for every `Allocator`)
//! - `MemoryUsage`: capacity reporting
//!
//! # Safety
//!
//! `Allocator` is an unsafe trait: implementors promise that returned
//! pointers are valid, aligned to the requested layout and exclusive to the
//! caller until handed back. Callers promise to hand a pointer back with the
//! exact layout used to obtain it; the pool trusts that size and performs no
//! bookkeeping of its own to verify it.

use core::alloc::Layout;
use core::ptr::{self, NonNull};
use std::rc::Rc;
use std::sync::Arc;

use super::{AllocError, AllocResult};

/// Returns a well-aligned, non-null pointer for a zero-sized request.
#[inline]
pub(crate) fn dangling_for(layout: Layout) -> NonNull<[u8]> {
    // SAFETY: `Layout` guarantees a non-zero, power-of-two alignment, so the
    // address is never null.
    let ptr = unsafe { NonNull::new_unchecked(ptr::without_provenance_mut::<u8>(layout.align())) };
    NonNull::slice_from_raw_parts(ptr, 0)
}

/// Raw allocator interface
///
/// # Safety Requirements
///
/// Implementors must ensure that:
/// - Returned pointers are valid for `layout.size()` bytes of reads and writes
/// - Memory is aligned according to the layout
/// - A block is never handed out twice without an intervening deallocation
pub unsafe trait Allocator {
    /// Allocates memory with the given layout
    ///
    /// # Safety
    /// - Memory content is uninitialized and must be initialized before use
    ///
    /// # Errors
    /// Returns `OutOfMemory` when the underlying system allocator fails.
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>>;

    /// Deallocates memory at the given pointer with the specified layout
    ///
    /// # Safety
    /// - `ptr` must have been allocated by this allocator
    /// - `layout` must match the original allocation layout exactly
    /// - After this call, `ptr` becomes invalid and must not be used
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Resizes an existing allocation
    ///
    /// The default implementation allocates, copies `min(old, new)` bytes and
    /// frees the old block. On failure the old block is left untouched.
    ///
    /// # Safety
    /// - `ptr` must have been allocated by this allocator with `old_layout`
    /// - If successful, the old pointer becomes invalid
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        if old_layout == new_layout {
            return Ok(NonNull::slice_from_raw_parts(ptr, new_layout.size()));
        }

        // SAFETY: new_layout is a valid Layout; the result is uninitialized.
        let new_ptr = unsafe { self.allocate(new_layout)? };

        let copy_size = old_layout.size().min(new_layout.size());
        if copy_size > 0 {
            // SAFETY: both blocks are live, distinct and at least `copy_size`
            // bytes long.
            unsafe {
                ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.cast::<u8>().as_ptr(), copy_size);
            }
        }

        // SAFETY: ptr/old_layout describe the caller's original allocation.
        unsafe { self.deallocate(ptr, old_layout) };
        Ok(new_ptr)
    }
}

/// Typed allocation helpers
///
/// This is the fixed-block sub-allocator the containers go through: one call
/// per node, keyed on `size_of::<Node>()`, plus array helpers for bucket
/// tables.
pub trait TypedAllocator: Allocator {
    /// Allocates memory for a single instance of type `T`
    ///
    /// # Safety
    /// The caller must initialize the memory before reading from it,
    /// and must deallocate it with `dealloc_typed::<T>()` when done.
    #[inline]
    unsafe fn alloc_typed<T>(&self) -> AllocResult<NonNull<T>> {
        let layout = Layout::new::<T>();
        // SAFETY: layout is derived from T at compile time.
        let ptr = unsafe { self.allocate(layout)? };
        Ok(ptr.cast::<T>())
    }

    /// Allocates memory for `T` and moves `value` into it
    ///
    /// If the allocation fails, `value` is dropped and nothing else changes.
    ///
    /// # Safety
    /// The caller must deallocate with `dealloc_typed::<T>()` when done, after
    /// dropping or moving out the value.
    #[inline]
    unsafe fn alloc_init<T>(&self, value: T) -> AllocResult<NonNull<T>> {
        // SAFETY: forwarded contract.
        let ptr = unsafe { self.alloc_typed::<T>()? };
        // SAFETY: ptr is freshly allocated, aligned and sized for T.
        unsafe { ptr.as_ptr().write(value) };
        Ok(ptr)
    }

    /// Allocates memory for an array of `count` instances of type `T`
    ///
    /// The memory is **not initialized**.
    ///
    /// # Safety
    /// Must be released with `dealloc_array::<T>()` passing the same count.
    #[inline]
    unsafe fn alloc_array<T>(&self, count: usize) -> AllocResult<NonNull<T>> {
        if count == 0 {
            return Ok(NonNull::dangling());
        }

        let layout = Layout::array::<T>(count)
            .map_err(|_| AllocError::invalid_layout("array size overflows isize"))?;
        // SAFETY: layout is valid and non-zero.
        let ptr = unsafe { self.allocate(layout)? };
        Ok(ptr.cast::<T>())
    }

    /// Deallocates memory for a single instance of type `T`
    ///
    /// # Safety
    /// - `ptr` must have come from `alloc_typed::<T>()` or `alloc_init::<T>()`
    /// - Any value stored there must already have been dropped or moved out
    #[inline]
    unsafe fn dealloc_typed<T>(&self, ptr: NonNull<T>) {
        // SAFETY: layout matches the allocation made in alloc_typed.
        unsafe { self.deallocate(ptr.cast(), Layout::new::<T>()) }
    }

    /// Deallocates memory for an array of type `T`
    ///
    /// # Safety
    /// - `ptr` must have come from `alloc_array::<T>()` with the same `count`
    /// - Elements with destructors must already have been dropped
    #[inline]
    unsafe fn dealloc_array<T>(&self, ptr: NonNull<T>, count: usize) {
        if count == 0 {
            return;
        }

        // The same computation succeeded in alloc_array.
        if let Ok(layout) = Layout::array::<T>(count) {
            // SAFETY: ptr/layout pair matches the original allocation.
            unsafe { self.deallocate(ptr.cast(), layout) }
        }
    }
}

/// Blanket implementation: all Allocators automatically implement TypedAllocator
impl<A: Allocator + ?Sized> TypedAllocator for A {}

/// Memory usage tracking trait
///
/// Implemented by allocators that can report how much of their capacity is
/// handed out.
pub trait MemoryUsage {
    /// Get currently used memory in bytes
    fn used_memory(&self) -> usize;

    /// Get available memory in bytes (if known)
    fn available_memory(&self) -> Option<usize>;

    /// Get total memory capacity in bytes (if known)
    fn total_memory(&self) -> Option<usize> {
        self.available_memory()
            .map(|available| self.used_memory() + available)
    }

    /// Returns memory usage as a percentage (0.0 to 100.0)
    ///
    /// Returns `None` if total memory is unknown.
    fn memory_usage_percent(&self) -> Option<f32> {
        self.total_memory().map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.used_memory() as f32 / total as f32) * 100.0
            }
        })
    }
}

// ============================================================================
// Blanket implementations for shared handles
// ============================================================================

/// Forwards `Allocator` through a pointer-like handle so several containers
/// can draw from one pool (`&pool`, `Rc<pool>`, `Arc<pool>`).
macro_rules! forward_allocator {
    ($($handle:ty),+ $(,)?) => {$(
        // SAFETY: every call is forwarded unchanged to the pointee, so the
        // pointee's guarantees carry over.
        unsafe impl<T: Allocator + ?Sized> Allocator for $handle {
            #[inline]
            unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
                // SAFETY: same contract as T::allocate.
                unsafe { (**self).allocate(layout) }
            }

            #[inline]
            unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
                // SAFETY: same contract as T::deallocate.
                unsafe { (**self).deallocate(ptr, layout) }
            }

            #[inline]
            unsafe fn reallocate(
                &self,
                ptr: NonNull<u8>,
                old_layout: Layout,
                new_layout: Layout,
            ) -> AllocResult<NonNull<[u8]>> {
                // SAFETY: same contract as T::reallocate.
                unsafe { (**self).reallocate(ptr, old_layout, new_layout) }
            }
        }

        impl<T: MemoryUsage + ?Sized> MemoryUsage for $handle {
            fn used_memory(&self) -> usize {
                (**self).used_memory()
            }

            fn available_memory(&self) -> Option<usize> {
                (**self).available_memory()
            }

            fn total_memory(&self) -> Option<usize> {
                (**self).total_memory()
            }
        }
    )+};
}

forward_allocator!(&T, Rc<T>, Arc<T>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::SystemAllocator;

    #[test]
    fn test_alloc_init_roundtrip() {
        let allocator = SystemAllocator::new();
        unsafe {
            let ptr = allocator.alloc_init(String::from("node")).unwrap();
            assert_eq!(ptr.as_ref(), "node");
            ptr.as_ptr().drop_in_place();
            allocator.dealloc_typed(ptr);
        }
    }

    #[test]
    fn test_alloc_array_zero_is_dangling() {
        let allocator = SystemAllocator::new();
        unsafe {
            let ptr = allocator.alloc_array::<u64>(0).unwrap();
            assert_eq!(ptr, NonNull::dangling());
            allocator.dealloc_array(ptr, 0);
        }
    }

    #[test]
    fn test_alloc_array_overflow_is_layout_error() {
        let allocator = SystemAllocator::new();
        let err = unsafe { allocator.alloc_array::<u64>(usize::MAX) }.unwrap_err();
        assert_eq!(err.code(), "MEM:ALLOC:LAYOUT");
    }

    #[test]
    fn test_handles_forward() {
        let allocator = Rc::new(SystemAllocator::new());
        let handle = Rc::clone(&allocator);
        let layout = Layout::new::<[u64; 4]>();
        unsafe {
            let ptr = handle.allocate(layout).unwrap();
            (&*allocator).deallocate(ptr.cast(), layout);
        }
    }

    #[test]
    fn test_dangling_respects_alignment() {
        let layout = Layout::from_size_align(0, 64).unwrap();
        let ptr = dangling_for(layout);
        assert_eq!(ptr.cast::<u8>().as_ptr() as usize % 64, 0);
    }
}
