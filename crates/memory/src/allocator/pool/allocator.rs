//! Single-threaded pool allocator
//!
//! # Memory Layout
//! ```text
//! arena chunk:  [blk][blk][blk]...[blk][ unused tail ]
//!                 ↑ handed out         ↑ start_free  ↑ end_free
//!
//! free_lists[0] (8 B)   → blk → blk → null
//! free_lists[1] (16 B)  → null
//! ...
//! free_lists[15] (128 B) → blk → null
//! ```
//!
//! Requests up to 128 bytes with alignment up to 8 are rounded to a size
//! class and served from that class's free list; a dry list is refilled with
//! a batch carved from the arena. Everything else goes to the backing
//! allocator unchanged.

use core::alloc::Layout;
use core::cell::RefCell;
use core::fmt;
use core::ptr::NonNull;

use super::size_class::ALIGN;
use super::state::PoolState;
use super::{PoolConfig, PoolStats};
use crate::allocator::{AllocError, AllocResult, Allocator, MemoryUsage, SystemAllocator};
use crate::error::MemoryResult;

/// Segmented free-list pool allocator
///
/// One instance is meant to be shared by many containers through a handle
/// (`&PoolAllocator`, `Rc<PoolAllocator>`). It is `!Sync`; use
/// [`SyncPoolAllocator`](super::SyncPoolAllocator) when the pool has to be
/// reached from several threads.
///
/// Arena memory is never returned to the backing allocator while the pool
/// lives. Dropping the pool frees every chunk, so it must outlive every block
/// it handed out.
pub struct PoolAllocator<B: Allocator = SystemAllocator> {
    state: RefCell<PoolState<B>>,
}

impl PoolAllocator {
    /// Creates a pool over the system allocator with the default configuration
    pub fn new() -> Self {
        Self {
            state: RefCell::new(PoolState::new(SystemAllocator, PoolConfig::default())),
        }
    }

    /// Creates a pool over the system allocator with a custom configuration
    pub fn with_config(config: PoolConfig) -> MemoryResult<Self> {
        Self::with_backing(SystemAllocator, config)
    }
}

impl<B: Allocator> PoolAllocator<B> {
    /// Creates a pool drawing its arena and large blocks from `backing`
    pub fn with_backing(backing: B, config: PoolConfig) -> MemoryResult<Self> {
        config.validate()?;
        Ok(Self {
            state: RefCell::new(PoolState::new(backing, config)),
        })
    }

    /// Allocates at least `n` bytes aligned to 8
    ///
    /// Zero bytes yields a dangling, well-aligned pointer.
    pub fn allocate_bytes(&self, n: usize) -> AllocResult<NonNull<u8>> {
        let layout = byte_layout(n)?;
        Ok(self.state.borrow_mut().allocate(layout)?.cast())
    }

    /// Returns a block obtained from [`allocate_bytes`](Self::allocate_bytes)
    ///
    /// # Safety
    /// - `ptr` must come from `allocate_bytes(n)` or `reallocate_bytes(_, _, n)`
    ///   on this pool, with this exact `n`
    /// - The block must not be used afterwards
    pub unsafe fn deallocate_bytes(&self, ptr: NonNull<u8>, n: usize) {
        if let Ok(layout) = byte_layout(n) {
            // SAFETY: forwarded caller contract.
            unsafe { self.state.borrow_mut().deallocate(ptr, layout) };
        }
    }

    /// Resizes a block obtained from [`allocate_bytes`](Self::allocate_bytes)
    ///
    /// Same size class returns `ptr` unchanged; two large sizes use the
    /// backing allocator's realloc; anything else moves the first
    /// `min(old_n, new_n)` bytes to a new block.
    ///
    /// # Safety
    /// `ptr` must come from this pool with size `old_n`. On success the old
    /// pointer must no longer be used unless it was returned again.
    pub unsafe fn reallocate_bytes(
        &self,
        ptr: NonNull<u8>,
        old_n: usize,
        new_n: usize,
    ) -> AllocResult<NonNull<u8>> {
        let old_layout = byte_layout(old_n)?;
        let new_layout = byte_layout(new_n)?;
        // SAFETY: forwarded caller contract.
        let block = unsafe {
            self.state
                .borrow_mut()
                .reallocate(ptr, old_layout, new_layout)?
        };
        Ok(block.cast())
    }

    /// Bytes obtained from the backing allocator for the arena so far
    pub fn heap_size(&self) -> usize {
        self.state.borrow().heap_size()
    }

    /// Bytes left in the current arena chunk
    pub fn arena_remaining(&self) -> usize {
        self.state.borrow().arena_remaining()
    }

    /// Length of the free list serving `bytes`-sized requests
    ///
    /// Returns 0 for sizes outside the pooled range.
    pub fn free_blocks(&self, bytes: usize) -> usize {
        self.state.borrow().free_blocks(bytes)
    }

    /// Get statistics (if tracking is enabled)
    pub fn stats(&self) -> Option<PoolStats> {
        self.state.borrow().stats()
    }

    /// Returns a copy of the active configuration
    pub fn config(&self) -> PoolConfig {
        self.state.borrow().config().clone()
    }
}

pub(super) fn byte_layout(n: usize) -> AllocResult<Layout> {
    Layout::from_size_align(n, ALIGN)
        .map_err(|_| AllocError::invalid_layout("byte request overflows isize"))
}

impl Default for PoolAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Allocator> fmt::Debug for PoolAllocator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("PoolAllocator")
                .field("heap_size", &state.heap_size())
                .field("arena_remaining", &state.arena_remaining())
                .field("config", state.config())
                .finish(),
            Err(_) => f.write_str("PoolAllocator { <busy> }"),
        }
    }
}

// SAFETY:
// - pooled blocks are disjoint slices of arena chunks, each handed out once
//   until it is pushed back
// - large blocks come straight from the backing allocator
// - RefCell serialises every state mutation on this thread
unsafe impl<B: Allocator> Allocator for PoolAllocator<B> {
    #[inline]
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        self.state.borrow_mut().allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { self.state.borrow_mut().deallocate(ptr, layout) }
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        // SAFETY: forwarded caller contract.
        unsafe {
            self.state
                .borrow_mut()
                .reallocate(ptr, old_layout, new_layout)
        }
    }
}

impl<B: Allocator> MemoryUsage for PoolAllocator<B> {
    fn used_memory(&self) -> usize {
        let state = self.state.borrow();
        state.heap_size() - state.free_bytes() - state.arena_remaining()
    }

    fn available_memory(&self) -> Option<usize> {
        let state = self.state.borrow();
        Some(state.free_bytes() + state.arena_remaining())
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.heap_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::TypedAllocator;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_allocation_grows_arena() {
        let pool = PoolAllocator::with_config(PoolConfig::debug()).unwrap();
        let ptr = pool.allocate_bytes(24).unwrap();

        // 2 * (20 * 24) + round_up(0)
        assert_eq!(pool.heap_size(), 960);
        assert_eq!(pool.arena_remaining(), 480);
        assert_eq!(pool.free_blocks(24), 19);

        unsafe { pool.deallocate_bytes(ptr, 24) };
        assert_eq!(pool.free_blocks(24), 20);
    }

    #[test]
    fn test_same_class_reuses_block() {
        let pool = PoolAllocator::with_config(PoolConfig::production()).unwrap();
        let a = pool.allocate_bytes(17).unwrap();
        unsafe { pool.deallocate_bytes(a, 17) };
        let b = pool.allocate_bytes(24).unwrap();
        assert_eq!(a, b);
        unsafe { pool.deallocate_bytes(b, 24) };
    }

    #[test]
    fn test_realloc_within_class_is_noop() {
        let pool = PoolAllocator::new();
        let ptr = pool.allocate_bytes(9).unwrap();
        let same = unsafe { pool.reallocate_bytes(ptr, 9, 16) }.unwrap();
        assert_eq!(ptr, same);
        unsafe { pool.deallocate_bytes(same, 16) };
    }

    #[test]
    fn test_realloc_across_classes_copies() {
        let pool = PoolAllocator::with_config(PoolConfig::production()).unwrap();
        let ptr = pool.allocate_bytes(8).unwrap();
        unsafe {
            ptr.cast::<u64>().as_ptr().write(0xDEAD_BEEF);
            let moved = pool.reallocate_bytes(ptr, 8, 200).unwrap();
            assert_eq!(moved.cast::<u64>().as_ptr().read(), 0xDEAD_BEEF);
            let back = pool.reallocate_bytes(moved, 200, 16).unwrap();
            assert_eq!(back.cast::<u64>().as_ptr().read(), 0xDEAD_BEEF);
            pool.deallocate_bytes(back, 16);
        }
    }

    #[test]
    fn test_debug_patterns() {
        let pool = PoolAllocator::with_config(PoolConfig::debug()).unwrap();
        let ptr = pool.allocate_bytes(32).unwrap();
        let bytes = unsafe { core::slice::from_raw_parts(ptr.as_ptr(), 32) };
        assert!(bytes.iter().all(|&b| b == 0xBB));

        unsafe { pool.deallocate_bytes(ptr, 32) };
        // The first word now holds the free-list link; the rest keeps the poison.
        let tail = unsafe { core::slice::from_raw_parts(ptr.as_ptr().add(8), 24) };
        assert!(tail.iter().all(|&b| b == 0xDD));
    }

    #[test]
    fn test_typed_nodes_through_pool() {
        let pool = PoolAllocator::with_config(PoolConfig::debug()).unwrap();
        unsafe {
            let node = pool.alloc_init((7u32, 9u64)).unwrap();
            assert_eq!(*node.as_ref(), (7, 9));
            pool.dealloc_typed(node);
        }
        let stats = pool.stats().unwrap();
        assert_eq!(stats.pooled_allocs, 1);
        assert_eq!(stats.pooled_deallocs, 1);
        assert_eq!(stats.outstanding_pooled(), 0);
    }

    #[test]
    fn test_memory_usage_accounts_for_arena() {
        let pool = PoolAllocator::new();
        let ptr = pool.allocate_bytes(64).unwrap();
        assert_eq!(pool.used_memory(), 64);
        assert_eq!(pool.total_memory(), Some(pool.heap_size()));
        unsafe { pool.deallocate_bytes(ptr, 64) };
        assert_eq!(pool.used_memory(), 0);
    }

    #[test]
    fn test_stats_disabled_in_production() {
        let pool = PoolAllocator::with_config(PoolConfig::production()).unwrap();
        assert!(pool.stats().is_none());
    }
}
