//! Mutex-guarded pool for callers that share one pool across threads.

use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;

use parking_lot::Mutex;

use super::allocator::byte_layout;
use super::state::PoolState;
use super::{PoolConfig, PoolStats};
use crate::allocator::{AllocResult, Allocator, MemoryUsage, SystemAllocator};
use crate::error::MemoryResult;

/// Thread-safe front end over the same segmented free-list algorithm
///
/// Every operation takes one `parking_lot` lock for its whole duration, so the
/// pool's invariants never observe interleaving. The containers themselves
/// stay single-threaded; only the pool they draw from is shared.
pub struct SyncPoolAllocator<B: Allocator = SystemAllocator> {
    state: Mutex<PoolState<B>>,
}

impl SyncPoolAllocator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PoolState::new(SystemAllocator, PoolConfig::default())),
        }
    }

    pub fn with_config(config: PoolConfig) -> MemoryResult<Self> {
        Self::with_backing(SystemAllocator, config)
    }
}

impl<B: Allocator> SyncPoolAllocator<B> {
    pub fn with_backing(backing: B, config: PoolConfig) -> MemoryResult<Self> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(PoolState::new(backing, config)),
        })
    }

    pub fn allocate_bytes(&self, n: usize) -> AllocResult<NonNull<u8>> {
        let layout = byte_layout(n)?;
        Ok(self.state.lock().allocate(layout)?.cast())
    }

    /// # Safety
    /// Same contract as [`PoolAllocator::deallocate_bytes`](super::PoolAllocator::deallocate_bytes).
    pub unsafe fn deallocate_bytes(&self, ptr: NonNull<u8>, n: usize) {
        if let Ok(layout) = byte_layout(n) {
            // SAFETY: forwarded caller contract.
            unsafe { self.state.lock().deallocate(ptr, layout) };
        }
    }

    /// # Safety
    /// Same contract as [`PoolAllocator::reallocate_bytes`](super::PoolAllocator::reallocate_bytes).
    pub unsafe fn reallocate_bytes(
        &self,
        ptr: NonNull<u8>,
        old_n: usize,
        new_n: usize,
    ) -> AllocResult<NonNull<u8>> {
        let old_layout = byte_layout(old_n)?;
        let new_layout = byte_layout(new_n)?;
        // SAFETY: forwarded caller contract.
        let block = unsafe { self.state.lock().reallocate(ptr, old_layout, new_layout)? };
        Ok(block.cast())
    }

    pub fn heap_size(&self) -> usize {
        self.state.lock().heap_size()
    }

    pub fn arena_remaining(&self) -> usize {
        self.state.lock().arena_remaining()
    }

    pub fn free_blocks(&self, bytes: usize) -> usize {
        self.state.lock().free_blocks(bytes)
    }

    pub fn stats(&self) -> Option<PoolStats> {
        self.state.lock().stats()
    }

    pub fn config(&self) -> PoolConfig {
        self.state.lock().config().clone()
    }
}

impl Default for SyncPoolAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Allocator> fmt::Debug for SyncPoolAllocator<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_lock() {
            Some(state) => f
                .debug_struct("SyncPoolAllocator")
                .field("heap_size", &state.heap_size())
                .field("arena_remaining", &state.arena_remaining())
                .field("config", state.config())
                .finish(),
            None => f.write_str("SyncPoolAllocator { <locked> }"),
        }
    }
}

// SAFETY: identical to PoolAllocator, with the mutex standing in for RefCell.
unsafe impl<B: Allocator> Allocator for SyncPoolAllocator<B> {
    #[inline]
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        self.state.lock().allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { self.state.lock().deallocate(ptr, layout) }
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        // SAFETY: forwarded caller contract.
        unsafe { self.state.lock().reallocate(ptr, old_layout, new_layout) }
    }
}

impl<B: Allocator> MemoryUsage for SyncPoolAllocator<B> {
    fn used_memory(&self) -> usize {
        let state = self.state.lock();
        state.heap_size() - state.free_bytes() - state.arena_remaining()
    }

    fn available_memory(&self) -> Option<usize> {
        let state = self.state.lock();
        Some(state.free_bytes() + state.arena_remaining())
    }

    fn total_memory(&self) -> Option<usize> {
        Some(self.heap_size())
    }
}
