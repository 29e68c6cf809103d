//! The segmented free-list algorithm, shared by the single-threaded and the
//! mutex-guarded pool front ends.
//!
//! ## Invariants
//!
//! - `[start_free, end_free)` is the unused tail of the current arena chunk
//!   (or of a scavenged block); it is always a multiple of `ALIGN` long
//! - Every chunk in `chunks` came from `backing` and is freed exactly once, on
//!   drop
//! - Blocks on free list `i` are exactly `class_size(i)` bytes and lie inside
//!   some chunk

use core::alloc::Layout;
use core::ptr::{self, NonNull};

use tracing::{debug, error, trace, warn};

use super::free_list::FreeLists;
use super::size_class::{
    ALIGN, MAX_BYTES, N_FREE_LISTS, class_size, free_list_index, is_pooled, round_up,
};
use super::stats::{PoolCounters, PoolStats};
use super::PoolConfig;
use crate::allocator::traits::dangling_for;
use crate::allocator::{AllocError, AllocResult, Allocator};

pub(super) struct PoolState<B: Allocator> {
    backing: B,
    config: PoolConfig,
    free_lists: FreeLists,
    start_free: NonNull<u8>,
    end_free: NonNull<u8>,
    heap_size: usize,
    chunks: Vec<(NonNull<u8>, Layout)>,
    counters: PoolCounters,
}

// SAFETY: PoolState exclusively owns its chunks and every block on its free
// lists; the raw pointers are never shared with another state. Moving it to
// another thread is sound as long as the backing allocator may move too.
unsafe impl<B: Allocator + Send> Send for PoolState<B> {}

impl<B: Allocator> PoolState<B> {
    /// Builds an empty state; `config` must already be validated.
    pub(super) fn new(backing: B, config: PoolConfig) -> Self {
        Self {
            backing,
            config,
            free_lists: FreeLists::new(),
            start_free: NonNull::dangling(),
            end_free: NonNull::dangling(),
            heap_size: 0,
            chunks: Vec::new(),
            counters: PoolCounters::default(),
        }
    }

    pub(super) fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub(super) fn heap_size(&self) -> usize {
        self.heap_size
    }

    pub(super) fn arena_remaining(&self) -> usize {
        self.end_free.as_ptr() as usize - self.start_free.as_ptr() as usize
    }

    pub(super) fn free_blocks(&self, bytes: usize) -> usize {
        if bytes == 0 || bytes > MAX_BYTES {
            return 0;
        }
        self.free_lists.len(free_list_index(bytes))
    }

    pub(super) fn free_bytes(&self) -> usize {
        self.free_lists.free_bytes()
    }

    pub(super) fn stats(&self) -> Option<PoolStats> {
        if !self.config.track_stats {
            return None;
        }

        let c = self.counters;
        Some(PoolStats {
            heap_size: self.heap_size,
            arena_remaining: self.arena_remaining(),
            free_blocks: self.free_lists.lens(),
            pooled_allocs: c.pooled_allocs,
            pooled_deallocs: c.pooled_deallocs,
            large_allocs: c.large_allocs,
            large_deallocs: c.large_deallocs,
            refills: c.refills,
            arena_grows: c.arena_grows,
            scavenges: c.scavenges,
        })
    }

    // ========================================================================
    // Layout-based entry points
    // ========================================================================

    pub(super) fn allocate(&mut self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if layout.size() == 0 {
            return Ok(dangling_for(layout));
        }

        if !is_pooled(layout) {
            // SAFETY: layout is non-zero; the block is the caller's from here.
            let block = unsafe { self.backing.allocate(layout)? };
            if self.config.track_stats {
                self.counters.large_allocs += 1;
            }
            return Ok(block);
        }

        let index = free_list_index(layout.size());
        let size = class_size(index);
        let block = match self.free_lists.pop(index) {
            Some(block) => block,
            None => self.refill(size)?,
        };

        if self.config.track_stats {
            self.counters.pooled_allocs += 1;
        }
        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: block is a freshly unlinked class-sized block.
            unsafe { ptr::write_bytes(block.as_ptr(), pattern, size) };
        }

        Ok(NonNull::slice_from_raw_parts(block, size))
    }

    /// # Safety
    /// `ptr` must come from `allocate` on this state with the same `layout`.
    pub(super) unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        if !is_pooled(layout) {
            // SAFETY: large blocks come straight from backing with this layout.
            unsafe { self.backing.deallocate(ptr, layout) };
            if self.config.track_stats {
                self.counters.large_deallocs += 1;
            }
            return;
        }

        let index = free_list_index(layout.size());
        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: the caller hands back the whole class-sized block.
            unsafe { ptr::write_bytes(ptr.as_ptr(), pattern, class_size(index)) };
        }
        // SAFETY: the block is class-sized, 8-aligned and no longer used.
        unsafe { self.free_lists.push(index, ptr) };
        if self.config.track_stats {
            self.counters.pooled_deallocs += 1;
        }
    }

    /// # Safety
    /// `ptr` must come from `allocate` on this state with `old_layout`.
    pub(super) unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> AllocResult<NonNull<[u8]>> {
        if is_pooled(old_layout)
            && is_pooled(new_layout)
            && free_list_index(old_layout.size()) == free_list_index(new_layout.size())
        {
            let size = class_size(free_list_index(new_layout.size()));
            return Ok(NonNull::slice_from_raw_parts(ptr, size));
        }

        if old_layout.size() > 0
            && new_layout.size() > 0
            && !is_pooled(old_layout)
            && !is_pooled(new_layout)
            && old_layout.align() == new_layout.align()
        {
            // SAFETY: both layouts bypass the pool, so ptr belongs to backing.
            return unsafe { self.backing.reallocate(ptr, old_layout, new_layout) };
        }

        let new_block = self.allocate(new_layout)?;
        let copy_size = old_layout.size().min(new_layout.size());
        if copy_size > 0 {
            // SAFETY: old and new blocks are distinct live allocations of at
            // least copy_size bytes.
            unsafe {
                ptr::copy_nonoverlapping(ptr.as_ptr(), new_block.cast::<u8>().as_ptr(), copy_size);
            }
        }
        // SAFETY: forwarded caller contract.
        unsafe { self.deallocate(ptr, old_layout) };
        Ok(new_block)
    }

    // ========================================================================
    // Refill and arena management
    // ========================================================================

    /// Carves a batch of `size`-byte blocks, keeps the first for the caller
    /// and threads the rest onto the matching free list.
    fn refill(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        let mut nobjs = self.config.refill_batch;
        let chunk = self.chunk_alloc(size, &mut nobjs)?;
        if self.config.track_stats {
            self.counters.refills += 1;
        }

        let index = free_list_index(size);
        // Push back to front so the list hands blocks out in address order.
        for i in (1..nobjs).rev() {
            // SAFETY:
            // - chunk spans nobjs * size bytes, so chunk + i * size is in bounds
            // - the block is fresh and not on any list
            unsafe {
                let block = chunk.add(i * size);
                self.free_lists.push(index, block);
            }
        }

        Ok(chunk)
    }

    /// Serves `*nobjs` blocks of `size` bytes from the arena, lowering
    /// `*nobjs` when only part of the batch fits.
    fn chunk_alloc(&mut self, size: usize, nobjs: &mut usize) -> AllocResult<NonNull<u8>> {
        loop {
            let total = size * *nobjs;
            let left = self.arena_remaining();

            if left >= total {
                return Ok(self.carve(total));
            }
            if left >= size {
                *nobjs = left / size;
                return Ok(self.carve(size * *nobjs));
            }

            let bytes_to_get = 2 * total + round_up(self.heap_size >> 4);

            if left > 0 {
                self.recycle_leftover(left);
            }

            if self.grow(bytes_to_get, size).is_ok() {
                continue;
            }
            if self.scavenge(size) {
                continue;
            }
            self.last_resort(size, bytes_to_get)?;
        }
    }

    fn carve(&mut self, bytes: usize) -> NonNull<u8> {
        let block = self.start_free;
        // SAFETY: callers only carve bytes <= arena_remaining().
        self.start_free = unsafe { block.add(bytes) };
        block
    }

    fn set_arena(&mut self, start: NonNull<u8>, bytes: usize) {
        self.start_free = start;
        // SAFETY: start points to a block of at least `bytes` bytes.
        self.end_free = unsafe { start.add(bytes) };
    }

    /// Files the unusable arena tail under the free list that fits it exactly.
    fn recycle_leftover(&mut self, left: usize) {
        let index = free_list_index(left);
        trace!(bytes = left, size_class = class_size(index), "recycling arena leftover");
        // SAFETY:
        // - left is a multiple of ALIGN below the requested class, so the tail
        //   is exactly one class_size(index) block
        // - the arena tail is owned by nobody else
        unsafe { self.free_lists.push(index, self.start_free) };
        self.start_free = self.end_free;
    }

    fn grow(&mut self, bytes: usize, size_class: usize) -> AllocResult<()> {
        let layout = Layout::from_size_align(bytes, ALIGN)
            .map_err(|_| AllocError::invalid_layout("arena chunk size overflows isize"))?;
        // SAFETY: layout is non-zero; the chunk is recorded and freed on drop.
        let chunk = unsafe { self.backing.allocate(layout)? }.cast::<u8>();

        self.chunks.push((chunk, layout));
        self.heap_size += bytes;
        self.set_arena(chunk, bytes);
        if self.config.track_stats {
            self.counters.arena_grows += 1;
        }

        debug!(
            requested = bytes,
            heap_size = self.heap_size,
            size_class,
            "pool arena grown"
        );
        Ok(())
    }

    /// Reuses a free block of class `size` or larger as a temporary arena.
    fn scavenge(&mut self, size: usize) -> bool {
        for index in free_list_index(size)..N_FREE_LISTS {
            if let Some(block) = self.free_lists.pop(index) {
                let bytes = class_size(index);
                self.set_arena(block, bytes);
                if self.config.track_stats {
                    self.counters.scavenges += 1;
                }
                warn!(
                    size_class = size,
                    scavenged = bytes,
                    "backing allocator refused arena growth, reusing a free block"
                );
                return true;
            }
        }
        false
    }

    /// Asks the backing allocator for exactly one `size`-byte block.
    fn last_resort(&mut self, size: usize, requested: usize) -> AllocResult<()> {
        error!(
            size_class = size,
            requested,
            "no free block to scavenge, falling back to a single-object chunk"
        );

        let layout = Layout::from_size_align(size, ALIGN)
            .map_err(|_| AllocError::invalid_layout("size class overflows isize"))?;
        // SAFETY: layout is non-zero; the chunk is recorded and freed on drop.
        let chunk = match unsafe { self.backing.allocate(layout) } {
            Ok(chunk) => chunk.cast::<u8>(),
            Err(_) => return Err(AllocError::out_of_memory(requested, ALIGN)),
        };

        self.chunks.push((chunk, layout));
        self.heap_size += size;
        self.set_arena(chunk, size);
        Ok(())
    }
}

impl<B: Allocator> Drop for PoolState<B> {
    fn drop(&mut self) {
        debug!(
            chunks = self.chunks.len(),
            heap_size = self.heap_size,
            "pool teardown"
        );
        for (chunk, layout) in self.chunks.drain(..) {
            // SAFETY: each chunk was allocated from backing with this layout
            // and is released exactly once.
            unsafe { self.backing.deallocate(chunk, layout) };
        }
    }
}
