//! Pool allocator statistics

use super::size_class::{N_FREE_LISTS, class_size};

/// Snapshot of a pool's arena and counters
///
/// Counters only move while [`PoolConfig::track_stats`](super::PoolConfig) is
/// on; the arena figures are always exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Bytes obtained from the backing allocator for the arena so far
    pub heap_size: usize,
    /// Bytes left in the current arena chunk
    pub arena_remaining: usize,
    /// Length of each size-class free list (index 0 holds 8-byte blocks)
    pub free_blocks: [usize; N_FREE_LISTS],
    /// Requests served from the free lists
    pub pooled_allocs: u64,
    /// Blocks pushed back onto the free lists
    pub pooled_deallocs: u64,
    /// Requests forwarded to the backing allocator
    pub large_allocs: u64,
    /// Large blocks returned to the backing allocator
    pub large_deallocs: u64,
    /// Times a free list ran dry and was refilled from the arena
    pub refills: u64,
    /// Successful arena growths
    pub arena_grows: u64,
    /// Times a larger free block stood in for a failed arena growth
    pub scavenges: u64,
}

impl PoolStats {
    /// Bytes held on the free lists
    pub fn free_bytes(&self) -> usize {
        self.free_blocks
            .iter()
            .enumerate()
            .map(|(index, &len)| len * class_size(index))
            .sum()
    }

    /// Pooled blocks currently owned by callers
    pub fn outstanding_pooled(&self) -> u64 {
        self.pooled_allocs.saturating_sub(self.pooled_deallocs)
    }
}

/// Live counters kept inside the pool state.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct PoolCounters {
    pub(super) pooled_allocs: u64,
    pub(super) pooled_deallocs: u64,
    pub(super) large_allocs: u64,
    pub(super) large_deallocs: u64,
    pub(super) refills: u64,
    pub(super) arena_grows: u64,
    pub(super) scavenges: u64,
}
