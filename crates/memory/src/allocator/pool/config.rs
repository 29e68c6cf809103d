//! Pool allocator configuration

use crate::error::{MemoryError, MemoryResult};

/// Default number of blocks requested per refill.
pub const DEFAULT_REFILL_BATCH: usize = 20;

/// Upper bound accepted by [`PoolConfig::validate`].
pub const MAX_REFILL_BATCH: usize = 4096;

/// Configuration for pool allocator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Target number of blocks carved from the arena when a free list runs dry
    pub refill_batch: usize,

    /// Enable statistics tracking
    pub track_stats: bool,

    /// Fill pattern byte for newly allocated memory (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for deallocated memory (for debugging)
    pub dealloc_pattern: Option<u8>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            refill_batch: DEFAULT_REFILL_BATCH,
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xBB)
            } else {
                None
            },
            dealloc_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
        }
    }
}

impl PoolConfig {
    /// Production configuration - counters off, no fill patterns
    #[must_use]
    pub fn production() -> Self {
        Self {
            refill_batch: DEFAULT_REFILL_BATCH,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - counters on, blocks poisoned on both edges
    #[must_use]
    pub fn debug() -> Self {
        Self {
            refill_batch: DEFAULT_REFILL_BATCH,
            track_stats: true,
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
        }
    }

    /// Performance configuration - larger batches, fewer trips to the arena
    #[must_use]
    pub fn performance() -> Self {
        Self {
            refill_batch: 64,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Overrides the refill batch size
    #[must_use]
    pub fn with_refill_batch(mut self, refill_batch: usize) -> Self {
        self.refill_batch = refill_batch;
        self
    }

    /// Checks that the configuration can drive the pool.
    pub fn validate(&self) -> MemoryResult<()> {
        if self.refill_batch == 0 {
            return Err(MemoryError::invalid_config("refill_batch must be at least 1"));
        }
        if self.refill_batch > MAX_REFILL_BATCH {
            return Err(MemoryError::invalid_config(
                "refill_batch exceeds MAX_REFILL_BATCH",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for config in [
            PoolConfig::default(),
            PoolConfig::production(),
            PoolConfig::debug(),
            PoolConfig::performance(),
        ] {
            assert!(config.validate().is_ok(), "{config:?}");
        }
    }

    #[test]
    fn test_debug_preset_poisons() {
        let config = PoolConfig::debug();
        assert!(config.track_stats);
        assert_eq!(config.alloc_pattern, Some(0xBB));
        assert_eq!(config.dealloc_pattern, Some(0xDD));
    }

    #[test]
    fn test_rejects_bad_batch() {
        let zero = PoolConfig::production().with_refill_batch(0);
        assert_eq!(zero.validate().unwrap_err().code(), "MEM:CONFIG:INVALID");

        let huge = PoolConfig::production().with_refill_batch(MAX_REFILL_BATCH + 1);
        assert!(huge.validate().is_err());
    }
}
