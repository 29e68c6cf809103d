//! # cairn-memory
//!
//! Small-block memory management for the cairn containers.
//!
//! This crate provides:
//! - A segmented free-list pool allocator with sixteen 8-byte-step size classes
//! - A passthrough system allocator used as the pool's backing store
//! - Typed node and array helpers the containers allocate through
//!
//! ## Quick Start
//!
//! ```rust
//! use cairn_memory::prelude::*;
//!
//! let pool = PoolAllocator::new();
//! let block = pool.allocate_bytes(24)?;
//! assert_eq!(block.as_ptr() as usize % 8, 0);
//! // SAFETY: the block came from this pool with the same size.
//! unsafe { pool.deallocate_bytes(block, 24) };
//! # Ok::<(), cairn_memory::MemoryError>(())
//! ```
//!
//! ## Features
//!
//! - `sync` (default): `SyncPoolAllocator`, the pool behind a `parking_lot` mutex
//!
//! ## Logging
//!
//! Allocator slow paths (arena growth, leftover recycling, scavenging, the
//! last-resort path and teardown) emit `tracing` events. No subscriber is
//! installed here.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(unsafe_code)]

// Error types
pub mod error;

// Allocators
pub mod allocator;

pub use crate::error::{
    AllocError, AllocResult, MemoryError, MemoryResult, Result, handle_alloc_failure,
};

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    #[cfg(feature = "sync")]
    pub use crate::allocator::SyncPoolAllocator;
    pub use crate::allocator::{
        Allocator, MemoryUsage, PoolAllocator, PoolConfig, PoolStats, SystemAllocator,
        TypedAllocator,
    };
    pub use crate::error::{MemoryError, MemoryResult};
}
