//! Allocators for container nodes and bucket arrays
//!
//! - [`SystemAllocator`]: passthrough to the platform allocator
//! - [`PoolAllocator`]: segmented free-list pool for small blocks
//! - [`SyncPoolAllocator`]: the same pool behind a mutex (feature `sync`)

mod system;
mod traits;

pub mod pool;

pub use crate::error::{AllocError, AllocResult};
#[cfg(feature = "sync")]
pub use pool::SyncPoolAllocator;
pub use pool::{PoolAllocator, PoolConfig, PoolStats};
pub use system::SystemAllocator;
pub use traits::{Allocator, MemoryUsage, TypedAllocator};
