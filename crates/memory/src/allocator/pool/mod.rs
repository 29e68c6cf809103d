//! Segmented free-list pool allocator
//!
//! Sixteen size classes (8..=128 bytes, step 8), each with an intrusive free
//! list, refilled in batches from a growing arena. Larger or over-aligned
//! requests pass straight through to the backing allocator.
//!
//! ## Modules
//! - `allocator` - Single-threaded `PoolAllocator` (RefCell state)
//! - `sync` - `SyncPoolAllocator` behind a `parking_lot` mutex
//! - `config` - Configuration variants (production, debug, performance)
//! - `size_class` - Size-class arithmetic
//! - `stats` - Statistics snapshot types

pub mod allocator;
pub mod config;
mod free_list;
pub mod size_class;
mod state;
pub mod stats;
#[cfg(feature = "sync")]
pub mod sync;

pub use allocator::PoolAllocator;
pub use config::{DEFAULT_REFILL_BATCH, MAX_REFILL_BATCH, PoolConfig};
pub use size_class::{ALIGN, MAX_BYTES, N_FREE_LISTS};
pub use stats::PoolStats;
#[cfg(feature = "sync")]
pub use sync::SyncPoolAllocator;
