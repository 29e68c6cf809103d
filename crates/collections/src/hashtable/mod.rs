//! Chained hash table engine
//!
//! [`HashTable`] backs [`HashMap`](crate::HashMap), [`HashSet`](crate::HashSet),
//! [`HashMultiMap`](crate::HashMultiMap) and
//! [`HashMultiSet`](crate::HashMultiSet). Buckets are singly linked chains;
//! the bucket array and every chain node come from the table's allocator.
//!
//! ```
//! use cairn_collections::function::{EqualTo, Identity, SimpleHash};
//! use cairn_collections::hashtable::HashTable;
//! use cairn_memory::allocator::SystemAllocator;
//!
//! let mut table =
//!     HashTable::with_buckets_in(53, Identity, SimpleHash, EqualTo, SystemAllocator)?;
//! for key in 0..54u32 {
//!     table.insert_unique(key)?;
//! }
//! assert_eq!(table.bucket_count(), 97);
//! # Ok::<(), cairn_memory::MemoryError>(())
//! ```

mod iter;
pub mod primes;
mod table;

pub use iter::{IntoIter, Iter};
pub use primes::{MAX_BUCKET_COUNT, next_prime};
pub use table::HashTable;
