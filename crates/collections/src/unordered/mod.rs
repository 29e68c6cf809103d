//! Unordered containers over [`HashTable`](crate::hashtable::HashTable).
//!
//! Hashing defaults to [`SimpleHash`](crate::function::SimpleHash) and
//! equality to [`EqualTo`](crate::function::EqualTo); `with_hasher_in`
//! accepts any other strategy pair, e.g. [`StdHash`](crate::function::StdHash).

mod hash_map;
mod hash_multimap;
mod hash_multiset;
mod hash_set;

pub use hash_map::HashMap;
pub use hash_multimap::HashMultiMap;
pub use hash_multiset::HashMultiSet;
pub use hash_set::HashSet;

/// Bucket hint used by `new()`; rounded up to 193 buckets.
pub const DEFAULT_BUCKET_HINT: usize = 100;
