//! # cairn-collections
//!
//! Generic containers whose nodes come from a [`cairn_memory`] pool.
//!
//! - [`tree::RbTree`]: red-black tree with cached leftmost/rightmost nodes
//! - [`hashtable::HashTable`]: separate-chaining table over a prime bucket
//!   sequence
//! - Ordered wrappers: [`Map`], [`Set`], [`MultiMap`], [`MultiSet`]
//! - Unordered wrappers: [`HashMap`], [`HashSet`], [`HashMultiMap`],
//!   [`HashMultiSet`]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use cairn_collections::prelude::*;
//!
//! // One pool shared by several containers.
//! let pool = Rc::new(PoolAllocator::new());
//! let mut ages = Map::new_in(Rc::clone(&pool));
//! let mut tags = HashSet::new_in(Rc::clone(&pool));
//!
//! ages.insert("ada", 36)?;
//! ages.insert("alan", 41)?;
//! tags.insert("pioneer")?;
//!
//! assert_eq!(ages.get(&"ada"), Some(&36));
//! assert!(tags.contains(&"pioneer"));
//! assert!(pool.heap_size() > 0);
//! # Ok::<(), cairn_memory::MemoryError>(())
//! ```
//!
//! Every insertion returns [`MemoryResult`](cairn_memory::MemoryResult): out
//! of memory is the only runtime failure, and a failed insertion leaves the
//! container unchanged. `Clone`, `Extend` and `FromIterator` cannot return
//! errors and abort through [`handle_alloc_failure`](cairn_memory::handle_alloc_failure)
//! instead.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(unsafe_code)]

use std::rc::Rc;

use cairn_memory::allocator::PoolAllocator;

pub mod error;
pub mod function;
pub mod hashtable;
pub mod ordered;
pub mod tree;
pub mod unordered;

pub use error::InvariantViolation;
pub use ordered::{Map, MultiMap, MultiSet, Set};
pub use unordered::{HashMap, HashMultiMap, HashMultiSet, HashSet};

/// Allocator handle the wrappers use when none is given: a pool shared by
/// reference counting, so several containers can draw from it.
pub type SharedPool = Rc<PoolAllocator>;

pub(crate) fn fresh_pool() -> SharedPool {
    Rc::new(PoolAllocator::new())
}

pub mod prelude {
    //! Containers, strategy objects and the pool types they are built on.

    pub use crate::function::{
        CompareFn, EqualTo, Greater, Identity, KeyCompare, KeyEqual, KeyHash, KeyOfValue, Less,
        SelectFirst, SimpleHash, StdHash,
    };
    pub use crate::{
        HashMap, HashMultiMap, HashMultiSet, HashSet, InvariantViolation, Map, MultiMap,
        MultiSet, Set, SharedPool,
    };
    pub use cairn_memory::allocator::{Allocator, PoolAllocator, SystemAllocator};
    pub use cairn_memory::{MemoryError, MemoryResult};
}
