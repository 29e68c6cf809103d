//! Ordered containers over [`RbTree`](crate::tree::RbTree).
//!
//! All four take an optional comparator (`C`, default [`Less`](crate::function::Less))
//! and allocator (`A`, default [`SharedPool`](crate::SharedPool)).

mod map;
mod multimap;
mod multiset;
mod set;

pub use map::{Iter as MapIter, Map};
pub use multimap::MultiMap;
pub use multiset::MultiSet;
pub use set::Set;
