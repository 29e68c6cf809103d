//! Red-black tree engine
//!
//! [`RbTree`] is the ordered engine behind [`Map`](crate::Map),
//! [`Set`](crate::Set), [`MultiMap`](crate::MultiMap) and
//! [`MultiSet`](crate::MultiSet). It stores values, projects keys out of them
//! with a [`KeyOfValue`](crate::function::KeyOfValue) strategy and orders them
//! with a [`KeyCompare`](crate::function::KeyCompare) strategy. It never
//! compares whole values.
//!
//! Nodes are linked through non-owning raw links (`parent`, `left`, `right`)
//! and allocated individually from an [`Allocator`](cairn_memory::allocator::Allocator),
//! normally a shared pool.

mod cursor;
mod iter;
mod node;
mod rb_tree;
mod rebalance;

pub use cursor::{Cursor, CursorMut};
pub use iter::{IntoIter, Iter, Range};
pub use rb_tree::RbTree;
