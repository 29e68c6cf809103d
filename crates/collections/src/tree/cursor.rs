//! Position handles into an [`RbTree`].
//!
//! A cursor sits either on an element or on the end position (one past the
//! last element). Moving forward from the end wraps to the first element and
//! moving backward from the first element lands on the end, so a cursor can
//! walk the tree in either direction indefinitely.

use core::fmt;

use cairn_memory::MemoryResult;
use cairn_memory::allocator::Allocator;

use super::RbTree;
use super::node::NodePtr;
use super::rebalance::{decrement, increment};
use crate::function::{KeyCompare, KeyOfValue};

/// Read-only cursor.
pub struct Cursor<'a, T, KoV, C, A: Allocator> {
    tree: &'a RbTree<T, KoV, C, A>,
    node: NodePtr,
}

impl<'a, T, KoV, C, A: Allocator> Cursor<'a, T, KoV, C, A> {
    pub(crate) fn new(tree: &'a RbTree<T, KoV, C, A>, node: NodePtr) -> Self {
        Self { tree, node }
    }

    /// The element under the cursor, `None` at the end position.
    pub fn get(&self) -> Option<&'a T> {
        // SAFETY: any position other than the header is a real node that the
        // shared borrow keeps alive for 'a.
        (!self.is_end()).then(|| unsafe { self.node.value::<T>() })
    }

    pub fn is_end(&self) -> bool {
        self.node == self.tree.header()
    }

    pub fn move_next(&mut self) {
        self.node = step_next(self.tree, self.node);
    }

    pub fn move_prev(&mut self) {
        self.node = step_prev(self.tree, self.node);
    }
}

impl<T, KoV, C, A: Allocator> Clone for Cursor<'_, T, KoV, C, A> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            node: self.node,
        }
    }
}

impl<T: fmt::Debug, KoV, C, A: Allocator> fmt::Debug for Cursor<'_, T, KoV, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.get()).finish()
    }
}

/// Cursor that can remove the element under it and insert around it.
pub struct CursorMut<'a, T, KoV, C, A: Allocator> {
    tree: &'a mut RbTree<T, KoV, C, A>,
    node: NodePtr,
}

impl<'a, T, KoV, C, A: Allocator> CursorMut<'a, T, KoV, C, A> {
    pub(crate) fn new(tree: &'a mut RbTree<T, KoV, C, A>, node: NodePtr) -> Self {
        Self { tree, node }
    }

    pub fn get(&self) -> Option<&T> {
        // SAFETY: a non-end position is a real node borrowed through self.
        (!self.is_end()).then(|| unsafe { self.node.value::<T>() })
    }

    pub fn is_end(&self) -> bool {
        self.node == self.tree.header()
    }

    pub fn move_next(&mut self) {
        self.node = step_next(self.tree, self.node);
    }

    pub fn move_prev(&mut self) {
        self.node = step_prev(self.tree, self.node);
    }

    /// Read-only view at the same position.
    pub fn as_cursor(&self) -> Cursor<'_, T, KoV, C, A> {
        Cursor::new(self.tree, self.node)
    }

    /// Removes the element under the cursor and moves to its successor.
    /// Returns `None` at the end position.
    pub fn remove_current(&mut self) -> Option<T> {
        if self.is_end() {
            return None;
        }
        let node = self.node;
        // SAFETY: node is real; its successor survives the erase because
        // rebalancing relinks nodes without moving them.
        unsafe {
            self.node = increment(node);
            Some(self.tree.erase_node(node))
        }
    }
}

impl<T, KoV, C, A> CursorMut<'_, T, KoV, C, A>
where
    KoV: KeyOfValue<T>,
    C: KeyCompare<KoV::Key>,
    A: Allocator,
{
    /// Inserts `value` using the cursor position as a hint, unless an
    /// equivalent key exists. The cursor moves to the new or existing
    /// element. A hint that does not bracket the key only costs a full
    /// descent.
    pub fn insert_unique_hint(&mut self, value: T) -> MemoryResult<bool> {
        let (node, inserted) = self.tree.insert_unique_at(self.node, value)?;
        self.node = node;
        Ok(inserted)
    }

    /// Inserts `value` using the cursor position as a hint and moves to it.
    pub fn insert_equal_hint(&mut self, value: T) -> MemoryResult<()> {
        self.node = self.tree.insert_equal_at(self.node, value)?;
        Ok(())
    }
}

impl<T: fmt::Debug, KoV, C, A: Allocator> fmt::Debug for CursorMut<'_, T, KoV, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CursorMut").field(&self.get()).finish()
    }
}

fn step_next<T, KoV, C, A: Allocator>(tree: &RbTree<T, KoV, C, A>, node: NodePtr) -> NodePtr {
    if node == tree.header() {
        tree.leftmost()
    } else {
        // SAFETY: node is a real node of tree.
        unsafe { increment(node) }
    }
}

fn step_prev<T, KoV, C, A: Allocator>(tree: &RbTree<T, KoV, C, A>, node: NodePtr) -> NodePtr {
    if node == tree.leftmost() {
        tree.header()
    } else {
        // SAFETY: node is the header of a non-empty tree or a real node that
        // has a predecessor.
        unsafe { decrement(node, tree.header()) }
    }
}
