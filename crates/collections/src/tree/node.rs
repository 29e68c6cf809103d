//! Tree node layout and raw link accessors.
//!
//! # Safety
//!
//! Every `NodePtr` handed to the accessors below must point to a live
//! `NodeBase`: either the tree's header or the base of a `Node<T>` owned by
//! that tree. Links never own anything; only the tree frees nodes.

use core::ptr::NonNull;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

/// Color and links shared by every node and by the header sentinel.
#[repr(C)]
pub(crate) struct NodeBase {
    pub(crate) color: Color,
    pub(crate) parent: Link,
    pub(crate) left: Link,
    pub(crate) right: Link,
}

/// A value-carrying node; `base` must stay the first field so a
/// `NodePtr` can be cast back to `Node<T>`.
#[repr(C)]
pub(crate) struct Node<T> {
    pub(crate) base: NodeBase,
    pub(crate) value: T,
}

pub(crate) type Link = Option<NodePtr>;

/// Non-owning handle to a [`NodeBase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodePtr(NonNull<NodeBase>);

impl NodeBase {
    pub(crate) const fn detached(color: Color) -> Self {
        Self {
            color,
            parent: None,
            left: None,
            right: None,
        }
    }
}

impl NodePtr {
    #[inline]
    pub(crate) fn from_node<T>(node: NonNull<Node<T>>) -> Self {
        Self(node.cast())
    }

    #[inline]
    pub(crate) fn from_base(base: NonNull<NodeBase>) -> Self {
        Self(base)
    }

    #[inline]
    pub(crate) fn as_node<T>(self) -> NonNull<Node<T>> {
        self.0.cast()
    }

    #[inline]
    pub(crate) fn as_base(self) -> NonNull<NodeBase> {
        self.0
    }

    #[inline]
    pub(crate) unsafe fn color(self) -> Color {
        // SAFETY: caller guarantees self points to a live NodeBase.
        unsafe { (*self.0.as_ptr()).color }
    }

    #[inline]
    pub(crate) unsafe fn set_color(self, color: Color) {
        // SAFETY: as above.
        unsafe { (*self.0.as_ptr()).color = color }
    }

    #[inline]
    pub(crate) unsafe fn parent(self) -> Link {
        // SAFETY: as above.
        unsafe { (*self.0.as_ptr()).parent }
    }

    #[inline]
    pub(crate) unsafe fn set_parent(self, link: Link) {
        // SAFETY: as above.
        unsafe { (*self.0.as_ptr()).parent = link }
    }

    #[inline]
    pub(crate) unsafe fn left(self) -> Link {
        // SAFETY: as above.
        unsafe { (*self.0.as_ptr()).left }
    }

    #[inline]
    pub(crate) unsafe fn set_left(self, link: Link) {
        // SAFETY: as above.
        unsafe { (*self.0.as_ptr()).left = link }
    }

    #[inline]
    pub(crate) unsafe fn right(self) -> Link {
        // SAFETY: as above.
        unsafe { (*self.0.as_ptr()).right }
    }

    #[inline]
    pub(crate) unsafe fn set_right(self, link: Link) {
        // SAFETY: as above.
        unsafe { (*self.0.as_ptr()).right = link }
    }

    /// Shared reference to the value of a real (non-header) node.
    ///
    /// # Safety
    /// `self` must be the base of a live `Node<T>`, and the returned borrow
    /// must not outlive it.
    #[inline]
    pub(crate) unsafe fn value<'a, T>(self) -> &'a T {
        // SAFETY: caller guarantees self is a Node<T>.
        unsafe { &(*self.as_node::<T>().as_ptr()).value }
    }

    /// # Safety
    /// As [`value`](Self::value), plus exclusive access for `'a`.
    #[inline]
    pub(crate) unsafe fn value_mut<'a, T>(self) -> &'a mut T {
        // SAFETY: caller guarantees self is a Node<T> it may mutate.
        unsafe { &mut (*self.as_node::<T>().as_ptr()).value }
    }
}

/// Unwraps a link the tree shape guarantees to be present.
///
/// # Safety
/// `link` must be `Some`.
#[inline]
pub(crate) unsafe fn present(link: Link) -> NodePtr {
    debug_assert!(link.is_some(), "red-black tree link unexpectedly null");
    // SAFETY: caller guarantees the link is present.
    unsafe { link.unwrap_unchecked() }
}

/// Null links count as black.
#[inline]
pub(crate) unsafe fn is_red(link: Link) -> bool {
    // SAFETY: a present link points to a live node.
    link.is_some_and(|node| unsafe { node.color() } == Color::Red)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_base_is_prefix() {
        assert_eq!(core::mem::offset_of!(Node<u64>, base), 0);
        assert_eq!(core::mem::offset_of!(Node<[u8; 3]>, base), 0);
    }

    #[test]
    fn test_link_is_pointer_sized() {
        assert_eq!(core::mem::size_of::<Link>(), core::mem::size_of::<usize>());
    }
}
