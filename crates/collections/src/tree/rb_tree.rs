use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop};
use core::ops::{Bound, RangeBounds};
use core::ptr::{self, NonNull};

use cairn_memory::allocator::{Allocator, TypedAllocator};
use cairn_memory::{MemoryResult, handle_alloc_failure};

use super::cursor::{Cursor, CursorMut};
use super::iter::{IntoIter, Iter, Range, free_subtree};
use super::node::{Color, Node, NodeBase, NodePtr, is_red, present};
use super::rebalance::{
    black_count, decrement, increment, maximum, minimum, rebalance_for_erase, rebalance_insert,
    root,
};
use crate::error::InvariantViolation;
use crate::function::{KeyCompare, KeyOfValue};

/// Where a unique insertion would land.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Slot {
    /// An element with an equivalent key already exists.
    Occupied(NodePtr),
    /// A new node would become the `left` or right child of `parent`.
    Vacant { parent: NodePtr, left: bool },
}

/// Red-black tree storing `T`, ordered by the key `KoV` projects out of each
/// value under the strict weak ordering `C`.
///
/// Nodes are allocated one at a time through `A`; the tree owns them and
/// frees them on drop. The header sentinel is red and holds the root in
/// `parent`, the leftmost node in `left` and the rightmost node in `right`.
/// In an empty tree `left` and `right` point back at the header, which doubles
/// as the end position.
///
/// Insertions are failure-atomic: a node is allocated only after the
/// insertion point is known, and nothing is relinked until it exists.
pub struct RbTree<T, KoV, C, A: Allocator> {
    header: NodePtr,
    len: usize,
    key_of: KoV,
    compare: C,
    alloc: A,
    marker: PhantomData<Box<Node<T>>>,
}

// SAFETY: the tree owns its nodes exclusively; moving it moves that ownership.
unsafe impl<T: Send, KoV: Send, C: Send, A: Allocator + Send> Send for RbTree<T, KoV, C, A> {}
// SAFETY: `&self` methods only read nodes.
unsafe impl<T: Sync, KoV: Sync, C: Sync, A: Allocator + Sync> Sync for RbTree<T, KoV, C, A> {}

// ============================================================================
// Structure-only operations
// ============================================================================

impl<T, KoV, C, A: Allocator> RbTree<T, KoV, C, A> {
    /// Creates an empty tree drawing nodes from `alloc`.
    pub fn new_in(key_of: KoV, compare: C, alloc: A) -> Self {
        let header = NodePtr::from_base(NonNull::from(Box::leak(Box::new(NodeBase::detached(
            Color::Red,
        )))));
        // SAFETY: header was just allocated and is exclusively ours.
        unsafe {
            header.set_left(Some(header));
            header.set_right(Some(header));
        }
        Self {
            header,
            len: 0,
            key_of,
            compare,
            alloc,
            marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    pub fn key_of(&self) -> &KoV {
        &self.key_of
    }

    pub fn compare(&self) -> &C {
        &self.compare
    }

    /// Elements in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.leftmost(), self.header, self.len)
    }

    pub fn first(&self) -> Option<&T> {
        // SAFETY: a non-empty tree's leftmost is a real node.
        (!self.is_empty()).then(|| unsafe { self.leftmost().value::<T>() })
    }

    pub fn last(&self) -> Option<&T> {
        // SAFETY: a non-empty tree's rightmost is a real node.
        (!self.is_empty()).then(|| unsafe { self.rightmost().value::<T>() })
    }

    pub fn pop_first(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: leftmost is a real node of this tree.
        Some(unsafe { self.erase_node(self.leftmost()) })
    }

    pub fn pop_last(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: rightmost is a real node of this tree.
        Some(unsafe { self.erase_node(self.rightmost()) })
    }

    /// Drops every element; the tree stays usable.
    pub fn clear(&mut self) {
        // SAFETY: all nodes below the root are owned by this tree and are
        // detached from the header right after.
        unsafe {
            free_subtree::<T, A>(&self.alloc, root(self.header), true);
            self.reset_header();
        }
        self.len = 0;
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    pub fn cursor_front(&self) -> Cursor<'_, T, KoV, C, A> {
        Cursor::new(self, self.leftmost())
    }

    pub fn cursor_back(&self) -> Cursor<'_, T, KoV, C, A> {
        let node = if self.is_empty() {
            self.header
        } else {
            self.rightmost()
        };
        Cursor::new(self, node)
    }

    /// Cursor at the end position, one past the last element.
    pub fn cursor_end(&self) -> Cursor<'_, T, KoV, C, A> {
        Cursor::new(self, self.header)
    }

    pub fn cursor_front_mut(&mut self) -> CursorMut<'_, T, KoV, C, A> {
        let node = self.leftmost();
        CursorMut::new(self, node)
    }

    pub fn cursor_end_mut(&mut self) -> CursorMut<'_, T, KoV, C, A> {
        let node = self.header;
        CursorMut::new(self, node)
    }

    #[inline]
    pub(crate) fn header(&self) -> NodePtr {
        self.header
    }

    #[inline]
    pub(crate) fn leftmost(&self) -> NodePtr {
        // SAFETY: header.left is always set (to the header when empty).
        unsafe { present(self.header.left()) }
    }

    #[inline]
    pub(crate) fn rightmost(&self) -> NodePtr {
        // SAFETY: header.right is always set (to the header when empty).
        unsafe { present(self.header.right()) }
    }

    unsafe fn reset_header(&self) {
        // SAFETY: header is live.
        unsafe {
            self.header.set_parent(None);
            self.header.set_left(Some(self.header));
            self.header.set_right(Some(self.header));
        }
    }

    fn create_node(&self, value: T) -> MemoryResult<NodePtr> {
        let node = Node {
            base: NodeBase::detached(Color::Red),
            value,
        };
        // SAFETY: released through destroy_node or free_subtree.
        let raw = unsafe { self.alloc.alloc_init(node)? };
        Ok(NodePtr::from_node(raw))
    }

    /// Moves the value out and frees the node memory.
    ///
    /// # Safety
    /// `node` must be an unlinked node allocated by `create_node`.
    unsafe fn destroy_node(&self, node: NodePtr) -> T {
        let raw = node.as_node::<T>();
        // SAFETY: the value is initialized and read exactly once.
        unsafe {
            let value = ptr::read(&raw const (*raw.as_ptr()).value);
            self.alloc.dealloc_typed(raw);
            value
        }
    }

    /// Links a fresh node `z` as the `left` or right child of `parent`, then
    /// rebalances.
    ///
    /// # Safety
    /// The chosen child slot of `parent` must be empty and keep the tree
    /// ordered; `parent` is the header only when the tree is empty.
    pub(crate) unsafe fn link_node(&mut self, parent: NodePtr, left: bool, z: NodePtr) {
        let header = self.header;
        // SAFETY: caller guarantees the slot; header fields are kept in sync.
        unsafe {
            if parent == header {
                header.set_parent(Some(z));
                header.set_left(Some(z));
                header.set_right(Some(z));
            } else if left {
                parent.set_left(Some(z));
                if parent == self.leftmost() {
                    header.set_left(Some(z));
                }
            } else {
                parent.set_right(Some(z));
                if parent == self.rightmost() {
                    header.set_right(Some(z));
                }
            }
            z.set_parent(Some(parent));
            z.set_left(None);
            z.set_right(None);
            rebalance_insert(z, header);
        }
        self.len += 1;
    }

    /// Unlinks `node`, rebalances and returns its value.
    ///
    /// # Safety
    /// `node` must be a real node of this tree.
    pub(crate) unsafe fn erase_node(&mut self, node: NodePtr) -> T {
        // SAFETY: forwarded.
        unsafe {
            rebalance_for_erase(node, self.header);
            self.len -= 1;
            self.destroy_node(node)
        }
    }

    /// Deep-copies `src` (and its subtree) under `parent`, keeping colors.
    /// On failure everything copied so far is freed.
    unsafe fn copy_subtree(&self, src: NodePtr, parent: NodePtr) -> MemoryResult<NodePtr>
    where
        T: Clone,
    {
        // SAFETY: src is a real node of another tree; clones are linked as
        // soon as they exist so free_subtree(top) reaches all of them.
        unsafe {
            let top = self.clone_node(src)?;
            top.set_parent(Some(parent));
            if let Err(err) = self.copy_spine(src, top) {
                free_subtree::<T, A>(&self.alloc, Some(top), true);
                return Err(err);
            }
            Ok(top)
        }
    }

    // Recurse right, loop left: depth is bounded by the tree height.
    unsafe fn copy_spine(&self, src: NodePtr, top: NodePtr) -> MemoryResult<()>
    where
        T: Clone,
    {
        // SAFETY: see copy_subtree.
        unsafe {
            if let Some(right) = src.right() {
                top.set_right(Some(self.copy_subtree(right, top)?));
            }
            let mut p = top;
            let mut x = src.left();
            while let Some(s) = x {
                let y = self.clone_node(s)?;
                p.set_left(Some(y));
                y.set_parent(Some(p));
                if let Some(right) = s.right() {
                    y.set_right(Some(self.copy_subtree(right, y)?));
                }
                p = y;
                x = s.left();
            }
            Ok(())
        }
    }

    unsafe fn clone_node(&self, src: NodePtr) -> MemoryResult<NodePtr>
    where
        T: Clone,
    {
        // SAFETY: src is a real node.
        unsafe {
            let node = self.create_node(src.value::<T>().clone())?;
            node.set_color(src.color());
            Ok(node)
        }
    }

    /// Copies `source`'s structure into this empty tree.
    fn copy_structure(&mut self, source: &Self) -> MemoryResult<()>
    where
        T: Clone,
    {
        debug_assert!(self.is_empty());
        // SAFETY: self is empty, so the new root becomes its only subtree.
        unsafe {
            if let Some(src_root) = root(source.header) {
                let new_root = self.copy_subtree(src_root, self.header)?;
                self.header.set_parent(Some(new_root));
                self.header.set_left(Some(minimum(new_root)));
                self.header.set_right(Some(maximum(new_root)));
                self.len = source.len;
            }
        }
        Ok(())
    }

    /// Fallible deep copy sharing this tree's allocator handle.
    pub fn try_clone(&self) -> MemoryResult<Self>
    where
        T: Clone,
        KoV: Clone,
        C: Clone,
        A: Clone,
    {
        let mut tree = Self::new_in(
            self.key_of.clone(),
            self.compare.clone(),
            self.alloc.clone(),
        );
        tree.copy_structure(self)?;
        Ok(tree)
    }

    /// Replaces the contents with a copy of `source`, keeping this tree's
    /// allocator. On failure the tree is left empty.
    pub fn try_clone_from(&mut self, source: &Self) -> MemoryResult<()>
    where
        T: Clone,
        KoV: Clone,
        C: Clone,
    {
        if ptr::eq(self, source) {
            return Ok(());
        }
        self.clear();
        self.key_of = source.key_of.clone();
        self.compare = source.compare.clone();
        self.copy_structure(source)
    }
}

// ============================================================================
// Keyed operations
// ============================================================================

impl<T, KoV, C, A> RbTree<T, KoV, C, A>
where
    KoV: KeyOfValue<T>,
    C: KeyCompare<KoV::Key>,
    A: Allocator,
{
    /// # Safety
    /// `node` must be a real node of this tree.
    #[inline]
    unsafe fn key_at(&self, node: NodePtr) -> &KoV::Key {
        // SAFETY: forwarded.
        self.key_of.key(unsafe { node.value::<T>() })
    }

    #[inline]
    fn less(&self, a: &KoV::Key, b: &KoV::Key) -> bool {
        self.compare.less(a, b)
    }

    /// Descends to where `key` would be inserted uniquely.
    pub(crate) fn unique_slot(&self, key: &KoV::Key) -> Slot {
        // SAFETY: the descent only visits real nodes; decrement is applied to
        // a real node that is not the leftmost.
        unsafe {
            let mut parent = self.header;
            let mut x = root(self.header);
            let mut left = true;
            while let Some(node) = x {
                parent = node;
                left = self.less(key, self.key_at(node));
                x = if left { node.left() } else { node.right() };
            }
            let mut candidate = parent;
            if left {
                if candidate == self.leftmost() {
                    return Slot::Vacant { parent, left };
                }
                candidate = decrement(candidate, self.header);
            }
            if self.less(self.key_at(candidate), key) {
                Slot::Vacant { parent, left }
            } else {
                Slot::Occupied(candidate)
            }
        }
    }

    /// Descends to where `key` goes after every equivalent key.
    fn equal_slot(&self, key: &KoV::Key) -> (NodePtr, bool) {
        // SAFETY: the descent only visits real nodes.
        unsafe {
            let mut parent = self.header;
            let mut x = root(self.header);
            let mut left = true;
            while let Some(node) = x {
                parent = node;
                left = self.less(key, self.key_at(node));
                x = if left { node.left() } else { node.right() };
            }
            (parent, left)
        }
    }

    /// Returns the node at an occupied slot, or links `make()` into a vacant
    /// one.
    pub(crate) fn fill_slot(
        &mut self,
        slot: Slot,
        make: impl FnOnce() -> T,
    ) -> MemoryResult<(NodePtr, bool)> {
        match slot {
            Slot::Occupied(node) => Ok((node, false)),
            Slot::Vacant { parent, left } => {
                let z = self.create_node(make())?;
                // SAFETY: the slot was computed on the current shape.
                unsafe { self.link_node(parent, left, z) };
                Ok((z, true))
            }
        }
    }

    /// Element at `slot`, inserting `make()` there first when it is vacant.
    pub(crate) fn slot_value_mut(
        &mut self,
        slot: Slot,
        make: impl FnOnce() -> T,
    ) -> MemoryResult<&mut T> {
        let (node, _) = self.fill_slot(slot, make)?;
        // SAFETY: node is a real node; the borrow is tied to &mut self.
        Ok(unsafe { node.value_mut::<T>() })
    }

    /// Inserts `value` unless an equivalent key is present. Returns a cursor
    /// at the new or existing element and whether an insertion happened.
    pub fn insert_unique(
        &mut self,
        value: T,
    ) -> MemoryResult<(CursorMut<'_, T, KoV, C, A>, bool)> {
        let slot = self.unique_slot(self.key_of.key(&value));
        let (node, inserted) = self.fill_slot(slot, || value)?;
        Ok((CursorMut::new(self, node), inserted))
    }

    /// Inserts `value` after every element with an equivalent key.
    pub fn insert_equal(&mut self, value: T) -> MemoryResult<CursorMut<'_, T, KoV, C, A>> {
        let (parent, left) = self.equal_slot(self.key_of.key(&value));
        let z = self.create_node(value)?;
        // SAFETY: the slot was computed on the current shape.
        unsafe { self.link_node(parent, left, z) };
        Ok(CursorMut::new(self, z))
    }

    /// Unique insertion near `hint` (a real node or the header). Falls back
    /// to a full descent when the hint does not bracket the key.
    pub(crate) fn insert_unique_at(
        &mut self,
        hint: NodePtr,
        value: T,
    ) -> MemoryResult<(NodePtr, bool)> {
        let header = self.header;
        // SAFETY: hint belongs to this tree; key_at is applied only to real
        // nodes (hint is real unless it is the header).
        let slot = unsafe {
            let key = self.key_of.key(&value);
            if hint == self.leftmost() {
                if !self.is_empty() && self.less(key, self.key_at(hint)) {
                    Slot::Vacant {
                        parent: hint,
                        left: true,
                    }
                } else {
                    self.unique_slot(key)
                }
            } else if hint == header {
                let last = self.rightmost();
                if self.less(self.key_at(last), key) {
                    Slot::Vacant {
                        parent: last,
                        left: false,
                    }
                } else {
                    self.unique_slot(key)
                }
            } else {
                let before = decrement(hint, header);
                if self.less(self.key_at(before), key) && self.less(key, self.key_at(hint)) {
                    if before.right().is_none() {
                        Slot::Vacant {
                            parent: before,
                            left: false,
                        }
                    } else {
                        Slot::Vacant {
                            parent: hint,
                            left: true,
                        }
                    }
                } else {
                    self.unique_slot(key)
                }
            }
        };
        self.fill_slot(slot, || value)
    }

    /// Equal insertion near `hint`; see [`insert_unique_at`](Self::insert_unique_at).
    pub(crate) fn insert_equal_at(&mut self, hint: NodePtr, value: T) -> MemoryResult<NodePtr> {
        let header = self.header;
        // SAFETY: as in insert_unique_at.
        let (parent, left) = unsafe {
            let key = self.key_of.key(&value);
            if hint == self.leftmost() {
                if !self.is_empty() && !self.less(self.key_at(hint), key) {
                    (hint, true)
                } else {
                    self.equal_slot(key)
                }
            } else if hint == header {
                let last = self.rightmost();
                if !self.less(key, self.key_at(last)) {
                    (last, false)
                } else {
                    self.equal_slot(key)
                }
            } else {
                let before = decrement(hint, header);
                if !self.less(key, self.key_at(before)) && !self.less(self.key_at(hint), key) {
                    if before.right().is_none() {
                        (before, false)
                    } else {
                        (hint, true)
                    }
                } else {
                    self.equal_slot(key)
                }
            }
        };
        let z = self.create_node(value)?;
        // SAFETY: the slot keeps the order and is empty.
        unsafe { self.link_node(parent, left, z) };
        Ok(z)
    }

    /// Inserts each value unless its key is present. Already-sorted input
    /// takes the end-hint fast path.
    pub fn insert_unique_iter<I: IntoIterator<Item = T>>(&mut self, iter: I) -> MemoryResult<()> {
        for value in iter {
            self.insert_unique_at(self.header, value)?;
        }
        Ok(())
    }

    pub fn insert_equal_iter<I: IntoIterator<Item = T>>(&mut self, iter: I) -> MemoryResult<()> {
        for value in iter {
            self.insert_equal_at(self.header, value)?;
        }
        Ok(())
    }

    /// First node whose key is not less than `key`, or the header.
    pub(crate) fn lower_bound_node(&self, key: &KoV::Key) -> NodePtr {
        let mut bound = self.header;
        // SAFETY: the descent only visits real nodes.
        unsafe {
            let mut x = root(self.header);
            while let Some(node) = x {
                if self.less(self.key_at(node), key) {
                    x = node.right();
                } else {
                    bound = node;
                    x = node.left();
                }
            }
        }
        bound
    }

    /// First node whose key is greater than `key`, or the header.
    pub(crate) fn upper_bound_node(&self, key: &KoV::Key) -> NodePtr {
        let mut bound = self.header;
        // SAFETY: the descent only visits real nodes.
        unsafe {
            let mut x = root(self.header);
            while let Some(node) = x {
                if self.less(key, self.key_at(node)) {
                    bound = node;
                    x = node.left();
                } else {
                    x = node.right();
                }
            }
        }
        bound
    }

    pub(crate) fn find_node(&self, key: &KoV::Key) -> Option<NodePtr> {
        let node = self.lower_bound_node(key);
        // SAFETY: node is real unless it is the header.
        (node != self.header && !self.less(key, unsafe { self.key_at(node) })).then_some(node)
    }

    pub fn find(&self, key: &KoV::Key) -> Option<&T> {
        // SAFETY: find_node returns real nodes only.
        self.find_node(key).map(|node| unsafe { node.value::<T>() })
    }

    /// Mutable access for wrappers that never touch the key part.
    pub(crate) fn find_mut(&mut self, key: &KoV::Key) -> Option<&mut T> {
        // SAFETY: find_node returns real nodes only.
        self.find_node(key)
            .map(|node| unsafe { node.value_mut::<T>() })
    }

    pub fn contains(&self, key: &KoV::Key) -> bool {
        self.find_node(key).is_some()
    }

    /// Cursor at the element with `key`, or at the end.
    pub fn find_cursor(&self, key: &KoV::Key) -> Cursor<'_, T, KoV, C, A> {
        let node = self.find_node(key).unwrap_or(self.header);
        Cursor::new(self, node)
    }

    pub fn find_cursor_mut(&mut self, key: &KoV::Key) -> CursorMut<'_, T, KoV, C, A> {
        let node = self.find_node(key).unwrap_or(self.header);
        CursorMut::new(self, node)
    }

    pub fn lower_bound(&self, key: &KoV::Key) -> Cursor<'_, T, KoV, C, A> {
        Cursor::new(self, self.lower_bound_node(key))
    }

    pub fn upper_bound(&self, key: &KoV::Key) -> Cursor<'_, T, KoV, C, A> {
        Cursor::new(self, self.upper_bound_node(key))
    }

    /// Every element whose key is equivalent to `key`, in insertion order.
    pub fn equal_range(&self, key: &KoV::Key) -> Range<'_, T> {
        Range::new(
            self.lower_bound_node(key),
            self.upper_bound_node(key),
            self.header,
        )
    }

    /// Elements from the first key not less than `key` to the end.
    pub fn range_from(&self, key: &KoV::Key) -> Range<'_, T> {
        Range::new(self.lower_bound_node(key), self.header, self.header)
    }

    /// Elements whose keys fall within `bounds`. Inverted or empty bounds
    /// yield nothing.
    pub fn range<R: RangeBounds<KoV::Key>>(&self, bounds: R) -> Range<'_, T> {
        let start = bounds.start_bound();
        let end = bounds.end_bound();
        if let (Some((lo, lo_inclusive)), Some((hi, hi_inclusive))) =
            (keyed_bound(start), keyed_bound(end))
        {
            if self.less(hi, lo) {
                return Range::empty(self.header);
            }
            let equivalent = !self.less(lo, hi);
            if equivalent && !(lo_inclusive && hi_inclusive) {
                return Range::empty(self.header);
            }
        }
        let front = match start {
            Bound::Included(key) => self.lower_bound_node(key),
            Bound::Excluded(key) => self.upper_bound_node(key),
            Bound::Unbounded => self.leftmost(),
        };
        let back = match end {
            Bound::Included(key) => self.upper_bound_node(key),
            Bound::Excluded(key) => self.lower_bound_node(key),
            Bound::Unbounded => self.header,
        };
        Range::new(front, back, self.header)
    }

    pub fn count(&self, key: &KoV::Key) -> usize {
        self.equal_range(key).count()
    }

    /// Erases every element with an equivalent key; returns how many.
    pub fn erase_key(&mut self, key: &KoV::Key) -> usize {
        let mut node = self.lower_bound_node(key);
        let last = self.upper_bound_node(key);
        let mut erased = 0;
        while node != last {
            // SAFETY: node precedes last, so it is real; erasing relinks other
            // nodes without moving them.
            unsafe {
                let next = increment(node);
                drop(self.erase_node(node));
                node = next;
            }
            erased += 1;
        }
        erased
    }

    /// Removes the first element with an equivalent key.
    pub fn remove_one(&mut self, key: &KoV::Key) -> Option<T> {
        let node = self.find_node(key)?;
        // SAFETY: find_node returns real nodes only.
        Some(unsafe { self.erase_node(node) })
    }

    /// Checks every structural invariant: header color, root color, parent
    /// links, no red-red edge, equal black height, key order, the leftmost
    /// and rightmost caches and the element count.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        let header = self.header;
        // SAFETY: read-only walk over this tree's nodes; the count guard
        // stops on a cycle.
        unsafe {
            if header.color() != Color::Red {
                return Err(InvariantViolation::HeaderNotRed);
            }
            let Some(top) = root(header) else {
                if header.left() != Some(header) {
                    return Err(InvariantViolation::StaleLeftmost);
                }
                if header.right() != Some(header) {
                    return Err(InvariantViolation::StaleRightmost);
                }
                if self.len != 0 {
                    return Err(InvariantViolation::LengthMismatch {
                        recorded: self.len,
                        counted: 0,
                    });
                }
                return Ok(());
            };

            if top.color() == Color::Red {
                return Err(InvariantViolation::RedRoot);
            }
            if top.parent() != Some(header) {
                return Err(InvariantViolation::BrokenParentLink);
            }
            if header.left() != Some(minimum(top)) {
                return Err(InvariantViolation::StaleLeftmost);
            }
            if header.right() != Some(maximum(top)) {
                return Err(InvariantViolation::StaleRightmost);
            }

            let expected = black_count(self.leftmost(), top);
            let mut counted = 0;
            let mut prev: Option<NodePtr> = None;
            let mut node = self.leftmost();
            while node != header {
                counted += 1;
                if counted > self.len {
                    return Err(InvariantViolation::LengthMismatch {
                        recorded: self.len,
                        counted,
                    });
                }

                let (left, right) = (node.left(), node.right());
                if node.color() == Color::Red && (is_red(left) || is_red(right)) {
                    return Err(InvariantViolation::RedRed);
                }
                if let Some(l) = left {
                    if l.parent() != Some(node) {
                        return Err(InvariantViolation::BrokenParentLink);
                    }
                    if self.less(self.key_at(node), self.key_at(l)) {
                        return Err(InvariantViolation::OutOfOrder);
                    }
                }
                if let Some(r) = right {
                    if r.parent() != Some(node) {
                        return Err(InvariantViolation::BrokenParentLink);
                    }
                    if self.less(self.key_at(r), self.key_at(node)) {
                        return Err(InvariantViolation::OutOfOrder);
                    }
                }
                if let Some(p) = prev {
                    if self.less(self.key_at(node), self.key_at(p)) {
                        return Err(InvariantViolation::OutOfOrder);
                    }
                }
                if left.is_none() || right.is_none() {
                    let found = black_count(node, top);
                    if found != expected {
                        return Err(InvariantViolation::BlackHeight { expected, found });
                    }
                }

                prev = Some(node);
                node = increment(node);
            }

            if counted != self.len {
                return Err(InvariantViolation::LengthMismatch {
                    recorded: self.len,
                    counted,
                });
            }
        }
        Ok(())
    }
}

fn keyed_bound<K: ?Sized>(bound: Bound<&K>) -> Option<(&K, bool)> {
    match bound {
        Bound::Included(key) => Some((key, true)),
        Bound::Excluded(key) => Some((key, false)),
        Bound::Unbounded => None,
    }
}

// ============================================================================
// Trait impls
// ============================================================================

impl<T, KoV, C, A: Allocator> Drop for RbTree<T, KoV, C, A> {
    fn drop(&mut self) {
        // SAFETY: the tree owns every node and the boxed header.
        unsafe {
            free_subtree::<T, A>(&self.alloc, root(self.header), true);
            drop(Box::from_raw(self.header.as_base().as_ptr()));
        }
    }
}

impl<T, KoV, C, A> Clone for RbTree<T, KoV, C, A>
where
    T: Clone,
    KoV: Clone,
    C: Clone,
    A: Allocator + Clone,
{
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(tree) => tree,
            Err(err) => handle_alloc_failure(err),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if let Err(err) = self.try_clone_from(source) {
            handle_alloc_failure(err);
        }
    }
}

impl<T, KoV, C, A> Default for RbTree<T, KoV, C, A>
where
    KoV: Default,
    C: Default,
    A: Allocator + Default,
{
    fn default() -> Self {
        Self::new_in(KoV::default(), C::default(), A::default())
    }
}

impl<T: PartialEq, KoV, C, A: Allocator> PartialEq for RbTree<T, KoV, C, A> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Eq, KoV, C, A: Allocator> Eq for RbTree<T, KoV, C, A> {}

impl<T: PartialOrd, KoV, C, A: Allocator> PartialOrd for RbTree<T, KoV, C, A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord, KoV, C, A: Allocator> Ord for RbTree<T, KoV, C, A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<T: fmt::Debug, KoV, C, A: Allocator> fmt::Debug for RbTree<T, KoV, C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T, KoV, C, A: Allocator> IntoIterator for &'a RbTree<T, KoV, C, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T, KoV, C, A: Allocator> IntoIterator for RbTree<T, KoV, C, A> {
    type Item = T;
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> IntoIter<T, A> {
        let mut tree = ManuallyDrop::new(self);
        let (header, front, len) = (tree.header, tree.leftmost(), tree.len);
        // SAFETY: tree is never dropped; the allocator is moved out once and
        // the strategy objects are dropped in place once. Node and header
        // ownership passes to the iterator.
        unsafe {
            let alloc = ptr::read(&raw const tree.alloc);
            ptr::drop_in_place(&raw mut tree.key_of);
            ptr::drop_in_place(&raw mut tree.compare);
            IntoIter::new(header, front, len, alloc)
        }
    }
}
