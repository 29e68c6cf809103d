//! Structural red-black algorithms over raw links.
//!
//! All functions are `unsafe`: every `NodePtr` argument must belong to the
//! tree whose header is passed, and the tree must be structurally valid on
//! entry (parent/child links agree, header fields as documented in
//! [`RbTree`](super::RbTree)).

use super::node::{Color, Link, NodePtr, is_red, present};

#[inline]
pub(crate) unsafe fn root(header: NodePtr) -> Link {
    // SAFETY: header is live.
    unsafe { header.parent() }
}

pub(crate) unsafe fn minimum(mut x: NodePtr) -> NodePtr {
    // SAFETY: x and its left spine are live nodes.
    while let Some(left) = unsafe { x.left() } {
        x = left;
    }
    x
}

pub(crate) unsafe fn maximum(mut x: NodePtr) -> NodePtr {
    // SAFETY: x and its right spine are live nodes.
    while let Some(right) = unsafe { x.right() } {
        x = right;
    }
    x
}

/// In-order successor. Past the rightmost node this lands on the header.
///
/// `x` must be a real node, not the header.
pub(crate) unsafe fn increment(mut x: NodePtr) -> NodePtr {
    // SAFETY: all nodes reached are live members of the same tree; the
    // upward walk stops at the header at the latest, because the root's
    // parent is the header and the header's parent is the root.
    unsafe {
        if let Some(right) = x.right() {
            return minimum(right);
        }
        let mut y = present(x.parent());
        while y.right() == Some(x) {
            x = y;
            y = present(y.parent());
        }
        // Root without right child: y is the header, whose right is the root.
        if x.right() != Some(y) {
            x = y;
        }
        x
    }
}

/// In-order predecessor. From the header this lands on the rightmost node.
pub(crate) unsafe fn decrement(x: NodePtr, header: NodePtr) -> NodePtr {
    // SAFETY: as for increment.
    unsafe {
        if x == header {
            return present(header.right());
        }
        if let Some(left) = x.left() {
            return maximum(left);
        }
        let mut x = x;
        let mut y = present(x.parent());
        while y.left() == Some(x) {
            x = y;
            y = present(y.parent());
        }
        y
    }
}

unsafe fn replace_child(header: NodePtr, old: NodePtr, new: Link) {
    // SAFETY: old is a live node whose parent is the header or a node.
    unsafe {
        let parent = present(old.parent());
        if root(header) == Some(old) {
            header.set_parent(new);
        } else if parent.left() == Some(old) {
            parent.set_left(new);
        } else {
            parent.set_right(new);
        }
    }
}

pub(crate) unsafe fn rotate_left(x: NodePtr, header: NodePtr) {
    // SAFETY: x has a right child (caller's shape guarantee).
    unsafe {
        let y = present(x.right());
        x.set_right(y.left());
        if let Some(inner) = y.left() {
            inner.set_parent(Some(x));
        }
        y.set_parent(x.parent());
        replace_child(header, x, Some(y));
        y.set_left(Some(x));
        x.set_parent(Some(y));
    }
}

pub(crate) unsafe fn rotate_right(x: NodePtr, header: NodePtr) {
    // SAFETY: x has a left child (caller's shape guarantee).
    unsafe {
        let y = present(x.left());
        x.set_left(y.right());
        if let Some(inner) = y.right() {
            inner.set_parent(Some(x));
        }
        y.set_parent(x.parent());
        replace_child(header, x, Some(y));
        y.set_right(Some(x));
        x.set_parent(Some(y));
    }
}

/// Restores the red-black invariants after `x` was linked in as a leaf.
pub(crate) unsafe fn rebalance_insert(mut x: NodePtr, header: NodePtr) {
    // SAFETY: while x's parent is red it is not the root, so the grandparent
    // exists and is a real node.
    unsafe {
        x.set_color(Color::Red);
        while root(header) != Some(x) && is_red(x.parent()) {
            let parent = present(x.parent());
            let grand = present(parent.parent());

            if grand.left() == Some(parent) {
                let uncle = grand.right();
                if is_red(uncle) {
                    parent.set_color(Color::Black);
                    present(uncle).set_color(Color::Black);
                    grand.set_color(Color::Red);
                    x = grand;
                } else {
                    if parent.right() == Some(x) {
                        x = parent;
                        rotate_left(x, header);
                    }
                    let parent = present(x.parent());
                    let grand = present(parent.parent());
                    parent.set_color(Color::Black);
                    grand.set_color(Color::Red);
                    rotate_right(grand, header);
                }
            } else {
                let uncle = grand.left();
                if is_red(uncle) {
                    parent.set_color(Color::Black);
                    present(uncle).set_color(Color::Black);
                    grand.set_color(Color::Red);
                    x = grand;
                } else {
                    if parent.left() == Some(x) {
                        x = parent;
                        rotate_right(x, header);
                    }
                    let parent = present(x.parent());
                    let grand = present(parent.parent());
                    parent.set_color(Color::Black);
                    grand.set_color(Color::Red);
                    rotate_left(grand, header);
                }
            }
        }
        present(root(header)).set_color(Color::Black);
    }
}

/// Unlinks `z` from the tree and restores the invariants. Updates the
/// header's leftmost/rightmost caches. The caller frees `z` afterwards.
pub(crate) unsafe fn rebalance_for_erase(z: NodePtr, header: NodePtr) {
    // SAFETY: z is a real node of this tree; every present() below is backed
    // by the red-black shape (a black-height deficit implies a sibling).
    unsafe {
        let mut y = z;
        let mut x: Link;
        let x_parent: NodePtr;

        if z.left().is_none() {
            x = z.right();
        } else if z.right().is_none() {
            x = z.left();
        } else {
            y = minimum(present(z.right()));
            x = y.right();
        }

        let removed_color;
        if y != z {
            // Two children: relink the successor y in z's place.
            let z_left = present(z.left());
            z_left.set_parent(Some(y));
            y.set_left(Some(z_left));

            if z.right() == Some(y) {
                x_parent = y;
            } else {
                x_parent = present(y.parent());
                if let Some(x) = x {
                    x.set_parent(y.parent());
                }
                x_parent.set_left(x);
                let z_right = present(z.right());
                y.set_right(Some(z_right));
                z_right.set_parent(Some(y));
            }

            replace_child(header, z, Some(y));
            y.set_parent(z.parent());

            // y takes over z's color; the removed position carries y's old one.
            removed_color = y.color();
            y.set_color(z.color());
        } else {
            x_parent = present(z.parent());
            if let Some(x) = x {
                x.set_parent(z.parent());
            }
            replace_child(header, z, x);

            if header.left() == Some(z) {
                let leftmost = match z.right() {
                    None => x_parent,
                    Some(_) => minimum(present(x)),
                };
                header.set_left(Some(leftmost));
            }
            if header.right() == Some(z) {
                let rightmost = match z.left() {
                    None => x_parent,
                    Some(_) => maximum(present(x)),
                };
                header.set_right(Some(rightmost));
            }
            removed_color = z.color();
        }

        if removed_color == Color::Red {
            return;
        }

        let mut x_parent = x_parent;
        while x != root(header) && !is_red(x) {
            if x_parent.left() == x {
                let mut w = present(x_parent.right());
                if w.color() == Color::Red {
                    w.set_color(Color::Black);
                    x_parent.set_color(Color::Red);
                    rotate_left(x_parent, header);
                    w = present(x_parent.right());
                }
                if !is_red(w.left()) && !is_red(w.right()) {
                    w.set_color(Color::Red);
                    x = Some(x_parent);
                    x_parent = present(x_parent.parent());
                } else {
                    if !is_red(w.right()) {
                        if let Some(wl) = w.left() {
                            wl.set_color(Color::Black);
                        }
                        w.set_color(Color::Red);
                        rotate_right(w, header);
                        w = present(x_parent.right());
                    }
                    w.set_color(x_parent.color());
                    x_parent.set_color(Color::Black);
                    if let Some(wr) = w.right() {
                        wr.set_color(Color::Black);
                    }
                    rotate_left(x_parent, header);
                    break;
                }
            } else {
                let mut w = present(x_parent.left());
                if w.color() == Color::Red {
                    w.set_color(Color::Black);
                    x_parent.set_color(Color::Red);
                    rotate_right(x_parent, header);
                    w = present(x_parent.left());
                }
                if !is_red(w.right()) && !is_red(w.left()) {
                    w.set_color(Color::Red);
                    x = Some(x_parent);
                    x_parent = present(x_parent.parent());
                } else {
                    if !is_red(w.left()) {
                        if let Some(wr) = w.right() {
                            wr.set_color(Color::Black);
                        }
                        w.set_color(Color::Red);
                        rotate_left(w, header);
                        w = present(x_parent.left());
                    }
                    w.set_color(x_parent.color());
                    x_parent.set_color(Color::Black);
                    if let Some(wl) = w.left() {
                        wl.set_color(Color::Black);
                    }
                    rotate_right(x_parent, header);
                    break;
                }
            }
        }
        if let Some(x) = x {
            x.set_color(Color::Black);
        }
    }
}

/// Black nodes on the path from `node` up to and including `root`.
pub(crate) unsafe fn black_count(node: NodePtr, root: NodePtr) -> usize {
    let mut count = 0;
    let mut cur = node;
    // SAFETY: the upward walk from a real node reaches root.
    unsafe {
        loop {
            if cur.color() == Color::Black {
                count += 1;
            }
            if cur == root {
                return count;
            }
            cur = present(cur.parent());
        }
    }
}
