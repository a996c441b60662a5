//! Intrusive doubly-linked ring over the node arena.
//!
//! Every ring in this kernel (the ready queue, the timer queue, and
//! every wait queue) is represented the same way: a sentinel/anchor
//! node whose `next` is the head and whose `prev` is the tail, so an
//! empty ring is just the anchor linked to itself. `insert`/`remove`
//! operate purely on indices into the shared arena and a field
//! selector telling them which of a node's two link fields (`sched`
//! or `wait`) this particular ring uses — the borrow checker, not a
//! runtime lock object, is what forces every caller through
//! `Kernel::with_lock` before touching the arena.

use crate::arena::{Link, Node, NodeIx};

/// Selects which [`Link`] field of a [`Node`] a ring operates over.
/// Passed as a pair of accessors rather than as an enum so `insert`/
/// `remove` stay branch-free.
#[derive(Clone, Copy)]
pub struct LinkField {
    get: fn(&Node) -> &Link,
    get_mut: fn(&mut Node) -> &mut Link,
}

impl LinkField {
    pub const SCHED: LinkField = LinkField {
        get: |n| &n.sched_link,
        get_mut: |n| &mut n.sched_link,
    };

    pub const WAIT: LinkField = LinkField {
        get: |n| &n.wait_link,
        get_mut: |n| &mut n.wait_link,
    };
}

fn link<'a>(arena: &'a [Node], field: LinkField, ix: NodeIx) -> &'a Link {
    (field.get)(&arena[ix.index()])
}

fn link_mut<'a>(arena: &'a mut [Node], field: LinkField, ix: NodeIx) -> &'a mut Link {
    (field.get_mut)(&mut arena[ix.index()])
}

/// Splice `node` into the ring immediately before `before`.
///
/// `before` is usually the ring's anchor (append at the tail) or the
/// first node found to rank behind `node` during a priority-ordered
/// scan (insert in the middle).
pub fn insert(arena: &mut [Node], field: LinkField, node: NodeIx, before: NodeIx) {
    let prev = link(arena, field, before).prev.expect("ring always linked");
    link_mut(arena, field, node).prev = Some(prev);
    link_mut(arena, field, node).next = Some(before);
    link_mut(arena, field, prev).next = Some(node);
    link_mut(arena, field, before).prev = Some(node);
}

/// Unlink `node` from whichever ring it is currently part of under
/// `field`. Leaves `node`'s own link cleared (`Link::unlinked`).
pub fn remove(arena: &mut [Node], field: LinkField, node: NodeIx) {
    let l = *link(arena, field, node);
    if let (Some(prev), Some(next)) = (l.prev, l.next) {
        link_mut(arena, field, prev).next = Some(next);
        link_mut(arena, field, next).prev = Some(prev);
    }
    *link_mut(arena, field, node) = Link::unlinked();
}

/// Initialize `anchor` as an empty ring (linked to itself).
pub fn init_anchor(arena: &mut [Node], field: LinkField, anchor: NodeIx) {
    *link_mut(arena, field, anchor) = Link {
        prev: Some(anchor),
        next: Some(anchor),
    };
}

pub fn head(arena: &[Node], field: LinkField, anchor: NodeIx) -> Option<NodeIx> {
    let h = link(arena, field, anchor).next.expect("ring always linked");
    if h == anchor {
        None
    } else {
        Some(h)
    }
}

pub fn is_empty(arena: &[Node], field: LinkField, anchor: NodeIx) -> bool {
    head(arena, field, anchor).is_none()
}

pub fn next(arena: &[Node], field: LinkField, node: NodeIx) -> Option<NodeIx> {
    link(arena, field, node).next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Body;

    fn arena(n: usize) -> std::vec::Vec<Node> {
        (0..n).map(|_| Node::free()).collect()
    }

    #[test]
    fn empty_ring_has_no_head() {
        let mut a = arena(1);
        let anchor = NodeIx::from_index(0);
        init_anchor(&mut a, LinkField::SCHED, anchor);
        assert!(is_empty(&a, LinkField::SCHED, anchor));
        assert_eq!(head(&a, LinkField::SCHED, anchor), None);
    }

    #[test]
    fn insert_and_remove_round_trip() {
        let mut a = arena(3);
        let anchor = NodeIx::from_index(0);
        let x = NodeIx::from_index(1);
        let y = NodeIx::from_index(2);
        a[x.index()].body = Body::Task(crate::arena::TaskBody::new(
            abi::Priority::new(1),
            0,
            0,
        ));
        init_anchor(&mut a, LinkField::SCHED, anchor);

        insert(&mut a, LinkField::SCHED, x, anchor);
        assert_eq!(head(&a, LinkField::SCHED, anchor), Some(x));

        insert(&mut a, LinkField::SCHED, y, anchor);
        assert_eq!(head(&a, LinkField::SCHED, anchor), Some(x));
        assert_eq!(next(&a, LinkField::SCHED, x), Some(y));
        assert_eq!(next(&a, LinkField::SCHED, y), Some(anchor));

        remove(&mut a, LinkField::SCHED, x);
        assert_eq!(head(&a, LinkField::SCHED, anchor), Some(y));
        assert_eq!(next(&a, LinkField::SCHED, y), Some(anchor));
    }
}
