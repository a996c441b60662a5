//! The wait-queue protocol every synchronization object in this
//! kernel is built from: a priority-ordered ring of blocked tasks,
//! anchored on a dedicated node the object owns.
//!
//! Unlike the original, where a queue's "head" was a bare pointer
//! field inside the object (`obj.queue`) patched in place by whichever
//! task's `back` pointed at it, every wait queue here owns a real
//! anchor node living in the shared arena. That anchor is itself an
//! [`crate::arena::Body::Anchor`] — never scheduled, never timed — so
//! `ring::insert`/`ring::remove` can treat every wait queue exactly
//! like the ready ring or the timer ring: always non-empty, no
//! special-cased null head. Concretely this means `guard`, not `back`,
//! is the field that answers "is this task queued, and where" — once
//! every queue has its own anchor, "where" is just "whichever anchor
//! `guard` names", and "is `*task.back == task`" from the original's
//! invariant becomes redundant with "is `task` linked into `guard`'s
//! ring", which the arena already enforces structurally.

use abi::Event;

use crate::arena::{Node, NodeIx};
use crate::ring::{self, LinkField};

/// Append `task` to the wait queue anchored at `anchor`, in descending
/// priority order with FIFO tie-break among equals. Records
/// `task.guard = Some(anchor)` so later operations (`tsk_give`-style
/// identity checks, `resume`) can confirm which object a task is
/// blocked on.
pub fn append(arena: &mut [Node], anchor: NodeIx, task: NodeIx) {
    let prio = arena[task.index()].as_task().prio;
    let mut cursor = ring::head(arena, LinkField::WAIT, anchor).unwrap_or(anchor);
    while cursor != anchor {
        let cursor_prio = arena[cursor.index()].as_task().prio;
        if cursor_prio < prio {
            break;
        }
        cursor = ring::next(arena, LinkField::WAIT, cursor).expect("ring always linked");
    }
    ring::insert(arena, LinkField::WAIT, task, cursor);
    arena[task.index()].as_task_mut().guard = Some(anchor);
}

/// Remove `task` from whatever wait queue it is on, recording `event`
/// as its wake reason and clearing `guard`.
pub fn unlink(arena: &mut [Node], task: NodeIx, event: Event) {
    ring::remove(arena, LinkField::WAIT, task);
    let t = arena[task.index()].as_task_mut();
    t.guard = None;
    t.timer.event = event;
}

/// Unlink `task` from its current queue and append it to `dest` —
/// used when a blocked task's priority changes and it must re-sort
/// into (or migrate toward) a different position, without waking it.
pub fn transfer(arena: &mut [Node], task: NodeIx, dest: NodeIx) {
    ring::remove(arena, LinkField::WAIT, task);
    append(arena, dest, task);
}

pub fn head(arena: &[Node], anchor: NodeIx) -> Option<NodeIx> {
    ring::head(arena, LinkField::WAIT, anchor)
}

pub fn is_empty(arena: &[Node], anchor: NodeIx) -> bool {
    ring::is_empty(arena, LinkField::WAIT, anchor)
}

/// Re-sort `task` within the wait queue it is already linked into,
/// after its priority has changed (the `Kernel::core_tsk_prio`
/// inheritance hook). No-op if it isn't currently queued.
pub fn resort(arena: &mut [Node], task: NodeIx) {
    if let Some(anchor) = arena[task.index()].as_task().guard {
        transfer(arena, task, anchor);
    }
}
