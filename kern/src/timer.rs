//! The timer ring: a single ordered list carrying both free-standing
//! user timers and the embedded delay of every `DELAYED` task.
//!
//! Sorted ascending by absolute deadline (`start + delay`), compared
//! with unsigned modular arithmetic so ordering survives tick-counter
//! wraparound. The sentinel anchoring this ring (`WAIT` in the
//! original) never itself needs a deadline comparison — scans always
//! stop at the anchor before reading its timer fields — so it is
//! plain [`crate::arena::Body::Anchor`] here rather than a timer
//! carrying `delay = INFINITE`.

use abi::{Event, Tick};

use crate::arena::{Node, NodeIx};
use crate::ring::{self, LinkField};

/// True iff `a`'s deadline is strictly before `b`'s, using unsigned
/// modular comparison bounded by `cnt_max`. Deadlines farther apart
/// than `cnt_max / 2` are assumed to have wrapped and are treated as
/// equal-ish (ties broken by insertion order via the scan direction).
fn before(a: Tick, b: Tick, cnt_max: Tick) -> bool {
    a != b && b.wrapping_sub(a) < cnt_max / 2
}

/// Insert `node` (already carrying its `TimerBody`) into the timer
/// ring anchored at `wait`, in deadline order.
pub fn insert(arena: &mut [Node], wait: NodeIx, node: NodeIx, cnt_max: Tick) {
    let deadline = arena[node.index()].as_timer().deadline();
    let mut cursor = ring::head(arena, LinkField::SCHED, wait).unwrap_or(wait);
    while cursor != wait {
        let cursor_deadline = arena[cursor.index()].as_timer().deadline();
        if before(deadline, cursor_deadline, cnt_max) {
            break;
        }
        cursor = ring::next(arena, LinkField::SCHED, cursor).expect("ring always linked");
    }
    ring::insert(arena, LinkField::SCHED, node, cursor);
}

pub fn remove(arena: &mut [Node], node: NodeIx) {
    ring::remove(arena, LinkField::SCHED, node);
}

pub fn head(arena: &[Node], wait: NodeIx) -> Option<NodeIx> {
    ring::head(arena, LinkField::SCHED, wait)
}

/// Whether the ring's head has reached its deadline, under periodic-
/// tick timekeeping: `delay < now - start + 1`.
pub fn expired_periodic(arena: &[Node], head: NodeIx, now: Tick) -> bool {
    let t = arena[head.index()].as_timer();
    let elapsed = now.wrapping_sub(t.start);
    t.delay < elapsed.wrapping_add(1)
}

/// Whether the ring's head has reached its deadline, under tickless
/// timekeeping: the hardware one-shot is the source of truth, but a
/// software recheck against `now` covers the race where the deadline
/// passes between the HW timer firing and this check running.
pub fn expired_tickless(arena: &[Node], head: NodeIx, now: Tick) -> bool {
    let t = arena[head.index()].as_timer();
    now.wrapping_sub(t.start) >= t.delay
}

/// Result of processing one expired timer-ring head, returned to the
/// kernel so it can perform the wake/reinsert that requires mutable
/// access to the ready ring as well (kept out of this module to avoid
/// a circular dependency between `timer` and `sched`).
pub enum Expiry {
    /// A free-standing user timer expired. One-shot timers are simply
    /// removed by the caller; periodic timers are re-inserted with
    /// `delay = period` by the caller after running `callback`.
    Timer { node: NodeIx, periodic: bool, callback: Option<crate::arena::TimerCallback> },
    /// A task's delay expired; it must be moved from the timer ring
    /// into the ready ring with `Event::Timeout`.
    TaskDelay { node: NodeIx },
}

/// Pop and classify the expired head, advancing its `start` by `delay`
/// (the original's "no catch-up" re-arm point: if a periodic timer's
/// own callback or the time between handler invocations exceeds its
/// period, the lost ticks are not made up — `start` always advances by
/// exactly one `delay`, never by however many periods actually
/// elapsed). Does not reinsert; the caller does that based on the
/// returned [`Expiry`], using whichever anchor the node is headed
/// back into (timer ring for a periodic reload, ready ring for a
/// woken task).
pub fn pop_expired(arena: &mut [Node], head: NodeIx, event: Event) -> Expiry {
    remove(arena, head);
    let node = &mut arena[head.index()];
    let is_task = node.is_task();
    let t = node.as_timer_mut();
    t.start = t.start.wrapping_add(t.delay);
    t.event = event;

    if is_task {
        Expiry::TaskDelay { node: head }
    } else {
        let periodic = t.period != 0;
        if periodic {
            t.delay = t.period;
        }
        let callback = t.callback;
        Expiry::Timer { node: head, periodic, callback }
    }
}
