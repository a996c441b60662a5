//! The ready ring: runnable tasks ordered by descending priority, with
//! IDLE permanently anchoring the tail as both sentinel and the
//! lowest-priority task that is always schedulable.

use abi::Priority;

use crate::arena::{Node, NodeIx};
use crate::ring::{self, LinkField};

/// Splice `task` into the ready ring in descending-priority order,
/// FIFO among equals (new arrivals land after existing equal-priority
/// tasks, since the scan only steps past nodes ranked *at or above*
/// the inserted priority).
///
/// Returns `true` if `task` became the new head — the caller's signal
/// to request a context switch, since a higher-priority task just
/// became runnable.
pub fn insert(arena: &mut [Node], idle: NodeIx, task: NodeIx) -> bool {
    let prio = arena[task.index()].as_task().prio;
    let mut cursor = ring::head(arena, LinkField::SCHED, idle).unwrap_or(idle);
    while cursor != idle {
        let cursor_prio = arena[cursor.index()].as_task().prio;
        if cursor_prio < prio {
            break;
        }
        cursor = ring::next(arena, LinkField::SCHED, cursor).expect("ring always linked");
    }
    ring::insert(arena, LinkField::SCHED, task, cursor);
    ring::head(arena, LinkField::SCHED, idle) == Some(task)
}

pub fn remove(arena: &mut [Node], task: NodeIx) {
    ring::remove(arena, LinkField::SCHED, task);
}

pub fn head(arena: &[Node], idle: NodeIx) -> NodeIx {
    ring::head(arena, LinkField::SCHED, idle).unwrap_or(idle)
}

/// Rotate `task` (currently the ready-ring head) behind any other
/// tasks sharing its priority, for round-robin preemption.
pub fn rotate(arena: &mut [Node], idle: NodeIx, task: NodeIx) {
    remove(arena, task);
    insert(arena, idle, task);
}

/// The priority of the second-ranked ready task, used by the
/// cooperative-yield check (`ctx_switch`): a voluntary yield only
/// triggers a real switch if an equal-priority peer is waiting.
pub fn second_priority(arena: &[Node], idle: NodeIx) -> Option<Priority> {
    let h = ring::head(arena, LinkField::SCHED, idle)?;
    let second = ring::next(arena, LinkField::SCHED, h)?;
    if second == idle {
        None
    } else {
        Some(arena[second.index()].as_task().prio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Body, TaskBody};

    fn arena_with(n: usize) -> std::vec::Vec<Node> {
        (0..n).map(|_| Node::free()).collect()
    }

    fn mk_task(arena: &mut [Node], ix: usize, prio: u8) -> NodeIx {
        arena[ix].body = Body::Task(TaskBody::new(Priority::new(prio), 0, 0));
        NodeIx::from_index(ix)
    }

    #[test]
    fn ready_ring_stays_descending_by_priority() {
        let mut a = arena_with(4);
        let idle = NodeIx::from_index(0);
        ring::init_anchor(&mut a, LinkField::SCHED, idle);

        let lo = mk_task(&mut a, 1, 1);
        let hi = mk_task(&mut a, 2, 5);
        let mid = mk_task(&mut a, 3, 3);

        insert(&mut a, idle, lo);
        insert(&mut a, idle, hi);
        insert(&mut a, idle, mid);

        assert_eq!(head(&a, idle), hi);
        assert_eq!(ring::next(&a, LinkField::SCHED, hi), Some(mid));
        assert_eq!(ring::next(&a, LinkField::SCHED, mid), Some(lo));
    }

    #[test]
    fn insert_reports_new_head() {
        let mut a = arena_with(3);
        let idle = NodeIx::from_index(0);
        ring::init_anchor(&mut a, LinkField::SCHED, idle);

        let lo = mk_task(&mut a, 1, 1);
        assert!(insert(&mut a, idle, lo));

        let hi = mk_task(&mut a, 2, 9);
        assert!(insert(&mut a, idle, hi));
    }

    #[test]
    fn equal_priority_tasks_are_fifo() {
        let mut a = arena_with(3);
        let idle = NodeIx::from_index(0);
        ring::init_anchor(&mut a, LinkField::SCHED, idle);

        let first = mk_task(&mut a, 1, 2);
        let second = mk_task(&mut a, 2, 2);
        insert(&mut a, idle, first);
        insert(&mut a, idle, second);

        assert_eq!(head(&a, idle), first);
        assert_eq!(ring::next(&a, LinkField::SCHED, first), Some(second));
    }

    #[test]
    fn rotate_moves_task_behind_equal_priority_peers() {
        let mut a = arena_with(3);
        let idle = NodeIx::from_index(0);
        ring::init_anchor(&mut a, LinkField::SCHED, idle);

        let first = mk_task(&mut a, 1, 2);
        let second = mk_task(&mut a, 2, 2);
        insert(&mut a, idle, first);
        insert(&mut a, idle, second);

        rotate(&mut a, idle, first);
        assert_eq!(head(&a, idle), second);
        assert_eq!(ring::next(&a, LinkField::SCHED, second), Some(first));
    }
}
