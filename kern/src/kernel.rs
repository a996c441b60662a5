//! The top-level kernel value: owns the node arena and the two
//! permanent sentinels (`IDLE`, anchoring the ready ring; `WAIT`,
//! anchoring the timer ring and, via its other link field, the
//! suspend queue), and dispatches into `sched`/`timer`/`waitq` under
//! a single borrow rather than a collection of process-wide statics.
//!
//! A host crate constructs exactly one `Kernel` (typically inside a
//! `static` protected by whatever mechanism `Port` itself relies on —
//! outside this crate's scope, since the port layer is the deliberate
//! external collaborator named in the scope notes) and drives it from
//! its interrupt vector table and task trampoline.

use abi::{Event, Priority, Tick};

use crate::arena::{Body, Node, NodeIx, TaskBody};
use crate::config::Config;
use crate::port::Port;
use crate::ring::{self, LinkField};
use crate::sched;
use crate::timer::{self, Expiry};
use crate::trace::{Trace, RINGBUF};
use crate::waitq;
use ringbuf::ringbuf_entry;

/// Fixed-capacity arena of `N` nodes, two of which (`IDLE` and `WAIT`)
/// are permanently reserved as sentinels; the remaining `N - 2` are
/// available for tasks and free-standing timers.
pub struct Kernel<const N: usize, P: Port> {
    arena: [Node; N],
    free_head: Option<NodeIx>,
    idle: NodeIx,
    wait: NodeIx,
    cur: NodeIx,
    pending_switch: bool,
    config: Config,
    port: P,
}

/// Returned by `Kernel::new` when the idle task itself (the one thing
/// that must always fit) doesn't — i.e. `N < 2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityError;

impl<const N: usize, P: Port> Kernel<N, P> {
    /// Build a fresh kernel. `idle_entry`/`idle_stack` describe the
    /// IDLE task's body, which must never return (it loops on
    /// `Port::idle_wait`) and is always schedulable, guaranteeing the
    /// ready ring is never truly empty.
    pub fn new(
        port: P,
        config: Config,
        idle_stack: (usize, usize),
    ) -> Result<Self, CapacityError> {
        if N < 2 {
            return Err(CapacityError);
        }
        let mut arena = [Node::free(); N];
        let idle = NodeIx::from_index(0);
        let wait = NodeIx::from_index(1);

        arena[idle.index()].body = Body::Task(TaskBody::new(Priority::IDLE, idle_stack.0, idle_stack.1));
        arena[wait.index()].body = Body::Anchor;

        ring::init_anchor(&mut arena, LinkField::SCHED, idle);
        ring::init_anchor(&mut arena, LinkField::SCHED, wait);
        ring::init_anchor(&mut arena, LinkField::WAIT, wait);

        let mut free_head = None;
        for ix in (2..N).rev() {
            arena[ix] = Node::free();
            arena[ix].sched_link.next = free_head;
            free_head = Some(NodeIx::from_index(ix));
        }

        Ok(Kernel {
            arena,
            free_head,
            idle,
            wait,
            cur: idle,
            pending_switch: false,
            config,
            port,
        })
    }

    pub fn idle(&self) -> NodeIx {
        self.idle
    }

    pub fn wait_anchor(&self) -> NodeIx {
        self.wait
    }

    /// The suspend queue (used by `tsk_suspend`/`tsk_resume`) is
    /// anchored on `WAIT`'s *wait* link — the same node that anchors
    /// the timer ring via its *sched* link, reusing the sentinel the
    /// same way the original reused `WAIT.obj.queue` for both roles.
    pub fn suspend_anchor(&self) -> NodeIx {
        self.wait
    }

    pub fn current(&self) -> NodeIx {
        self.cur
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    fn lock(&self) -> P::Guard {
        self.port.lock()
    }

    pub fn arena(&self) -> &[Node] {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut [Node] {
        &mut self.arena
    }

    pub fn task(&self, ix: NodeIx) -> &TaskBody {
        self.arena[ix.index()].as_task()
    }

    pub fn task_mut(&mut self, ix: NodeIx) -> &mut TaskBody {
        self.arena[ix.index()].as_task_mut()
    }

    /// Outcome delivered to `ix` by the last wake/timeout/kill —
    /// what a real `tsk_loop` trampoline would read as the return
    /// value of the blocking call it just resumed from.
    pub fn task_event(&self, ix: NodeIx) -> Event {
        self.arena[ix.index()].as_timer().event
    }

    // -- arena allocation -----------------------------------------

    pub fn alloc_node(&mut self) -> Option<NodeIx> {
        let ix = self.free_head?;
        self.free_head = self.arena[ix.index()].sched_link.next;
        self.arena[ix.index()].sched_link = crate::arena::Link::unlinked();
        Some(ix)
    }

    pub fn free_node(&mut self, ix: NodeIx) {
        self.arena[ix.index()] = Node::free();
        self.arena[ix.index()].sched_link.next = self.free_head;
        self.free_head = Some(ix);
    }

    // -- scheduling --------------------------------------------------

    /// Splice a READY task into the ready ring; requests a switch if
    /// it outranks everything currently runnable.
    pub fn sched_insert(&mut self, task: NodeIx) {
        let became_head = sched::insert(&mut self.arena, self.idle, task);
        let prio = self.task(task).prio;
        ringbuf_entry!(Trace::TaskReady(task, prio));
        if became_head {
            self.request_switch();
        }
    }

    /// Request a context switch at the next safe point — used when a
    /// task *other than the current one* becomes more eligible to
    /// run. Distinct from `switch_now`, which performs the switch
    /// synchronously for the current task's own benefit.
    pub fn request_switch(&mut self) {
        self.pending_switch = true;
        self.port.ctx_switch();
    }

    /// Perform a context switch synchronously — used when the current
    /// task is removing or blocking itself and cannot simply return to
    /// its caller. On real hardware, control returns to the point
    /// `switch_now` was called from only once this task is rescheduled
    /// (the actual save/restore happens transparently via the
    /// architecture's interrupt-return mechanism, driven by
    /// `Port::ctx_switch`/`Port::tsk_flip`); this implementation
    /// performs the equivalent ready-ring bookkeeping and relies on
    /// that same mechanism, so it is exercised end-to-end only under a
    /// real `Port`, not the mock used for host unit tests (see
    /// `waitq`/`timer`/`sched` module tests for the primitives that
    /// *are* hosted-testable in isolation).
    pub fn switch_now(&mut self) {
        self.pending_switch = false;
        self.cur = sched::head(&self.arena, self.idle);
        self.port.set_barrier();
    }

    /// Cooperative yield hint: only actually requests a switch if an
    /// equal-priority peer is waiting behind the current task.
    pub fn ctx_switch(&mut self) {
        if let Some(second) = sched::second_priority(&self.arena, self.idle) {
            if second == self.task(self.cur).prio {
                self.request_switch();
            }
        }
    }

    // -- wait queue orchestration -------------------------------------

    /// The synchronous surface a blocking primitive (`flg::wait`,
    /// `mbox::take`/`give`, `join`, ...) calls once it has decided it
    /// must actually suspend. Moves `task` out of the ready ring, into
    /// the wait queue anchored at `anchor`, and into the timer ring
    /// with the given deadline; then performs the switch. See
    /// `switch_now`'s note on hosted testability.
    pub fn block_on(&mut self, task: NodeIx, anchor: NodeIx, delay: Tick) {
        let now = self.port.time_now();
        sched::remove(&mut self.arena, task);
        waitq::append(&mut self.arena, anchor, task);
        {
            let t = self.task_mut(task);
            t.timer.start = now;
            t.timer.delay = delay;
        }
        timer::insert(&mut self.arena, self.wait, task, self.config.cnt_max);
        if self.config.tickless() {
            self.port.tmr_force();
            if let Some(head) = timer::head(&self.arena, self.wait) {
                let deadline = self.arena[head.index()].as_timer().deadline();
                self.port.tmr_start(deadline);
            }
        }
        ringbuf_entry!(Trace::Block(task, delay));
        self.switch_now();
    }

    /// Wake the head of the wait queue anchored at `anchor`, delivering
    /// `event`; moves it from wait+timer rings back into the ready
    /// ring. Returns the woken task, if the queue was non-empty.
    pub fn one_wakeup(&mut self, anchor: NodeIx, event: Event) -> Option<NodeIx> {
        let head = waitq::head(&self.arena, anchor)?;
        self.wake_task(head, event);
        Some(head)
    }

    /// Wake a specific blocked `task`, wherever it currently sits in
    /// its wait queue — not necessarily the head. Moves it from
    /// wait+timer rings back into the ready ring. Callers that must
    /// wake a particular matching waiter rather than whoever happens
    /// to be queued first (e.g. `flg_give`) use this instead of
    /// `one_wakeup`.
    pub fn wake_task(&mut self, task: NodeIx, event: Event) {
        waitq::unlink(&mut self.arena, task, event);
        timer::remove(&mut self.arena, task);
        self.sched_insert(task);
        ringbuf_entry!(Trace::Wake(task, event));
    }

    /// Wake every waiter on `anchor` with `event` (object `kill`).
    pub fn all_wakeup(&mut self, anchor: NodeIx, event: Event) -> u32 {
        let mut n = 0;
        while self.one_wakeup(anchor, event).is_some() {
            n += 1;
        }
        ringbuf_entry!(Trace::Kill(n));
        n
    }

    // -- timer service -------------------------------------------------

    /// Process expired timer-ring entries. Call this from a periodic
    /// tick interrupt (periodic mode) or from the tickless hardware
    /// alarm's handler; loops until the head is no longer expired,
    /// matching the original's "drain all expirations that have
    /// already happened" behavior rather than handling one per call.
    pub fn tmr_handler(&mut self, now: Tick) {
        loop {
            let Some(head) = timer::head(&self.arena, self.wait) else { break };
            let expired = if self.config.tickless() {
                timer::expired_tickless(&self.arena, head, now)
            } else {
                timer::expired_periodic(&self.arena, head, now)
            };
            if !expired {
                if self.config.tickless() {
                    let deadline = self.arena[head.index()].as_timer().deadline();
                    self.port.tmr_start(deadline);
                }
                break;
            }
            ringbuf_entry!(Trace::TimerExpired(head));

            match timer::pop_expired(&mut self.arena, head, Event::Timeout) {
                Expiry::TaskDelay { node } => {
                    waitq::unlink(&mut self.arena, node, Event::Timeout);
                    self.sched_insert(node);
                }
                Expiry::Timer { node, periodic, callback } => {
                    if let Some(cb) = callback {
                        cb();
                    }
                    self.all_wakeup(node, Event::Success);
                    if periodic {
                        timer::insert(&mut self.arena, self.wait, node, self.config.cnt_max);
                    } else {
                        self.free_node(node);
                    }
                }
            }
        }
        self.accumulate_slice(now);
    }

    /// Round-robin accounting: if the currently running task is the
    /// ready-ring head and its slice has run out, rotate it behind its
    /// equal-priority peers. A no-op when round-robin is disabled or
    /// time-slicing is suppressed by a tickless timer.
    fn accumulate_slice(&mut self, _now: Tick) {
        let Some(slice_len) = self.config.slice_ticks() else { return };
        if self.cur == self.idle {
            return;
        }
        if sched::head(&self.arena, self.idle) != self.cur {
            return;
        }
        let slice = &mut self.task_mut(self.cur).slice;
        *slice += 1;
        if *slice >= slice_len {
            self.task_mut(self.cur).slice = 0;
            let cur = self.cur;
            sched::rotate(&mut self.arena, self.idle, cur);
            self.request_switch();
        }
    }

    // -- priority inheritance hook --------------------------------------

    /// Propagate `task`'s new effective priority through whatever it
    /// is transitively boosting (`mtx_tree`), re-sorting `task` in
    /// whichever ring currently holds it. No mutex object is built on
    /// top of this in this crate (see scope notes); the hook itself is
    /// exercised directly by tests.
    pub fn core_tsk_prio(&mut self, task: NodeIx, prio: Priority) {
        self.task_mut(task).prio = prio;

        if self.task(task).guard.is_some() {
            waitq::resort(&mut self.arena, task);
        } else if self.is_ready(task) {
            sched::remove(&mut self.arena, task);
            self.sched_insert(task);
        }

        if let Some(next) = self.task(task).mtx_tree {
            let boosted = self.task(next).prio.max(prio);
            if boosted != self.task(next).prio {
                self.core_tsk_prio(next, boosted);
            }
        }
    }

    /// `tsk_prio`: set the task's *basic* (configured) priority and
    /// recompute its effective priority. Since this crate implements
    /// no mutex object, "max boosted priority across owned mutexes'
    /// waiter heads" is always just `basic` here — callers that do
    /// build a priority-inheriting mutex on `core_tsk_prio` are
    /// expected to max it in themselves before calling that hook.
    pub fn tsk_prio(&mut self, task: NodeIx, prio: Priority) {
        self.task_mut(task).basic = prio;
        self.core_tsk_prio(task, prio);
    }

    fn is_ready(&self, task: NodeIx) -> bool {
        let mut cursor = ring::head(&self.arena, LinkField::SCHED, self.idle);
        while let Some(c) = cursor {
            if c == task {
                return true;
            }
            let next = ring::next(&self.arena, LinkField::SCHED, c).unwrap();
            cursor = if next == self.idle { None } else { Some(next) };
        }
        false
    }
}
