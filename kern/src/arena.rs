//! The node arena backing every schedulable and timed entity.
//!
//! A single `[Node; N]` array replaces the struct-prefix aliasing the
//! original kernel used to let one list node stand for "task blocked
//! on a timer" or "timer ring entry" interchangeably. Here the
//! discriminant of the [`Body`] enum plays the role the original's
//! `id` field played, and [`NodeIx`] indices take the place of raw
//! intrusive pointers.

use abi::{Event, Priority, Tick};
use core::num::NonZeroU32;

/// Index into a [`Kernel`](crate::kernel::Kernel)'s node arena.
///
/// Backed by `NonZeroU32` so `Option<NodeIx>` costs nothing extra over
/// a bare `NodeIx` — the same trick `TaskId`/handle types use
/// throughout this dependency stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIx(NonZeroU32);

impl NodeIx {
    /// Construct from a zero-based arena slot. Panics if `index` does
    /// not fit (never happens for any arena this crate can build,
    /// since arena size is bounded by a `u32`-representable const
    /// generic).
    pub fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index + 1).expect("arena index out of range");
        NodeIx(NonZeroU32::new(raw).expect("index + 1 is never zero"))
    }

    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// A ring-membership link: predecessor and successor slots. `None` in
/// both fields means "not currently linked into any ring of this
/// kind".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Link {
    pub prev: Option<NodeIx>,
    pub next: Option<NodeIx>,
}

impl Link {
    pub const fn unlinked() -> Self {
        Link { prev: None, next: None }
    }

    pub fn is_linked(&self) -> bool {
        self.prev.is_some() || self.next.is_some()
    }
}

/// Callback run by the timer service when a user timer (not a
/// `DELAYED` task) expires. Plain function pointer: this crate has no
/// allocator, so there is nowhere to box a closure's captures.
pub type TimerCallback = fn();

/// Fields shared by user timers and the `DELAYED` state of a task —
/// the payload the original's `Tmr` header carried.
#[derive(Clone, Copy, Debug)]
pub struct TimerBody {
    /// Tick at which the delay started counting.
    pub start: Tick,
    /// Relative delay from `start`. `abi::INFINITE` means "never".
    pub delay: Tick,
    /// Reload value used when a *periodic* user timer re-arms itself.
    /// Unused (left at 0) for a task's embedded timer fields.
    pub period: Tick,
    pub callback: Option<TimerCallback>,
    /// Outcome delivered to whoever is waiting on this deadline.
    pub event: Event,
}

impl TimerBody {
    pub const fn new() -> Self {
        TimerBody {
            start: 0,
            delay: abi::INFINITE,
            period: 0,
            callback: None,
            event: Event::Success,
        }
    }

    /// Absolute deadline in tick-space, subject to wraparound — always
    /// compare deadlines with unsigned modular arithmetic, never by
    /// plain `<`.
    pub fn deadline(&self) -> Tick {
        self.start.wrapping_add(self.delay)
    }
}

impl Default for TimerBody {
    fn default() -> Self {
        Self::new()
    }
}

/// `join` field states, mirroring the original's
/// `{JOINABLE, DETACHED, or task-pointer sentinel}` tri-state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Join {
    /// No one has called `join` yet; a future `join` will block here.
    Joinable,
    /// `detach` was called; `stop`/`kill` will free storage directly
    /// instead of waiting for a joiner.
    Detached,
    /// A task is already blocked on `join`, anchored at this wait
    /// queue's anchor node.
    Waiting(NodeIx),
}

/// Largest message a mailbox can carry through [`BlockScratch`]. The
/// original let a blocked sender's data pointer dangle into its own
/// stack frame across the wait; this crate has no coroutine stack to
/// point into, so a blocked take/give instead copies its message into
/// this fixed-size inline buffer and back out again on wake.
pub const MAX_MSG_BYTES: usize = 32;

/// Per-block scratch, staged by a blocking call before it suspends and
/// read back by whatever posts to wake it. Corresponds to the
/// original's `tmp` union.
#[derive(Clone, Copy, Debug)]
pub enum BlockScratch {
    None,
    /// Event-flag wait: bits requested and the AND/OR/ACCEPT/PROTECT
    /// mode governing the match.
    Flags { mask: u32, mode: abi::FlgMode },
    /// Mailbox `take`/`wait-take`: filled in by the `give` side once a
    /// message is handed directly to this waiting task; empty until
    /// then.
    MailboxTake { bytes: [u8; MAX_MSG_BYTES], len: usize },
    /// Mailbox `give`/`wait-send`: the message this task is waiting to
    /// deposit, copied in by the caller before blocking and read back
    /// out by whichever `take` frees a slot for it.
    MailboxGive { bytes: [u8; MAX_MSG_BYTES], len: usize },
}

impl Default for BlockScratch {
    fn default() -> Self {
        BlockScratch::None
    }
}

/// A task's entry point. A plain function pointer, not a boxed
/// closure — this crate has no allocator to store captures in, so a
/// task body gets no arguments; whatever state it needs it reaches
/// through the same external singleton its host crate already arranges
/// `Port` through.
pub type TaskEntry = fn() -> !;

/// The task-specific payload of a [`Node`].
#[derive(Clone, Copy, Debug)]
pub struct TaskBody {
    /// Embedded timer fields, used directly when this task's `id` is
    /// `Delayed` (inserted into the timer ring) — the rewrite's
    /// replacement for aliasing `Task` on top of `Tmr`.
    pub timer: TimerBody,
    /// Opaque saved stack pointer, meaningful only to `Port`.
    pub sp: usize,
    pub stack_base: usize,
    pub stack_size: usize,
    pub entry: TaskEntry,
    /// Configured ("basic") priority, set by `tsk_prio`/`init`.
    pub basic: Priority,
    /// Effective priority, possibly boosted above `basic` by the
    /// priority-inheritance hook.
    pub prio: Priority,
    /// Round-robin slice counter, reset on preemption or rotation.
    pub slice: u32,
    pub join: Join,
    /// Wait-queue anchor this task is currently linked under, if any.
    /// `Some` exactly when this task is blocked on some object.
    pub guard: Option<NodeIx>,
    /// Transitive priority-boost target: the task this one is
    /// propagating an inherited priority into, via `mtx.tree` in the
    /// original. No mutex object is implemented in this crate (see
    /// scope notes), but the field and the hook that walks it are.
    pub mtx_tree: Option<NodeIx>,
    pub scratch: BlockScratch,
}

fn no_entry() -> ! {
    panic!("idle/sentinel task has no body of its own")
}

impl TaskBody {
    pub const fn new(prio: Priority, stack_base: usize, stack_size: usize) -> Self {
        Self::with_entry(prio, stack_base, stack_size, no_entry)
    }

    pub const fn with_entry(
        prio: Priority,
        stack_base: usize,
        stack_size: usize,
        entry: TaskEntry,
    ) -> Self {
        TaskBody {
            timer: TimerBody::new(),
            sp: 0,
            stack_base,
            stack_size,
            entry,
            basic: prio,
            prio,
            slice: 0,
            join: Join::Joinable,
            guard: None,
            mtx_tree: None,
            scratch: BlockScratch::None,
        }
    }
}

/// The tagged payload carried by an arena [`Node`]. The discriminant
/// takes over the role the original's `id` field played when
/// distinguishing what a ring node actually was.
#[derive(Clone, Copy, Debug)]
pub enum Body {
    /// Slot is on the free list, not representing anything live.
    Free,
    /// A schedulable task, in any of its lifecycle states.
    Task(TaskBody),
    /// A free-standing user timer (not a task's embedded delay).
    Timer(TimerBody),
    /// A wait-queue anchor: carries no payload of its own. Every
    /// synchronization object (and the ready ring, and the timer
    /// ring) owns exactly one anchor node so that `ring::insert`/
    /// `ring::remove` has a uniform, always-present sentinel to work
    /// against — this is the rewrite's answer to the original's
    /// "external head pointer patched by `back`" technique, chosen so
    /// every ring in the kernel (ready, timers, and every wait queue)
    /// is insertable/removable through one code path.
    Anchor,
}

/// One slot of the kernel's node arena: a tagged body plus the two
/// independent ring links a node may need simultaneously. A `DELAYED`
/// task, for instance, is linked into the timer ring via `sched_link`
/// *and* into the object it is waiting on via `wait_link` at the same
/// time — two distinct memberships, hence two distinct link fields
/// rather than one shared with the original's single `prev`/`next`.
#[derive(Clone, Copy, Debug)]
pub struct Node {
    pub body: Body,
    /// Ready-ring or timer-ring membership (mutually exclusive).
    pub sched_link: Link,
    /// Wait-queue membership, orthogonal to `sched_link`.
    pub wait_link: Link,
}

impl Node {
    pub const fn free() -> Self {
        Node {
            body: Body::Free,
            sched_link: Link::unlinked(),
            wait_link: Link::unlinked(),
        }
    }

    pub const fn anchor() -> Self {
        Node {
            body: Body::Anchor,
            sched_link: Link::unlinked(),
            wait_link: Link::unlinked(),
        }
    }

    pub fn as_task(&self) -> &TaskBody {
        match &self.body {
            Body::Task(t) => t,
            _ => panic!("node is not a task"),
        }
    }

    pub fn as_task_mut(&mut self) -> &mut TaskBody {
        match &mut self.body {
            Body::Task(t) => t,
            _ => panic!("node is not a task"),
        }
    }

    pub fn as_timer(&self) -> &TimerBody {
        match &self.body {
            Body::Timer(t) => t,
            Body::Task(t) => &t.timer,
            _ => panic!("node is not a timer"),
        }
    }

    pub fn as_timer_mut(&mut self) -> &mut TimerBody {
        match &mut self.body {
            Body::Timer(t) => t,
            Body::Task(t) => &mut t.timer,
            _ => panic!("node is not a timer"),
        }
    }

    pub fn is_task(&self) -> bool {
        matches!(self.body, Body::Task(_))
    }
}
