//! Task lifecycle: creation, start/stop, kill, join/detach, yield,
//! flip, suspend/resume — everything in §4.4 that isn't itself the
//! wait-queue or timer machinery those operations are built from.

use abi::{Event, Priority, Tick};

use crate::arena::{BlockScratch, Body, Join, NodeIx, TaskBody, TaskEntry};
use crate::kernel::Kernel;
use crate::port::Port;
use crate::sched;
use crate::waitq;

/// Why a creation call failed. The arena has no allocator to fall
/// back on, so exhaustion is the only way `init` can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Full;

impl<const N: usize, P: Port> Kernel<N, P> {
    /// Create a new task at `prio` running `entry` on
    /// `[stack_base, stack_base + stack_size)`, and insert it READY.
    /// Mirrors `tsk_init` + the immediately-following `core_tsk_insert`
    /// — this rewrite has no separate "stopped, not yet started"
    /// construction step; `init` always starts the task, matching the
    /// teacher's eager-start convention for statically-declared tasks.
    pub fn task_init(
        &mut self,
        prio: Priority,
        entry: TaskEntry,
        stack_base: usize,
        stack_size: usize,
    ) -> Result<NodeIx, Full> {
        let ix = self.alloc_node().ok_or(Full)?;
        let entry_addr = entry as usize;
        let sp = self.port().ctx_init(stack_base, stack_size, entry_addr);
        {
            let arena = self.arena_mut();
            arena[ix.index()].body = Body::Task(TaskBody::with_entry(prio, stack_base, stack_size, entry));
            arena[ix.index()].as_task_mut().sp = sp;
        }
        self.sched_insert(ix);
        Ok(ix)
    }

    /// `start`/`startFrom`: only meaningful for a `STOPPED` task — one
    /// that was killed or stopped itself but not yet freed because a
    /// joiner is still expected. Re-initializes its context and
    /// re-inserts it READY. `new_entry` overrides the entry point when
    /// given, implementing `startFrom`.
    pub fn task_start(&mut self, task: NodeIx, new_entry: Option<TaskEntry>) {
        if !self.is_stopped(task) {
            return;
        }
        let (stack_base, stack_size, entry) = {
            let t = self.task(task);
            (t.stack_base, t.stack_size, new_entry.unwrap_or(t.entry))
        };
        let sp = self.port().ctx_init(stack_base, stack_size, entry as usize);
        let t = self.task_mut(task);
        t.entry = entry;
        t.sp = sp;
        t.slice = 0;
        self.sched_insert(task);
    }

    /// `stop`: the running task removes itself from the ready ring for
    /// good. Wakes a waiting joiner with `Success`, or frees the slot
    /// immediately if detached.
    pub fn task_stop(&mut self, task: NodeIx) {
        self.finish(task, Event::Success);
        sched::remove(self.arena_mut(), task);
        self.mark_stopped(task);
    }

    /// `kill`: forcibly stop any task regardless of its current state,
    /// delivering `Stopped` to its joiner (or freeing it) and removing
    /// it from whichever structure currently holds it.
    pub fn task_kill(&mut self, task: NodeIx) {
        if self.is_stopped(task) {
            return;
        }
        self.finish(task, Event::Stopped);

        if self.task(task).guard.is_some() {
            waitq::unlink(self.arena_mut(), task, Event::Stopped);
            crate::timer::remove(self.arena_mut(), task);
        } else {
            sched::remove(self.arena_mut(), task);
        }
        self.mark_stopped(task);
    }

    /// Shared `stop`/`kill` tail: resolve the join contract.
    fn finish(&mut self, task: NodeIx, event: Event) {
        match self.task(task).join {
            Join::Waiting(anchor) => {
                self.one_wakeup(anchor, event);
            }
            Join::Detached => {
                self.free_node(task);
            }
            Join::Joinable => {
                // No one is waiting yet; a later `join` call will see
                // `STOPPED` immediately and return `Success` without
                // blocking, per the join table below.
            }
        }
    }

    fn mark_stopped(&mut self, task: NodeIx) {
        if let Body::Task(t) = &mut self.arena_mut()[task.index()].body {
            t.join = match t.join {
                Join::Detached => Join::Detached,
                _ => Join::Joinable,
            };
        }
        // A STOPPED-but-not-freed task is simply absent from every
        // ring: not READY (removed above), not in `Timers` (removed
        // above if it was DELAYED), and not linked into any wait
        // queue. `is_stopped` below recognizes exactly that state.
    }

    fn is_stopped(&self, task: NodeIx) -> bool {
        let t = self.task(task);
        t.guard.is_none() && !self.is_in_ready_or_timers(task)
    }

    /// Whether `task` is linked into the ready ring or the timer ring
    /// right now — i.e. not blocked on any wait queue and not
    /// `STOPPED`. Cheap introspection, not part of any hot path.
    ///
    /// `block_on` links every blocked task into the timer ring too (to
    /// track its timeout), so `sched_link` alone can't distinguish
    /// READY from DELAYED-and-still-waiting; `guard` is `Some` only
    /// while actually queued on some object, so it's what separates
    /// the two.
    pub fn is_in_ready_or_timers(&self, task: NodeIx) -> bool {
        self.arena()[task.index()].sched_link.is_linked() && self.task(task).guard.is_none()
    }

    /// `detach`: give up the right to `join` this task. Wakes any
    /// already-blocked joiner with `Timeout` (its `join` call fails,
    /// matching "detach raced a join"), then marks the task detached
    /// so a future `stop`/`kill` frees it immediately instead of
    /// waiting for a joiner.
    pub fn task_detach(&mut self, task: NodeIx) -> Event {
        match self.task(task).join {
            Join::Waiting(anchor) => {
                self.one_wakeup(anchor, Event::Timeout);
                self.task_mut(task).join = Join::Detached;
                Event::Success
            }
            Join::Joinable => {
                self.task_mut(task).join = Join::Detached;
                Event::Success
            }
            Join::Detached => Event::Timeout,
        }
    }

    /// `join`: block the calling task until `target` stops, or return
    /// immediately if it already has. Only one joiner may be blocked
    /// at a time per task (`Join::Waiting` holds a single anchor).
    pub fn task_join(&mut self, joiner: NodeIx, target: NodeIx, join_anchor: NodeIx) -> Event {
        match self.task(target).join {
            Join::Detached => Event::Timeout,
            Join::Waiting(_) => Event::Timeout,
            Join::Joinable if self.is_stopped(target) => Event::Success,
            Join::Joinable => {
                self.task_mut(target).join = Join::Waiting(join_anchor);
                self.block_on(joiner, join_anchor, abi::INFINITE);
                self.task_event(joiner)
            }
        }
    }

    /// `yield`: cooperative context switch, giving equal-priority peers
    /// a turn. Does not remove the task from the ready ring.
    pub fn task_yield(&mut self) {
        self.ctx_switch();
    }

    /// `flip`: replace the current task's entry point and restart it
    /// on a fresh stack. Never returns — on real hardware `Port::
    /// tsk_flip` hands control directly to the new entry point, so any
    /// cleanup the caller needs must happen before calling this.
    pub fn task_flip(&mut self, task: NodeIx, new_entry: TaskEntry) -> ! {
        let (stack_base, stack_size) = {
            let t = self.task(task);
            (t.stack_base, t.stack_size)
        };
        self.task_mut(task).entry = new_entry;
        let new_sp = self.port().ctx_init(stack_base, stack_size, new_entry as usize);
        self.port().tsk_flip(new_sp)
    }

    /// `suspend`: move the calling task onto the dedicated
    /// suspend queue with an infinite timeout; only an explicit
    /// `resume` (or `kill`) can bring it back.
    pub fn task_suspend(&mut self, task: NodeIx) {
        let anchor = self.suspend_anchor();
        self.block_on(task, anchor, abi::INFINITE);
    }

    /// `resume`: wake a task from the suspend queue specifically —
    /// fails (`Timeout`) if the task isn't actually suspended there,
    /// distinguishing it from an ordinary timed wait on some other
    /// object with `INFINITE` also set.
    pub fn task_resume(&mut self, task: NodeIx) -> Event {
        let anchor = self.suspend_anchor();
        if self.task(task).guard == Some(anchor) && self.task(task).timer.delay == abi::INFINITE {
            self.one_wakeup(anchor, Event::Success);
            Event::Success
        } else {
            Event::Timeout
        }
    }

    /// `tsk_waitFor`: block on `anchor` for up to `delay` ticks, first
    /// staging `scratch` so whatever posts to this queue (flag give,
    /// mailbox give/take) knows what the task is waiting for.
    pub fn task_wait_for(
        &mut self,
        task: NodeIx,
        anchor: NodeIx,
        delay: Tick,
        scratch: BlockScratch,
    ) -> Event {
        if delay == abi::IMMEDIATE {
            return Event::Timeout;
        }
        self.task_mut(task).scratch = scratch;
        self.block_on(task, anchor, delay);
        self.task_event(task)
    }

    /// `tsk_waitUntil`: as `task_wait_for`, but `deadline` is an
    /// absolute tick value. Converts to a relative delay via unsigned
    /// modular subtraction from `now`; a deadline more than
    /// `cnt_max / 2` ticks "in the past" (including already elapsed)
    /// is treated as already expired.
    pub fn task_wait_until(
        &mut self,
        task: NodeIx,
        anchor: NodeIx,
        deadline: Tick,
        scratch: BlockScratch,
        cnt_max: Tick,
    ) -> Event {
        let now = self.port().time_now();
        let delay = deadline.wrapping_sub(now);
        if delay == 0 || delay > cnt_max / 2 {
            return Event::Timeout;
        }
        self.task_wait_for(task, anchor, delay, scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mock::MockPort;

    fn cfg() -> Config {
        Config { frequency: 1000, robin: 0, hw_timer_size: 0, cnt_max: Tick::MAX / 2 }
    }

    fn dummy() -> ! {
        panic!("test task body should never actually run")
    }

    #[test]
    fn init_inserts_ready_and_kill_frees_detached_task() {
        let mut k: Kernel<8, MockPort> =
            Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
        let t = k.task_init(Priority::new(3), dummy, 0x1000, 256).unwrap();
        assert!(k.is_in_ready_or_timers(t));

        k.task_detach(t);
        k.task_kill(t);
        assert!(!k.is_in_ready_or_timers(t));
    }

    #[test]
    fn join_returns_success_immediately_if_already_stopped() {
        let mut k: Kernel<8, MockPort> =
            Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
        let t = k.task_init(Priority::new(3), dummy, 0x1000, 256).unwrap();
        k.task_kill(t);
        assert!(k.is_stopped(t));

        let anchor = k.alloc_node().unwrap();
        crate::ring::init_anchor(k.arena_mut(), crate::ring::LinkField::WAIT, anchor);
        let joiner = k.idle();
        assert_eq!(k.task_join(joiner, t, anchor), Event::Success);
    }

    #[test]
    fn resume_fails_for_a_task_not_suspended() {
        let mut k: Kernel<8, MockPort> =
            Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
        let t = k.task_init(Priority::new(3), dummy, 0x1000, 256).unwrap();
        assert_eq!(k.task_resume(t), Event::Timeout);
    }
}
