//! The scheduling and synchronization core of a small preemptive
//! real-time kernel for single-core microcontrollers: fixed-priority
//! preemptive scheduling with round-robin among equals, a unified
//! tick/delay timer service, a reusable priority-ordered wait-queue
//! primitive, event flags, and a bounded mailbox.
//!
//! This crate owns none of the hardware: everything architecture- or
//! board-specific (context switching, the tick source, interrupt
//! masking) is the [`port::Port`] trait, supplied by a host crate.
//! Everything else — the node arena, the ready/timer/wait rings, the
//! object types built on top of them — lives here and has no
//! allocator dependency: capacity is fixed at `Kernel` construction via
//! a const generic.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod arena;
pub mod config;
pub mod flg;
pub mod kernel;
pub mod mbox;
pub mod port;
pub mod ring;
pub mod sched;
pub mod task;
pub mod timer;
pub mod trace;
pub mod waitq;

pub use abi::{Event, FlgMode, Priority, Tick, IMMEDIATE, INFINITE};
pub use config::Config;
pub use flg::Flg;
pub use kernel::{CapacityError, Kernel};
pub use mbox::Mailbox;
pub use task::Full;

/// Test-only support shared across every module's `#[cfg(test)]` unit
/// tests, and re-exposed under `test-util` so the integration tests in
/// `tests/` can reach it too: a [`port::Port`] impl that needs no real
/// hardware.
#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use core::cell::Cell;

    use abi::Tick;

    use crate::port::{LockGuard, Port};

    pub struct MockGuard;

    impl LockGuard for MockGuard {
        fn release(self) {}
    }

    /// A `Port` with a manually-advanced virtual clock and recording
    /// stubs for everything else. Good enough to drive `Kernel`'s
    /// hosted-testable primitives (`block_on`, `one_wakeup`,
    /// `tmr_handler`, ...) directly; `switch_now`/`tsk_flip` rely on a
    /// real architecture's interrupt-return path and are not exercised
    /// through this mock — see the note on `Kernel::switch_now`.
    pub struct MockPort {
        now: Cell<Tick>,
        switch_requested: Cell<bool>,
        armed: Cell<Option<Tick>>,
    }

    impl MockPort {
        pub fn new() -> Self {
            MockPort { now: Cell::new(0), switch_requested: Cell::new(false), armed: Cell::new(None) }
        }

        pub fn set_now(&self, t: Tick) {
            self.now.set(t);
        }

        pub fn switch_was_requested(&self) -> bool {
            self.switch_requested.get()
        }
    }

    impl Default for MockPort {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Port for MockPort {
        type Guard = MockGuard;

        fn lock(&self) -> Self::Guard {
            MockGuard
        }

        fn ctx_switch(&self) {
            self.switch_requested.set(true);
        }

        fn set_barrier(&self) {}

        fn ctx_init(&self, stack_base: usize, stack_size: usize, _entry: usize) -> usize {
            stack_base + stack_size
        }

        fn tsk_flip(&self, _new_sp: usize) -> ! {
            panic!("tsk_flip requires a real architecture's interrupt-return path")
        }

        fn time_now(&self) -> Tick {
            self.now.get()
        }

        fn tmr_force(&self) {
            self.armed.set(None);
        }

        fn tmr_start(&self, at: Tick) {
            self.armed.set(Some(at));
        }

        fn tmr_stop(&self) {
            self.armed.set(None);
        }

        fn isr_context(&self) -> bool {
            false
        }

        fn idle_wait(&self) {}
    }
}
