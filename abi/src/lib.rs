//! Wire types shared between the kernel and anything that talks to it.
//!
//! This crate has no dependency on the kernel's internal data structures
//! (the node arena, the rings, ...); it only defines the vocabulary that
//! crosses the kernel/task boundary: priorities, time, completion events
//! and the event-flag mode bits.

#![no_std]

use bitflags::bitflags;
use core::fmt;

/// A tick count. Ticks are the kernel's only unit of time; what a tick
/// means in wall-clock terms is a property of the `Port` driving the
/// kernel, not of the kernel itself.
pub type Tick = u32;

/// Non-blocking: check the condition and return immediately regardless
/// of outcome.
pub const IMMEDIATE: Tick = 0;

/// Block with no timeout; only an explicit wakeup or a `kill` can end
/// the wait.
pub const INFINITE: Tick = Tick::MAX;

/// Task and event-flag priority.
///
/// Unlike the interrupt-vector priorities used elsewhere in embedded
/// Rust, *larger is more important* here: priority 0 is the least
/// urgent value a task can hold. This matches the ordering used
/// throughout the scheduler and wait-queue insertion logic and is the
/// opposite of hardware NVIC convention, which is easy to trip over
/// when porting driver code that assumes "lower number wins".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u8);

impl Priority {
    /// Priority reserved for the idle task. No user task may run at
    /// this priority; it is always the least important runnable task
    /// in the system.
    pub const IDLE: Priority = Priority(0);

    pub const fn new(level: u8) -> Self {
        Priority(level)
    }

    pub const fn level(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a blocking operation.
///
/// Every wait path in the kernel (delay, wait queue, event flag,
/// mailbox) resolves to exactly one of these three outcomes. There is
/// no separate "error" channel: a timed-out wait and a successful wait
/// are both ordinary, expected results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// The operation was satisfied before its deadline (or
    /// immediately, for a non-blocking call).
    Success,
    /// The deadline passed with the operation unsatisfied.
    Timeout,
    /// The object the task was waiting on was torn down out from
    /// under it (killed or deleted) while it was blocked.
    Stopped,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Event::Success => "success",
            Event::Timeout => "timeout",
            Event::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

impl Event {
    pub const fn is_success(self) -> bool {
        matches!(self, Event::Success)
    }
}

bitflags! {
    /// Matching and side-effect mode for an event-flag wait.
    ///
    /// Two independent axes. Matching: `ALL` selects AND matching
    /// (every requested bit must be set); its absence selects OR
    /// matching (`ANY`, the default — any one requested bit suffices).
    /// Consumption: `ACCEPT` filters the requested bits down to those
    /// not already set at call time, so a wait only blocks on what's
    /// still missing; `PROTECT` leaves matched bits set in the flag
    /// afterward instead of clearing them (sticky signal).
    #[derive(Default)]
    pub struct FlgMode: u8 {
        /// Match if *any* requested bit is set (logical OR). Present
        /// only for symmetry with `ALL`; it is the all-zero default.
        const ANY     = 0b0000_0000;
        /// Match only if *all* requested bits are set (logical AND).
        const ALL     = 0b0000_0001;
        /// At call time, drop already-set bits from the requested set
        /// before matching or blocking.
        const ACCEPT  = 0b0000_0010;
        /// Leave matched bits set instead of clearing them.
        const PROTECT = 0b0000_0100;
    }
}

impl FlgMode {
    pub const fn is_all(self) -> bool {
        self.contains(FlgMode::ALL)
    }

    pub const fn is_accept(self) -> bool {
        self.contains(FlgMode::ACCEPT)
    }

    pub const fn is_protect(self) -> bool {
        self.contains(FlgMode::PROTECT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_larger_is_more_important() {
        assert!(Priority(3) > Priority(1));
        assert!(Priority::IDLE < Priority(1));
    }

    #[test]
    fn flgmode_default_is_any_non_sticky() {
        let m = FlgMode::default();
        assert!(!m.is_all());
        assert!(!m.is_accept());
        assert!(!m.is_protect());
    }

    #[test]
    fn event_is_success_only_for_success() {
        assert!(Event::Success.is_success());
        assert!(!Event::Timeout.is_success());
        assert!(!Event::Stopped.is_success());
    }
}
