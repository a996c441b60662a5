//! Compile-time-ish kernel configuration.
//!
//! The node arena's *capacity* is a const generic parameter on
//! [`crate::kernel::Kernel`] rather than an associated constant on a
//! config trait: stable Rust cannot use a trait's associated `const`
//! as an array length (`[Node; C::MAX_NODES]` needs
//! `generic_const_exprs`, which is not available outside nightly).
//! Everything that *isn't* an array bound — tick frequency, round-
//! robin slice count, tickless-timer capability, the modular-
//! arithmetic wraparound bound — lives here instead, as a plain
//! runtime value a host crate constructs once and hands to `Kernel`.
use abi::Tick;

/// Scalar tunables a host crate picks for its board and workload.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Tick frequency, in Hz, of whatever drives `Port::time_now`.
    /// Used together with `robin` to compute the round-robin slice
    /// length in ticks.
    pub frequency: u32,
    /// Number of time slices per second a round-robin task gets
    /// before being rotated behind its equal-priority peers. `0`
    /// disables round-robin entirely (a task runs until it blocks,
    /// yields, or is preempted by higher priority).
    pub robin: u32,
    /// Depth of the tickless hardware timer's event horizon. `0`
    /// selects periodic-tick mode: `Kernel::tmr_handler` is expected
    /// to be driven from a fixed-period tick interrupt rather than a
    /// reprogrammable one-shot.
    pub hw_timer_size: usize,
    /// Upper bound (in ticks) past which a deadline is treated as
    /// already elapsed rather than "far in the future, modularly
    /// wrapped". Must be at most `Tick::MAX / 2` for the modular
    /// comparisons in `timer` to be unambiguous.
    pub cnt_max: Tick,
}

impl Config {
    /// Ticks per round-robin slice, or `None` if round-robin is
    /// disabled (`robin == 0`) or time-slicing is disabled because a
    /// tickless hardware timer drives ticks at non-fixed intervals
    /// (`hw_timer_size > 0`).
    pub fn slice_ticks(&self) -> Option<u32> {
        if self.robin == 0 || self.hw_timer_size > 0 {
            None
        } else {
            Some((self.frequency / self.robin).max(1))
        }
    }

    pub const fn tickless(&self) -> bool {
        self.hw_timer_size > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robin_zero_disables_slicing() {
        let c = Config { frequency: 1000, robin: 0, hw_timer_size: 0, cnt_max: Tick::MAX / 2 };
        assert_eq!(c.slice_ticks(), None);
    }

    #[test]
    fn tickless_disables_slicing_regardless_of_robin() {
        let c = Config { frequency: 1000, robin: 10, hw_timer_size: 4, cnt_max: Tick::MAX / 2 };
        assert!(c.tickless());
        assert_eq!(c.slice_ticks(), None);
    }

    #[test]
    fn computes_slice_length() {
        let c = Config { frequency: 1000, robin: 10, hw_timer_size: 0, cnt_max: Tick::MAX / 2 };
        assert_eq!(c.slice_ticks(), Some(100));
    }
}
