//! Structured trace points, in the same house style Hubris drivers use
//! for `ringbuf!`/`ringbuf_entry!` — a no_std, allocation-free
//! substitute for `log`/`tracing` that records into a fixed-depth ring
//! instead of printing.

use abi::{Event, Priority};

use crate::arena::NodeIx;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trace {
    None,
    /// A task was spliced into the ready ring at the given priority.
    TaskReady(NodeIx, Priority),
    /// The outgoing and incoming task of a context switch.
    Switch(NodeIx, NodeIx),
    /// A task blocked on a wait queue with the given timeout.
    Block(NodeIx, abi::Tick),
    /// A blocked task was woken with the given outcome.
    Wake(NodeIx, Event),
    /// A timer (user timer or task delay) expired.
    TimerExpired(NodeIx),
    /// An object was killed, broadcasting `Stopped` to this many
    /// waiters.
    Kill(u32),
}

ringbuf::ringbuf!(Trace, 32, Trace::None);
