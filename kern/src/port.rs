//! The architecture/board contract this kernel is built against.
//!
//! Every operation here is something a concrete board support package
//! supplies: interrupt masking, context switching, the tick counter,
//! and (optionally) a tickless hardware one-shot timer. None of it is
//! implemented in this crate; `Kernel` is generic over any `Port` impl
//! and never assumes a particular architecture.

use abi::Tick;

/// RAII guard returned by [`Port::lock`]. Interrupts (or whatever
/// mechanism the board uses to serialize kernel state) are restored
/// when this is dropped. Locks nest: only the outermost guard's drop
/// actually re-enables preemption.
pub trait LockGuard {
    /// Drop the guard, restoring the pre-lock interrupt state. Exists
    /// as an explicit method (in addition to `Drop`) so call sites in
    /// this crate can document exactly where a critical section ends.
    fn release(self);
}

/// The external collaborator every board support package must supply.
///
/// Implementations are expected to be zero-sized or otherwise cheap to
/// construct; `Kernel<N, P>` holds a `P` by value and calls through
/// `&self`/`&mut self` as appropriate, matching a nestable-mask
/// discipline rather than an actual spinlock (this kernel targets a
/// single core).
pub trait Port {
    type Guard: LockGuard;

    /// Mask interrupts (or whatever serializes kernel state) and
    /// return a guard that restores the previous state on drop. Must
    /// nest correctly: locking while already locked is legal and a
    /// no-op until the outermost guard is released.
    fn lock(&self) -> Self::Guard;

    /// Request a context switch at the next safe point — typically
    /// means "set a pending-switch flag the return-from-interrupt
    /// path checks", not an immediate synchronous switch. See
    /// `Kernel::request_switch`.
    fn ctx_switch(&self);

    /// Memory/instruction barrier, issued by the outermost unlock
    /// before interrupts are re-enabled.
    fn set_barrier(&self);

    /// Fabricate an initial register frame on `[stack_base, stack_base
    /// + stack_size)` such that the first restore of this stack
    /// pointer calls `entry`. Returns the initial saved stack pointer.
    fn ctx_init(&self, stack_base: usize, stack_size: usize, entry: usize) -> usize;

    /// Resume execution immediately on the stack pointed to by
    /// `new_sp`, as if freshly initialized by `ctx_init`. Used by
    /// `tsk_flip`; never returns to its caller.
    fn tsk_flip(&self, new_sp: usize) -> !;

    /// Free-running tick counter, wrapping silently.
    fn time_now(&self) -> Tick;

    /// Disarm the tickless hardware timer, if present.
    fn tmr_force(&self);

    /// Arm the tickless hardware timer to fire at absolute deadline
    /// `at`. Only called when `HW_TIMER_SIZE > 0`.
    fn tmr_start(&self, at: Tick);

    /// Disarm the tickless hardware timer without re-arming.
    fn tmr_stop(&self);

    /// True iff called from interrupt/exception context.
    fn isr_context(&self) -> bool;

    /// Wait for an interrupt (low-power idle). Invoked only by the
    /// IDLE task's body.
    fn idle_wait(&self);
}
