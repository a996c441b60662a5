//! Event flags: an object-wide bitmask that tasks wait on in AND/OR
//! combination, with ACCEPT (filter out already-set bits before
//! matching) and PROTECT (leave matched bits set after consuming)
//! wait-time modifiers.
//!
//! Grounded directly on the original's flag algorithm: the tricky part
//! is that `give` walks the wait queue once per call, and a task it
//! wakes partway through can be unlinked out from under the very ring
//! the walk is iterating, so the next cursor is always fetched before
//! deciding whether to wake.

use abi::{Event, FlgMode, Tick};

use crate::arena::{BlockScratch, NodeIx};
use crate::kernel::Kernel;
use crate::port::Port;
use crate::ring::{self, LinkField};
use crate::task::Full;
use crate::waitq;

/// An event-flag object. `flags` is the live bitmask; `mask` is set
/// once at creation and never changes — a 1 bit there survives every
/// `give`'s consume step regardless of any waiter's mode, matching the
/// original's object-level sticky mask. `PROTECT`, by contrast, is a
/// per-wait mode bit (see [`abi::FlgMode`]) that protects only the
/// bits *that particular waiter* matched on, layered on top of the
/// object-level `mask` as an enrichment the distilled interface calls
/// for but the original's single `mask` field can't express alone.
pub struct Flg {
    anchor: NodeIx,
    pub flags: u32,
    pub mask: u32,
}

impl<const N: usize, P: Port> Kernel<N, P> {
    /// `flg_create`/`flg_init`: allocate a fresh event-flag object with
    /// its bits all clear and `mask` fixed for its lifetime.
    pub fn flg_create(&mut self, mask: u32) -> Result<Flg, Full> {
        let anchor = self.alloc_node().ok_or(Full)?;
        self.arena_mut()[anchor.index()].body = crate::arena::Body::Anchor;
        ring::init_anchor(self.arena_mut(), LinkField::WAIT, anchor);
        Ok(Flg { anchor, flags: 0, mask })
    }

    /// `flg_waitFor`-family: block `task` until `flags` matches
    /// `flg` under `mode`, or `delay` ticks pass. Returns immediately
    /// (without blocking) if the match is already satisfied.
    ///
    /// `ACCEPT` drops bits from `flags` that are already set in `flg`
    /// before anything else happens, so a wait only ever blocks on
    /// what's still missing. Whether the (possibly filtered) result is
    /// considered a match depends on `mode`: `ALL` requires every
    /// remaining bit to eventually be given; plain `OR` matches as
    /// soon as any one of the original `flags` arrives — which, for a
    /// non-accept wait, is exactly "some bit was already set", hence
    /// the `remaining == flags` check below (if accept-filtering
    /// changed nothing, nothing was already set).
    pub fn flg_wait(
        &mut self,
        task: NodeIx,
        flg: &mut Flg,
        flags: u32,
        mode: FlgMode,
        delay: Tick,
    ) -> Event {
        let remaining = if mode.is_accept() { flags & !flg.flags } else { flags };
        flg.flags &= !flags | flg.mask;
        let blocks = remaining != 0 && (mode.is_all() || remaining == flags);
        if !blocks {
            return Event::Success;
        }
        self.task_wait_for(task, flg.anchor, delay, BlockScratch::Flags { mask: remaining, mode })
    }

    /// `flg_give`/`flg_set`: OR `flags` into the object, then walk its
    /// wait queue once, waking every task whose outstanding bits are
    /// now satisfied. A task that partially matches under `ALL` mode
    /// stays queued with its scratch narrowed to just the bits still
    /// missing.
    pub fn flg_give(&mut self, flg: &mut Flg, flags: u32) {
        flg.flags |= flags;

        let mut cursor = waitq::head(self.arena(), flg.anchor);
        while let Some(task) = cursor {
            // Fetch the next cursor before anything below can unlink
            // `task` out of this ring.
            let next = ring::next(self.arena(), LinkField::WAIT, task).expect("ring always linked");
            cursor = if next == flg.anchor { None } else { Some(next) };

            let BlockScratch::Flags { mask, mode } = self.task(task).scratch else {
                continue;
            };
            if mask & flags == 0 {
                continue;
            }

            let protected = if mode.is_protect() { mask & flags } else { 0 };
            flg.flags &= !mask | flg.mask | protected;

            let remaining = mask & !flags;
            if remaining != 0 && mode.is_all() {
                self.task_mut(task).scratch = BlockScratch::Flags { mask: remaining, mode };
                continue;
            }
            self.wake_task(task, Event::Success);
        }
    }

    /// `flg_kill`: wake every waiter with `Stopped`. Unlike `give`,
    /// this does not touch `flg.flags` — the object's bits are left as
    /// they were, only its waiters are released, matching the
    /// original.
    pub fn flg_kill(&mut self, flg: &Flg) -> u32 {
        self.all_wakeup(flg.anchor, Event::Stopped)
    }
}
