//! Bounded mailbox: a byte ring buffer of fixed-size messages, with
//! blocking take/give, non-blocking take/give, and an overwrite
//! `push` that drops the oldest message instead of blocking or
//! failing.
//!
//! Grounded on the original's mailbox queue, including its handoff
//! mechanic: when a `take` frees a slot and a sender is blocked
//! waiting for room, the freed slot is handed straight to that
//! sender rather than making it re-enter the queue; symmetrically for
//! `give` waking a blocked taker. `M` is the message size in bytes,
//! fixed per mailbox; `CAP` is buffer capacity in bytes and is
//! rounded down to a whole number of messages, exactly as the
//! original rounds its byte `limit`.

use abi::Event;

use crate::arena::{BlockScratch, NodeIx, MAX_MSG_BYTES};
use crate::kernel::Kernel;
use crate::port::Port;
use crate::task::Full;
use crate::waitq;

/// A bounded mailbox of `CAP / M` slots, each `M` bytes. `M` must not
/// exceed [`MAX_MSG_BYTES`] — the scratch buffer a blocked take/give
/// stages its message in has that fixed size, since this crate has no
/// allocator to size it dynamically per mailbox.
pub struct Mailbox<const M: usize, const CAP: usize> {
    anchor: NodeIx,
    data: [u8; CAP],
    limit: usize,
    count: usize,
    head: usize,
}

impl<const M: usize, const CAP: usize> Mailbox<M, CAP> {
    fn new(anchor: NodeIx) -> Self {
        static_assertions::const_assert!(M > 0);
        static_assertions::const_assert!(M <= MAX_MSG_BYTES);
        Mailbox { anchor, data: [0; CAP], limit: (CAP / M) * M, count: 0, head: 0 }
    }

    /// Messages currently queued.
    pub fn count(&self) -> usize {
        self.count / M
    }

    /// Free message slots.
    pub fn space(&self) -> usize {
        (self.limit - self.count) / M
    }

    fn get(&mut self, out: &mut [u8; M]) {
        for b in out.iter_mut() {
            *b = self.data[self.head];
            self.head = (self.head + 1) % self.limit;
        }
        self.count -= M;
    }

    fn put(&mut self, msg: &[u8; M]) {
        let tail = (self.head + self.count) % self.limit;
        for (i, b) in msg.iter().enumerate() {
            self.data[(tail + i) % self.limit] = *b;
        }
        self.count += M;
    }

    /// Drop the oldest message without returning it, making room for
    /// `push`'s overwrite.
    fn skip(&mut self) {
        self.head = (self.head + M) % self.limit;
        self.count -= M;
    }
}

impl<const N: usize, P: Port> Kernel<N, P> {
    /// `box_create`: allocate a fresh empty mailbox sized for `M`-byte
    /// messages over a `CAP`-byte buffer.
    pub fn mbox_create<const M: usize, const CAP: usize>(&mut self) -> Result<Mailbox<M, CAP>, Full> {
        let anchor = self.alloc_node().ok_or(Full)?;
        self.arena_mut()[anchor.index()].body = crate::arena::Body::Anchor;
        crate::ring::init_anchor(self.arena_mut(), crate::ring::LinkField::WAIT, anchor);
        Ok(Mailbox::new(anchor))
    }

    /// `box_take`: non-blocking receive. `Timeout` if empty.
    pub fn mbox_take<const M: usize, const CAP: usize>(
        &mut self,
        mbox: &mut Mailbox<M, CAP>,
        out: &mut [u8; M],
    ) -> Event {
        if mbox.count == 0 {
            return Event::Timeout;
        }
        self.box_get_update(mbox, out);
        Event::Success
    }

    /// `box_give`: non-blocking send. `Timeout` if full.
    pub fn mbox_give<const M: usize, const CAP: usize>(
        &mut self,
        mbox: &mut Mailbox<M, CAP>,
        msg: &[u8; M],
    ) -> Event {
        if mbox.count == mbox.limit {
            return Event::Timeout;
        }
        self.box_put_update(mbox, msg);
        Event::Success
    }

    /// `box_push`: overwrite send. Succeeds unless the mailbox is full
    /// *and* has a blocked taker waiting — in that case a blocked
    /// taker needs the handoff path, not an overwrite, so this falls
    /// back to `Timeout` exactly as the original does. When full with
    /// no waiters, the oldest message is dropped to make room.
    pub fn mbox_push<const M: usize, const CAP: usize>(
        &mut self,
        mbox: &mut Mailbox<M, CAP>,
        msg: &[u8; M],
    ) -> Event {
        if mbox.count == mbox.limit {
            if !waitq::is_empty(self.arena(), mbox.anchor) {
                return Event::Timeout;
            }
            mbox.skip();
        }
        mbox.put(msg);
        Event::Success
    }

    /// `box_waitFor`/`box_waitUntil`: receive, blocking up to `delay`
    /// ticks if the mailbox is currently empty.
    pub fn mbox_wait_take<const M: usize, const CAP: usize>(
        &mut self,
        task: NodeIx,
        mbox: &mut Mailbox<M, CAP>,
        out: &mut [u8; M],
        delay: abi::Tick,
    ) -> Event {
        if mbox.count > 0 {
            self.box_get_update(mbox, out);
            return Event::Success;
        }
        let scratch = BlockScratch::MailboxTake { bytes: [0; MAX_MSG_BYTES], len: M };
        self.task_wait_for(task, mbox.anchor, delay, scratch)
    }

    /// `box_sendFor`/`box_sendUntil`: send, blocking up to `delay`
    /// ticks if the mailbox is currently full.
    pub fn mbox_wait_give<const M: usize, const CAP: usize>(
        &mut self,
        task: NodeIx,
        mbox: &mut Mailbox<M, CAP>,
        msg: &[u8; M],
        delay: abi::Tick,
    ) -> Event {
        if mbox.count < mbox.limit {
            self.box_put_update(mbox, msg);
            return Event::Success;
        }
        let mut bytes = [0u8; MAX_MSG_BYTES];
        bytes[..M].copy_from_slice(msg);
        let scratch = BlockScratch::MailboxGive { bytes, len: M };
        self.task_wait_for(task, mbox.anchor, delay, scratch)
    }

    /// Once a blocked task is handed its message (either direction),
    /// the bytes it received are read back from its scratch — the
    /// counterpart to staging them in `mbox_wait_take`/`mbox_wait_give`
    /// above.
    pub fn mbox_result<const M: usize>(&self, task: NodeIx) -> [u8; M] {
        let mut out = [0u8; M];
        if let BlockScratch::MailboxTake { bytes, len } = self.task(task).scratch {
            out.copy_from_slice(&bytes[..len]);
        }
        out
    }

    /// `box_kill`: drop all queued messages and wake every waiter
    /// (sender or receiver) with `Stopped`.
    pub fn mbox_kill<const M: usize, const CAP: usize>(&mut self, mbox: &mut Mailbox<M, CAP>) -> u32 {
        mbox.count = 0;
        mbox.head = 0;
        self.all_wakeup(mbox.anchor, Event::Stopped)
    }

    /// `priv_box_getUpdate`: pop one message, then if a sender is
    /// blocked waiting for room, hand its pending bytes straight into
    /// the slot just freed and wake it.
    fn box_get_update<const M: usize, const CAP: usize>(
        &mut self,
        mbox: &mut Mailbox<M, CAP>,
        out: &mut [u8; M],
    ) {
        mbox.get(out);
        if let Some(woken) = self.one_wakeup(mbox.anchor, Event::Success) {
            if let BlockScratch::MailboxGive { bytes, len } = self.task(woken).scratch {
                let mut msg = [0u8; M];
                msg.copy_from_slice(&bytes[..len]);
                mbox.put(&msg);
            }
        }
    }

    /// `priv_box_putUpdate`: push one message, then if a receiver is
    /// blocked waiting for data, hand it the oldest queued message
    /// directly (preserving FIFO order) and wake it.
    fn box_put_update<const M: usize, const CAP: usize>(
        &mut self,
        mbox: &mut Mailbox<M, CAP>,
        msg: &[u8; M],
    ) {
        mbox.put(msg);
        if let Some(woken) = self.one_wakeup(mbox.anchor, Event::Success) {
            let mut bytes = [0u8; MAX_MSG_BYTES];
            let mut taken = [0u8; M];
            mbox.get(&mut taken);
            bytes[..M].copy_from_slice(&taken);
            self.task_mut(woken).scratch = BlockScratch::MailboxTake { bytes, len: M };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mock::MockPort;
    use abi::{Priority, Tick};

    fn cfg() -> Config {
        Config { frequency: 1000, robin: 0, hw_timer_size: 0, cnt_max: Tick::MAX / 2 }
    }

    fn dummy() -> ! {
        panic!("test task body should never actually run")
    }

    #[test]
    fn take_after_give_round_trips_the_message() {
        let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
        let mut mbox: Mailbox<4, 16> = k.mbox_create().unwrap();
        assert_eq!(k.mbox_give(&mut mbox, b"ping"), Event::Success);
        assert_eq!(mbox.count(), 1);

        let mut out = [0u8; 4];
        assert_eq!(k.mbox_take(&mut mbox, &mut out), Event::Success);
        assert_eq!(&out, b"ping");
        assert_eq!(mbox.count(), 0);
    }

    #[test]
    fn take_fails_on_empty_mailbox() {
        let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
        let mut mbox: Mailbox<4, 16> = k.mbox_create().unwrap();
        let mut out = [0u8; 4];
        assert_eq!(k.mbox_take(&mut mbox, &mut out), Event::Timeout);
    }

    #[test]
    fn full_mailbox_hands_off_to_a_blocked_sender_on_take() {
        let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
        let mut mbox: Mailbox<4, 4> = k.mbox_create().unwrap(); // one slot
        assert_eq!(k.mbox_give(&mut mbox, b"aaaa"), Event::Success);
        assert_eq!(mbox.space(), 0);

        let sender = k.task_init(Priority::new(3), dummy, 0x1000, 256).unwrap();
        k.mbox_wait_give(sender, &mut mbox, b"bbbb", abi::INFINITE);
        assert!(!k.is_in_ready_or_timers(sender));

        let mut out = [0u8; 4];
        k.mbox_take(&mut mbox, &mut out);
        assert_eq!(&out, b"aaaa");
        // the blocked sender's message was handed straight into the
        // slot `take` just freed
        assert!(k.is_in_ready_or_timers(sender));
        assert_eq!(mbox.count(), 1);
    }

    #[test]
    fn empty_mailbox_hands_off_to_a_blocked_taker_on_give() {
        let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
        let mut mbox: Mailbox<4, 8> = k.mbox_create().unwrap();

        let taker = k.task_init(Priority::new(3), dummy, 0x1000, 256).unwrap();
        let mut out = [0u8; 4];
        k.mbox_wait_take(taker, &mut mbox, &mut out, abi::INFINITE);
        assert!(!k.is_in_ready_or_timers(taker));

        k.mbox_give(&mut mbox, b"ping");
        assert!(k.is_in_ready_or_timers(taker));
        assert_eq!(mbox.count(), 0);
        assert_eq!(&k.mbox_result::<4>(taker), b"ping");
    }

    #[test]
    fn push_overwrites_oldest_when_full_with_no_waiters() {
        let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
        let mut mbox: Mailbox<4, 4> = k.mbox_create().unwrap();
        k.mbox_give(&mut mbox, b"aaaa");
        assert_eq!(k.mbox_push(&mut mbox, b"bbbb"), Event::Success);

        let mut out = [0u8; 4];
        k.mbox_take(&mut mbox, &mut out);
        assert_eq!(&out, b"bbbb");
    }

    #[test]
    fn kill_drains_the_buffer_and_wakes_waiters() {
        let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
        let mut mbox: Mailbox<4, 8> = k.mbox_create().unwrap();
        let taker = k.task_init(Priority::new(3), dummy, 0x1000, 256).unwrap();
        let mut out = [0u8; 4];
        k.mbox_wait_take(taker, &mut mbox, &mut out, abi::INFINITE);

        assert_eq!(k.mbox_kill(&mut mbox), 1);
        assert_eq!(k.task_event(taker), Event::Stopped);
        assert_eq!(mbox.count(), 0);
    }
}
