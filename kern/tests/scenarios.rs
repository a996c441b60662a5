//! End-to-end scenarios driven through the public `Kernel` API, rather
//! than through individual modules' internals — each test plays out a
//! single request/response narrative a real application would see.
//!
//! Real preemption (a blocked call's Rust function returning only once
//! hardware later resumes its caller) cannot be reproduced on a host
//! thread without real fibers. These tests instead drive the
//! synchronous primitives (`block_on`/`one_wakeup`/`tmr_handler`/
//! `switch_now`) directly and assert on the bookkeeping they perform,
//! which is what a real `Port`'s interrupt-return path would act on.

use abi::{Event, FlgMode, Priority, Tick};
use kern::arena::BlockScratch;
use kern::config::Config;
use kern::mock::MockPort;
use kern::mbox::Mailbox;
use kern::Kernel;

fn cfg() -> Config {
    Config { frequency: 1000, robin: 0, hw_timer_size: 0, cnt_max: Tick::MAX / 2 }
}

fn dummy() -> ! {
    panic!("scenario task body should never actually run")
}

#[test]
fn priority_preemption_on_flag_give() {
    let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
    let mut flg = k.flg_create(0).unwrap();

    let hi = k.task_init(Priority::new(5), dummy, 0x1000, 256).unwrap();
    k.flg_wait(hi, &mut flg, 0x1, FlgMode::ANY | FlgMode::ACCEPT, abi::INFINITE);
    assert!(!k.is_in_ready_or_timers(hi));

    let lo = k.task_init(Priority::new(1), dummy, 0x2000, 256).unwrap();
    k.flg_give(&mut flg, 0x1);

    assert!(k.is_in_ready_or_timers(hi));
    assert_eq!(k.task_event(hi), Event::Success);
    assert_eq!(flg.flags, 0);
    let _ = lo;
}

#[test]
fn and_matching_holds_partial_bits_until_all_arrive() {
    let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
    let mut flg = k.flg_create(0).unwrap();
    let t = k.task_init(Priority::new(3), dummy, 0x1000, 256).unwrap();

    k.flg_wait(t, &mut flg, 0x3, FlgMode::ALL, abi::INFINITE);

    k.flg_give(&mut flg, 0x1);
    assert!(!k.is_in_ready_or_timers(t));
    assert_eq!(flg.flags, 0x1);

    k.flg_give(&mut flg, 0x2);
    assert!(k.is_in_ready_or_timers(t));
    assert_eq!(flg.flags, 0);
    assert_eq!(k.task_event(t), Event::Success);
}

#[test]
fn mailbox_rendezvous_preserves_fifo_order() {
    let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
    let mut mbox: Mailbox<4, 8> = k.mbox_create().unwrap();

    assert_eq!(k.mbox_give(&mut mbox, b"0xA0"), Event::Success);
    assert_eq!(k.mbox_give(&mut mbox, b"0xB0"), Event::Success);

    let mut out = [0u8; 4];
    assert_eq!(k.mbox_take(&mut mbox, &mut out), Event::Success);
    assert_eq!(&out, b"0xA0");
    assert_eq!(k.mbox_take(&mut mbox, &mut out), Event::Success);
    assert_eq!(&out, b"0xB0");

    // third take on an empty mailbox with IMMEDIATE semantics
    assert_eq!(k.mbox_take(&mut mbox, &mut out), Event::Timeout);
}

#[test]
fn full_mailbox_blocked_sender_handoff_keeps_it_full() {
    let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
    let mut mbox: Mailbox<4, 4> = k.mbox_create().unwrap();
    k.mbox_give(&mut mbox, b"0xA0");
    assert_eq!(mbox.space(), 0);

    let sender = k.task_init(Priority::new(3), dummy, 0x1000, 256).unwrap();
    k.mbox_wait_give(sender, &mut mbox, b"0xC0", abi::INFINITE);
    assert!(!k.is_in_ready_or_timers(sender));

    let mut out = [0u8; 4];
    k.mbox_take(&mut mbox, &mut out);
    assert_eq!(&out, b"0xA0");

    assert!(k.is_in_ready_or_timers(sender));
    assert_eq!(k.task_event(sender), Event::Success);
    assert_eq!(mbox.count(), 1); // sender's message landed, buffer stays full
}

#[test]
fn delay_times_out_once_ticks_elapse() {
    let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
    let t = k.task_init(Priority::new(3), dummy, 0x1000, 256).unwrap();

    let anchor = k.suspend_anchor();
    k.task_wait_for(t, anchor, 100, BlockScratch::None);
    assert!(!k.is_in_ready_or_timers(t));

    k.tmr_handler(99);
    assert!(!k.is_in_ready_or_timers(t));

    k.tmr_handler(100);
    assert!(k.is_in_ready_or_timers(t));
    assert_eq!(k.task_event(t), Event::Timeout);
}

#[test]
fn round_robin_rotates_equal_priority_peers_after_a_slice() {
    let robin_cfg = Config { frequency: 300, robin: 3, hw_timer_size: 0, cnt_max: Tick::MAX / 2 };
    let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), robin_cfg, (0, 256)).unwrap();

    let a = k.task_init(Priority::new(5), dummy, 0x1000, 256).unwrap();
    let b = k.task_init(Priority::new(5), dummy, 0x2000, 256).unwrap();
    let c = k.task_init(Priority::new(5), dummy, 0x3000, 256).unwrap();

    k.switch_now();
    assert_eq!(k.current(), a);

    // slice length = (300 / 3).max(1) = 100 ticks
    for _ in 0..100 {
        k.tmr_handler(0);
    }
    k.switch_now();
    assert_eq!(k.current(), b);

    for _ in 0..100 {
        k.tmr_handler(0);
    }
    k.switch_now();
    assert_eq!(k.current(), c);
}

#[test]
fn kill_wakes_all_waiters_in_priority_order() {
    let mut k: Kernel<8, MockPort> = Kernel::new(MockPort::new(), cfg(), (0, 256)).unwrap();
    let mut flg = k.flg_create(0).unwrap();

    let prios = [1u8, 5, 3, 4, 2];
    let mut tasks = std::vec::Vec::new();
    for (i, p) in prios.iter().enumerate() {
        let t = k.task_init(Priority::new(*p), dummy, 0x1000 + i * 0x1000, 256).unwrap();
        k.flg_wait(t, &mut flg, 1 << i, FlgMode::ANY, abi::INFINITE);
        tasks.push((t, *p));
    }

    let woken = k.flg_kill(&flg);
    assert_eq!(woken, 5);
    for (t, _) in &tasks {
        assert!(k.is_in_ready_or_timers(*t));
        assert_eq!(k.task_event(*t), Event::Stopped);
    }
}
