//! Address-resolver scenario coverage: timing contract, event ordering, the
//! STOP quirk and interrupt-enable reconciliation, driven through fake host
//! services.

use periph_core::{
    aar::{reg, ENABLE_ACTIVE, INT_END, INT_NOTRESOLVED, INT_RESOLVED},
    Aar, BlockCipher, HwContext, IrqController, IrqLine, NullTraceSink, PpiEvent, PpiRouter,
    Scheduler, SimMemory, SimTime, TimerId, TIME_NEVER,
};
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const ADDRPTR: u32 = 0x1000;
const IRKPTR: u32 = 0x2000;

#[derive(Default)]
struct FakeScheduler {
    now: SimTime,
    notifications: Vec<(TimerId, SimTime)>,
}

impl Scheduler for FakeScheduler {
    fn now(&self) -> SimTime {
        self.now
    }

    fn timer_changed(&mut self, id: TimerId, deadline: SimTime) {
        self.notifications.push((id, deadline));
    }
}

#[derive(Default)]
struct EventLog {
    events: Vec<PpiEvent>,
}

impl PpiRouter for EventLog {
    fn publish(&mut self, event: PpiEvent) {
        self.events.push(event);
    }
}

#[derive(Default)]
struct IrqLog {
    raised: Vec<IrqLine>,
}

impl IrqController for IrqLog {
    fn raise(&mut self, line: IrqLine) {
        self.raised.push(line);
    }
}

/// Stand-in cipher: output = key XOR input. A zero key therefore matches
/// exactly when the address hash equals its prand bytes.
struct XorCipher;

impl BlockCipher for XorCipher {
    fn encrypt_block(&self, key: &[u8; 16], input: &[u8; 16]) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = key[i] ^ input[i];
        }
        out
    }
}

struct Harness {
    mem: SimMemory,
    scheduler: FakeScheduler,
    ppi: EventLog,
    irq: IrqLog,
    cipher: XorCipher,
    trace: NullTraceSink,
}

impl Harness {
    fn new() -> Self {
        Self {
            mem: SimMemory::new(),
            scheduler: FakeScheduler::default(),
            ppi: EventLog::default(),
            irq: IrqLog::default(),
            cipher: XorCipher,
            trace: NullTraceSink,
        }
    }

    fn ctx(&mut self) -> HwContext<'_> {
        HwContext {
            mem: &mut self.mem,
            scheduler: &mut self.scheduler,
            ppi: &mut self.ppi,
            irq: &mut self.irq,
            cipher: &self.cipher,
            trace: &mut self.trace,
        }
    }

    fn last_notification(&self) -> (TimerId, SimTime) {
        *self
            .scheduler
            .notifications
            .last()
            .expect("scheduler was never notified")
    }
}

fn write_reg(aar: &mut Aar, h: &mut Harness, offset: u32, value: u32) {
    let mut ctx = h.ctx();
    aar.write_reg(offset, value, &mut ctx)
        .expect("register offset must decode");
}

fn start(aar: &mut Aar, h: &mut Harness) {
    write_reg(aar, h, reg::TASKS_START, 1);
}

fn stop(aar: &mut Aar, h: &mut Harness) {
    write_reg(aar, h, reg::TASKS_STOP, 1);
}

fn fire(aar: &mut Aar, h: &mut Harness) {
    h.scheduler.now = aar.next_wake();
    let mut ctx = h.ctx();
    aar.timer_fired(&mut ctx);
}

fn configure(aar: &mut Aar, h: &mut Harness, nirk: u32) {
    write_reg(aar, h, reg::ENABLE, ENABLE_ACTIVE);
    write_reg(aar, h, reg::NIRK, nirk);
    write_reg(aar, h, reg::IRKPTR, IRKPTR);
    write_reg(aar, h, reg::ADDRPTR, ADDRPTR);
}

fn write_address(h: &mut Harness, hash: [u8; 3], prand: [u8; 3]) {
    h.mem.write(ADDRPTR, &[0x42, 0x06, 0x00]);
    h.mem.write(ADDRPTR + 3, &hash);
    h.mem.write(ADDRPTR + 6, &prand);
}

fn write_irk(h: &mut Harness, index: u32, key: &[u8; 16]) {
    h.mem.write(IRKPTR + 16 * index, key);
}

/// A key that never matches under [`XorCipher`] for the addresses used here.
fn miss_key() -> [u8; 16] {
    let mut key = [0u8; 16];
    key[15] = 0x01;
    key
}

#[test]
fn start_is_ignored_unless_enabled() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    write_address(&mut h, [0xBB, 0xAA, 0x42], [0xBB, 0xAA, 0x42]);

    write_reg(&mut aar, &mut h, reg::NIRK, 1);
    start(&mut aar, &mut h);

    assert!(!aar.is_running());
    assert_eq!(aar.next_wake(), TIME_NEVER);
    assert!(h.scheduler.notifications.is_empty());
    assert!(h.ppi.events.is_empty());
}

#[test]
fn non_resolvable_address_completes_after_full_table_charge() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    // Top two bits of prand are 0b00: not a resolvable private address.
    write_address(&mut h, [0xBB, 0xAA, 0x42], [0xBB, 0xAA, 0x02]);
    write_irk(&mut h, 0, &[0u8; 16]);
    write_irk(&mut h, 1, &[0u8; 16]);
    configure(&mut aar, &mut h, 2);

    start(&mut aar, &mut h);
    assert!(aar.is_running());
    assert_eq!(h.last_notification(), (TimerId::Aar, 13));
    assert!(h.ppi.events.is_empty());
    assert!(h.irq.raised.is_empty());

    fire(&mut aar, &mut h);
    assert_eq!(
        h.ppi.events,
        vec![PpiEvent::AarNotResolved, PpiEvent::AarEnd]
    );
    assert_eq!(aar.regs().events_notresolved, 1);
    assert_eq!(aar.regs().events_end, 1);
    assert_eq!(aar.regs().events_resolved, 0);
    assert!(!aar.is_running());
    assert_eq!(h.last_notification(), (TimerId::Aar, TIME_NEVER));
}

#[test]
fn matching_key_publishes_status_then_resolved_then_end() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    write_address(&mut h, [0xBB, 0xAA, 0x42], [0xBB, 0xAA, 0x42]);
    write_irk(&mut h, 0, &miss_key());
    write_irk(&mut h, 1, &[0u8; 16]);
    write_irk(&mut h, 2, &[0u8; 16]);
    configure(&mut aar, &mut h, 3);

    h.scheduler.now = 100;
    start(&mut aar, &mut h);
    // Key 1 matched: two keys examined, so completion lands at 100 + 1 + 12.
    assert_eq!(h.last_notification(), (TimerId::Aar, 113));
    assert_eq!(aar.regs().status, 0);

    fire(&mut aar, &mut h);
    assert_eq!(h.ppi.events, vec![PpiEvent::AarResolved, PpiEvent::AarEnd]);
    assert_eq!(aar.regs().status, 1);
    assert_eq!(aar.regs().events_resolved, 1);
    assert_eq!(aar.regs().events_end, 1);
}

#[test]
fn status_is_untouched_when_nothing_resolves() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    write_address(&mut h, [0xBB, 0xAA, 0x42], [0xBB, 0xAA, 0x42]);
    write_irk(&mut h, 0, &miss_key());
    write_irk(&mut h, 1, &[0u8; 16]);
    configure(&mut aar, &mut h, 2);

    start(&mut aar, &mut h);
    fire(&mut aar, &mut h);
    assert_eq!(aar.regs().status, 1);

    // A second pass over a table with the matching key removed must leave
    // the stale index in place.
    write_irk(&mut h, 1, &miss_key());
    start(&mut aar, &mut h);
    fire(&mut aar, &mut h);
    assert_eq!(aar.regs().status, 1);
    assert_eq!(aar.regs().events_notresolved, 1);
}

#[test]
fn stop_cancels_pending_completion_and_still_signals_end() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    write_address(&mut h, [0xBB, 0xAA, 0x42], [0xBB, 0xAA, 0x02]);
    write_irk(&mut h, 0, &[0u8; 16]);
    write_irk(&mut h, 1, &[0u8; 16]);
    configure(&mut aar, &mut h, 2);

    h.scheduler.now = 47;
    start(&mut aar, &mut h);
    assert_eq!(h.last_notification(), (TimerId::Aar, 60));

    h.scheduler.now = 50;
    stop(&mut aar, &mut h);
    assert_eq!(h.ppi.events, vec![PpiEvent::AarEnd]);
    assert_eq!(aar.regs().events_end, 1);
    assert_eq!(aar.regs().events_resolved, 0);
    assert_eq!(aar.regs().events_notresolved, 0);
    assert!(!aar.is_running());
    // The canceled completion never fires: the timer is disarmed and the
    // scheduler was told so.
    assert_eq!(aar.next_wake(), TIME_NEVER);
    assert_eq!(h.last_notification(), (TimerId::Aar, TIME_NEVER));
    assert_eq!(h.ppi.events.len(), 1);
}

#[test]
fn stop_while_idle_is_inert() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    write_reg(&mut aar, &mut h, reg::ENABLE, ENABLE_ACTIVE);

    stop(&mut aar, &mut h);

    assert!(h.ppi.events.is_empty());
    assert!(h.scheduler.notifications.is_empty());
    assert_eq!(aar.regs().events_end, 0);
}

#[test]
fn repeated_stop_raises_end_only_once() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    write_address(&mut h, [0xBB, 0xAA, 0x42], [0xBB, 0xAA, 0x02]);
    configure(&mut aar, &mut h, 1);
    write_irk(&mut h, 0, &[0u8; 16]);

    start(&mut aar, &mut h);
    stop(&mut aar, &mut h);
    stop(&mut aar, &mut h);

    assert_eq!(h.ppi.events, vec![PpiEvent::AarEnd]);
}

#[test]
fn intenset_accumulates_and_intenclr_is_write_only() {
    let mut h = Harness::new();
    let mut aar = Aar::new();

    write_reg(&mut aar, &mut h, reg::INTENSET, INT_END | INT_RESOLVED);
    assert_eq!(aar.read_reg(reg::INTENSET).unwrap(), INT_END | INT_RESOLVED);

    write_reg(&mut aar, &mut h, reg::INTENCLR, INT_END);
    assert_eq!(aar.read_reg(reg::INTENSET).unwrap(), INT_RESOLVED);
    assert_eq!(aar.read_reg(reg::INTENCLR).unwrap(), 0);
}

#[test]
fn enabled_events_assert_the_shared_irq_line() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    write_address(&mut h, [0xBB, 0xAA, 0x42], [0xBB, 0xAA, 0x42]);
    write_irk(&mut h, 0, &[0u8; 16]);
    configure(&mut aar, &mut h, 1);
    write_reg(&mut aar, &mut h, reg::INTENSET, INT_RESOLVED);

    start(&mut aar, &mut h);
    fire(&mut aar, &mut h);

    // RESOLVED is enabled, END is not: exactly one assertion of line 15.
    assert_eq!(h.irq.raised, vec![IrqLine(15)]);
}

#[test]
fn end_interrupt_fires_on_stop_when_enabled() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    write_address(&mut h, [0xBB, 0xAA, 0x42], [0xBB, 0xAA, 0x02]);
    configure(&mut aar, &mut h, 1);
    write_irk(&mut h, 0, &[0u8; 16]);
    write_reg(&mut aar, &mut h, reg::INTENSET, INT_END | INT_NOTRESOLVED);

    start(&mut aar, &mut h);
    stop(&mut aar, &mut h);

    assert_eq!(h.irq.raised, vec![IrqLine(15)]);
}

#[test]
fn zero_task_write_does_not_strobe() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    write_address(&mut h, [0xBB, 0xAA, 0x42], [0xBB, 0xAA, 0x42]);
    configure(&mut aar, &mut h, 1);
    write_irk(&mut h, 0, &[0u8; 16]);

    write_reg(&mut aar, &mut h, reg::TASKS_START, 0);
    assert!(!aar.is_running());

    start(&mut aar, &mut h);
    assert!(aar.is_running());
    assert_eq!(aar.read_reg(reg::TASKS_START).unwrap(), 0);
}

#[test]
fn unknown_offset_is_rejected_by_the_bus() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    let mut ctx = h.ctx();
    assert!(aar.write_reg(0x0F0, 1, &mut ctx).is_err());
}

#[test]
fn zero_key_table_still_times_and_completes() {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    write_address(&mut h, [0xBB, 0xAA, 0x42], [0xBB, 0xAA, 0x42]);
    configure(&mut aar, &mut h, 0);

    start(&mut aar, &mut h);
    assert_eq!(h.last_notification(), (TimerId::Aar, 1));

    fire(&mut aar, &mut h);
    assert_eq!(
        h.ppi.events,
        vec![PpiEvent::AarNotResolved, PpiEvent::AarEnd]
    );
}

#[rstest]
#[case(0, 7)]
#[case(1, 13)]
#[case(4, 31)]
fn completion_delay_tracks_the_matching_index(#[case] index: u32, #[case] deadline: SimTime) {
    let mut h = Harness::new();
    let mut aar = Aar::new();
    write_address(&mut h, [0xBB, 0xAA, 0x42], [0xBB, 0xAA, 0x42]);
    for i in 0..index {
        write_irk(&mut h, i, &miss_key());
    }
    write_irk(&mut h, index, &[0u8; 16]);
    configure(&mut aar, &mut h, index + 1);

    start(&mut aar, &mut h);
    assert_eq!(h.last_notification(), (TimerId::Aar, deadline));

    fire(&mut aar, &mut h);
    assert_eq!(aar.regs().status, index);
}

proptest! {
    /// Any address whose prand tag is not 0b01 charges the full declared
    /// table length, regardless of key contents.
    #[test]
    fn invalid_prand_always_charges_full_table(
        nirk in 0u32..=16,
        tag in prop::sample::select(vec![0u8, 2, 3]),
        low in any::<[u8; 2]>(),
        keys in any::<[u8; 16]>(),
    ) {
        let mut h = Harness::new();
        let mut aar = Aar::new();
        let prand_top = tag << 6 | 0x15;
        write_address(&mut h, [0x01, 0x02, 0x03], [low[0], low[1], prand_top]);
        for i in 0..nirk {
            write_irk(&mut h, i, &keys);
        }
        configure(&mut aar, &mut h, nirk);

        start(&mut aar, &mut h);
        prop_assert_eq!(
            h.last_notification(),
            (TimerId::Aar, 1 + 6 * SimTime::from(nirk))
        );

        fire(&mut aar, &mut h);
        prop_assert_eq!(
            h.ppi.events.clone(),
            vec![PpiEvent::AarNotResolved, PpiEvent::AarEnd]
        );
    }

    /// INTENSET/INTENCLR reconcile to set-minus-cleared with INTENCLR
    /// always reading back zero.
    #[test]
    fn inten_mask_reconciliation(set in 0u32..8, clr in 0u32..8) {
        let mut h = Harness::new();
        let mut aar = Aar::new();

        write_reg(&mut aar, &mut h, reg::INTENSET, set);
        write_reg(&mut aar, &mut h, reg::INTENCLR, clr);

        prop_assert_eq!(aar.read_reg(reg::INTENSET).unwrap(), set & !clr);
        prop_assert_eq!(aar.read_reg(reg::INTENCLR).unwrap(), 0);
    }
}
