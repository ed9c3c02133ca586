//! Accelerated Address Resolver model.
//!
//! The resolver checks whether a received over-the-air address was generated
//! from one of up to 16 configured identity-resolving keys. Firmware drives
//! it through write-strobe task registers; the model computes the outcome the
//! moment START triggers, then sits on an armed completion timer for
//! `1 + 6 × keys_examined` simulated microseconds before the result becomes
//! register-visible and the END/RESOLVED/NOTRESOLVED events fire.

pub mod resolve;

pub use resolve::{Resolution, IRK_BYTES};

use crate::api::{HwContext, PpiEvent, RegAccessError, CCM_AAR_IRQ};
use crate::periph::{consume_strobe, ShadowInten};
use crate::time::{CompletionTimer, SimTime, TimerId, TIME_NEVER};

/// Byte offsets of the AAR register block.
pub mod reg {
    /// START task strobe.
    pub const TASKS_START: u32 = 0x000;
    /// STOP task strobe.
    pub const TASKS_STOP: u32 = 0x008;
    /// END event flag.
    pub const EVENTS_END: u32 = 0x100;
    /// RESOLVED event flag.
    pub const EVENTS_RESOLVED: u32 = 0x104;
    /// NOTRESOLVED event flag.
    pub const EVENTS_NOTRESOLVED: u32 = 0x108;
    /// Interrupt-enable set register.
    pub const INTENSET: u32 = 0x304;
    /// Interrupt-enable clear register.
    pub const INTENCLR: u32 = 0x308;
    /// Resolution status (index of the matching key).
    pub const STATUS: u32 = 0x400;
    /// Enable field.
    pub const ENABLE: u32 = 0x500;
    /// Number of keys in the table.
    pub const NIRK: u32 = 0x504;
    /// Key table base address.
    pub const IRKPTR: u32 = 0x508;
    /// Address buffer base address.
    pub const ADDRPTR: u32 = 0x510;
    /// Scratch area base address.
    pub const SCRATCHPTR: u32 = 0x514;
}

/// Interrupt-enable bit for the END event.
pub const INT_END: u32 = 1 << 0;
/// Interrupt-enable bit for the RESOLVED event.
pub const INT_RESOLVED: u32 = 1 << 1;
/// Interrupt-enable bit for the NOTRESOLVED event.
pub const INT_NOTRESOLVED: u32 = 1 << 2;

/// ENABLE encoding that activates the resolver; any other value makes START
/// a silent no-op.
pub const ENABLE_ACTIVE: u32 = 0x3;

/// Fixed dispatch latency charged by START, in simulated microseconds.
pub const START_OVERHEAD_US: SimTime = 1;
/// Cost per key examined, in simulated microseconds.
pub const PER_IRK_US: SimTime = 6;

/// AAR register block.
///
/// Task fields are write-strobes: the side-effect handlers clear them back to
/// zero as part of consuming the trigger. INTENSET reads back the cumulative
/// enabled mask; INTENCLR reads back 0 once its handler has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AarRegisters {
    /// START task strobe: begin resolving the configured address.
    pub tasks_start: u32,
    /// STOP task strobe: abort a resolution in flight.
    pub tasks_stop: u32,
    /// Latched END event flag.
    pub events_end: u32,
    /// Latched RESOLVED event flag.
    pub events_resolved: u32,
    /// Latched NOTRESOLVED event flag.
    pub events_notresolved: u32,
    /// Interrupt-enable set register.
    pub intenset: u32,
    /// Interrupt-enable clear register.
    pub intenclr: u32,
    /// Index of the key that resolved the address; untouched when no key
    /// matches.
    pub status: u32,
    /// Enable field (2 bits); the resolver only acts on [`ENABLE_ACTIVE`].
    pub enable: u32,
    /// Number of keys in the table at IRKPTR (5-bit field).
    pub nirk: u32,
    /// Base address of the key table in simulated memory.
    pub irkptr: u32,
    /// Base address of the packet buffer holding the address to resolve.
    pub addrptr: u32,
    /// Scratch area base address (reserved for hardware use).
    pub scratchptr: u32,
}

/// One AAR peripheral instance.
#[derive(Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Aar {
    regs: AarRegisters,
    inten: ShadowInten,
    running: bool,
    timer: CompletionTimer,
    matched: Option<u8>,
}

impl Aar {
    /// Creates a resolver in its documented power-on state: registers zero,
    /// interrupt mask empty, idle, timer disarmed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the peripheral to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Read-only view of the register block.
    #[must_use]
    pub const fn regs(&self) -> &AarRegisters {
        &self.regs
    }

    /// Returns true while a resolution is in flight.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Current completion deadline, [`TIME_NEVER`] when idle.
    #[must_use]
    pub const fn next_wake(&self) -> SimTime {
        self.timer.deadline()
    }

    /// Reads the register at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`RegAccessError::UnknownRegister`] when `offset` does not
    /// decode to an AAR register.
    pub fn read_reg(&self, offset: u32) -> Result<u32, RegAccessError> {
        match offset {
            reg::TASKS_START => Ok(self.regs.tasks_start),
            reg::TASKS_STOP => Ok(self.regs.tasks_stop),
            reg::EVENTS_END => Ok(self.regs.events_end),
            reg::EVENTS_RESOLVED => Ok(self.regs.events_resolved),
            reg::EVENTS_NOTRESOLVED => Ok(self.regs.events_notresolved),
            reg::INTENSET => Ok(self.regs.intenset),
            reg::INTENCLR => Ok(self.regs.intenclr),
            reg::STATUS => Ok(self.regs.status),
            reg::ENABLE => Ok(self.regs.enable),
            reg::NIRK => Ok(self.regs.nirk),
            reg::IRKPTR => Ok(self.regs.irkptr),
            reg::ADDRPTR => Ok(self.regs.addrptr),
            reg::SCRATCHPTR => Ok(self.regs.scratchptr),
            offset => Err(RegAccessError::UnknownRegister { offset }),
        }
    }

    /// Performs a firmware write to the register at `offset`.
    ///
    /// Task-strobe and interrupt-configuration writes run their side-effect
    /// handler before the write is considered complete; everything else is
    /// plain storage with the hardware field masks applied.
    ///
    /// # Errors
    ///
    /// Returns [`RegAccessError::UnknownRegister`] when `offset` does not
    /// decode to an AAR register.
    pub fn write_reg(
        &mut self,
        offset: u32,
        value: u32,
        ctx: &mut HwContext<'_>,
    ) -> Result<(), RegAccessError> {
        match offset {
            reg::TASKS_START => {
                self.regs.tasks_start = value;
                if consume_strobe(&mut self.regs.tasks_start) {
                    self.task_start(ctx);
                }
            }
            reg::TASKS_STOP => {
                self.regs.tasks_stop = value;
                if consume_strobe(&mut self.regs.tasks_stop) {
                    self.task_stop(ctx);
                }
            }
            reg::EVENTS_END => self.regs.events_end = value,
            reg::EVENTS_RESOLVED => self.regs.events_resolved = value,
            reg::EVENTS_NOTRESOLVED => self.regs.events_notresolved = value,
            reg::INTENSET => {
                self.regs.intenset = value;
                self.inten.apply_set(&mut self.regs.intenset);
            }
            reg::INTENCLR => {
                self.regs.intenclr = value;
                self.inten
                    .apply_clr(&mut self.regs.intenset, &mut self.regs.intenclr);
            }
            // The model owns STATUS; firmware writes are dropped.
            reg::STATUS => {}
            reg::ENABLE => self.regs.enable = value & 0x3,
            reg::NIRK => self.regs.nirk = value & 0x1F,
            reg::IRKPTR => self.regs.irkptr = value,
            reg::ADDRPTR => self.regs.addrptr = value,
            reg::SCRATCHPTR => self.regs.scratchptr = value,
            offset => return Err(RegAccessError::UnknownRegister { offset }),
        }
        Ok(())
    }

    /// START task: resolve the configured address.
    ///
    /// Silently ignored unless ENABLE holds the active encoding. The scan
    /// runs immediately; its outcome stays internal until the completion
    /// timer fires `1 + 6 × keys_examined` microseconds later.
    pub fn task_start(&mut self, ctx: &mut HwContext<'_>) {
        if self.regs.enable != ENABLE_ACTIVE {
            return;
        }

        self.running = true;
        let resolution = resolve::scan(
            ctx.mem,
            ctx.cipher,
            ctx.trace,
            ctx.scheduler.now(),
            self.regs.addrptr,
            self.regs.irkptr,
            self.regs.nirk,
        );
        self.matched = resolution.matched;

        let deadline = ctx.scheduler.now()
            + START_OVERHEAD_US
            + PER_IRK_US * SimTime::from(resolution.examined);
        self.timer.arm(deadline);
        ctx.scheduler.timer_changed(TimerId::Aar, deadline);
    }

    /// STOP task: abort a resolution in flight.
    ///
    /// A no-op when idle. When busy the pending completion is canceled and
    /// END is still raised even though no result was produced; the quirk is
    /// kept bit-exact because firmware may depend on it.
    pub fn task_stop(&mut self, ctx: &mut HwContext<'_>) {
        if !self.running {
            return;
        }

        self.running = false;
        self.timer.disarm();
        ctx.scheduler.timer_changed(TimerId::Aar, TIME_NEVER);
        self.signal_end(ctx);
    }

    /// Completion handler, invoked by the host scheduler exactly when the
    /// armed deadline is reached.
    ///
    /// Publishes the outcome computed at START time: STATUS and RESOLVED on a
    /// match, NOTRESOLVED otherwise, then END. END always follows the outcome
    /// event, never precedes it.
    pub fn timer_fired(&mut self, ctx: &mut HwContext<'_>) {
        self.running = false;
        self.timer.disarm();
        ctx.scheduler.timer_changed(TimerId::Aar, TIME_NEVER);

        if let Some(index) = self.matched {
            self.regs.status = u32::from(index);
            self.signal_resolved(ctx);
        } else {
            self.signal_notresolved(ctx);
        }
        self.signal_end(ctx);
    }

    fn signal_end(&mut self, ctx: &mut HwContext<'_>) {
        self.regs.events_end = 1;
        ctx.ppi.publish(PpiEvent::AarEnd);
        if self.inten.is_set(INT_END) {
            ctx.irq.raise(CCM_AAR_IRQ);
        }
    }

    fn signal_resolved(&mut self, ctx: &mut HwContext<'_>) {
        self.regs.events_resolved = 1;
        ctx.ppi.publish(PpiEvent::AarResolved);
        if self.inten.is_set(INT_RESOLVED) {
            ctx.irq.raise(CCM_AAR_IRQ);
        }
    }

    fn signal_notresolved(&mut self, ctx: &mut HwContext<'_>) {
        self.regs.events_notresolved = 1;
        ctx.ppi.publish(PpiEvent::AarNotResolved);
        if self.inten.is_set(INT_NOTRESOLVED) {
            ctx.irq.raise(CCM_AAR_IRQ);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{reg, Aar, ENABLE_ACTIVE};
    use crate::api::RegAccessError;

    #[test]
    fn power_on_state_is_idle_and_zeroed() {
        let aar = Aar::new();
        assert!(!aar.is_running());
        assert_eq!(aar.next_wake(), crate::time::TIME_NEVER);
        assert_eq!(aar.regs().enable, 0);
        assert_eq!(aar.regs().status, 0);
    }

    #[test]
    fn enable_and_nirk_apply_field_masks() {
        let mut aar = Aar::new();
        // Field masking is independent of side effects, so a bare context is
        // not needed for these plain-storage registers.
        let mut mem = crate::memory::SimMemory::with_size(16);
        let mut scheduler = NoScheduler;
        let mut ppi = NoPpi;
        let mut irq = NoIrq;
        let mut trace = crate::trace::NullTraceSink;
        let mut ctx = crate::api::HwContext {
            mem: &mut mem,
            scheduler: &mut scheduler,
            ppi: &mut ppi,
            irq: &mut irq,
            cipher: &NoCipher,
            trace: &mut trace,
        };

        aar.write_reg(reg::ENABLE, 0xFFFF_FFFF, &mut ctx).unwrap();
        assert_eq!(aar.regs().enable, ENABLE_ACTIVE);
        aar.write_reg(reg::NIRK, 0x123, &mut ctx).unwrap();
        assert_eq!(aar.regs().nirk, 0x03);
    }

    #[test]
    fn status_register_ignores_firmware_writes() {
        let mut aar = Aar::new();
        let mut mem = crate::memory::SimMemory::with_size(16);
        let mut scheduler = NoScheduler;
        let mut ppi = NoPpi;
        let mut irq = NoIrq;
        let mut trace = crate::trace::NullTraceSink;
        let mut ctx = crate::api::HwContext {
            mem: &mut mem,
            scheduler: &mut scheduler,
            ppi: &mut ppi,
            irq: &mut irq,
            cipher: &NoCipher,
            trace: &mut trace,
        };

        aar.write_reg(reg::STATUS, 7, &mut ctx).unwrap();
        assert_eq!(aar.read_reg(reg::STATUS).unwrap(), 0);
    }

    #[test]
    fn unknown_offset_is_rejected() {
        let aar = Aar::new();
        assert_eq!(
            aar.read_reg(0x518),
            Err(RegAccessError::UnknownRegister { offset: 0x518 })
        );
    }

    struct NoScheduler;
    impl crate::time::Scheduler for NoScheduler {
        fn now(&self) -> crate::time::SimTime {
            0
        }
        fn timer_changed(&mut self, _id: crate::time::TimerId, _deadline: crate::time::SimTime) {}
    }

    struct NoPpi;
    impl crate::api::PpiRouter for NoPpi {
        fn publish(&mut self, _event: crate::api::PpiEvent) {}
    }

    struct NoIrq;
    impl crate::api::IrqController for NoIrq {
        fn raise(&mut self, _line: crate::api::IrqLine) {}
    }

    struct NoCipher;
    impl crate::api::BlockCipher for NoCipher {
        fn encrypt_block(&self, _key: &[u8; 16], input: &[u8; 16]) -> [u8; 16] {
            *input
        }
    }
}
