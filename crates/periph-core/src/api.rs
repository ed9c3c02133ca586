//! Host-facing contracts for embedding the peripheral models.
//!
//! The surrounding simulator provides the interrupt controller, the
//! peripheral-interconnect event router, the AES-128 block primitive and the
//! diagnostic sink; the models only ever talk to them through the traits
//! collected in [`HwContext`].

use thiserror::Error;

use crate::memory::SimMemory;
use crate::time::Scheduler;
use crate::trace::TraceSink;

/// Hardware interrupt line identity as seen by the interrupt controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IrqLine(pub u16);

/// The single interrupt line shared by the CCM engine and the AAR.
pub const CCM_AAR_IRQ: IrqLine = IrqLine(15);

/// Interrupt controller capability.
pub trait IrqController {
    /// Asserts `line`. Both peripherals share one line; the flag registers
    /// tell firmware which event fired.
    fn raise(&mut self, line: IrqLine);
}

/// Event identities forwarded to the peripheral-interconnect router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PpiEvent {
    /// AAR finished (with or without a result).
    AarEnd,
    /// AAR matched one of the configured keys.
    AarResolved,
    /// AAR scanned the whole table without a match.
    AarNotResolved,
    /// CCM keystream generation finished.
    CcmEndKsgen,
    /// CCM encrypt/decrypt finished.
    CcmEndCrypt,
    /// CCM rejected an operation.
    CcmError,
}

/// Peripheral-interconnect router capability. Publication is fire-and-forget;
/// the fabric decides which task inputs the event fans out to.
pub trait PpiRouter {
    /// Routes `event` through the interconnect.
    fn publish(&mut self, event: PpiEvent);
}

/// AES-128 single-block primitive.
///
/// Operates on big-endian byte buffers; the models perform all endianness
/// conversions themselves. Simulation fidelity only, no side-channel
/// requirements.
pub trait BlockCipher {
    /// Encrypts one 16-byte block under `key`.
    fn encrypt_block(&self, key: &[u8; 16], input: &[u8; 16]) -> [u8; 16];
}

/// Errors raised by the addressed register dispatch layer.
///
/// Registers themselves never fail; only an offset that decodes to no
/// register at all is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RegAccessError {
    /// The offset does not decode to a register of this peripheral.
    #[error("no register decodes at offset {offset:#05x}")]
    UnknownRegister {
        /// Offending byte offset into the register block.
        offset: u32,
    },
}

/// Bundle of host services passed into every task, side-effect and timer
/// entry point.
///
/// Handlers run to completion on the caller's stack; nothing here is retained
/// across calls, which keeps the models testable against per-test fakes.
pub struct HwContext<'a> {
    /// Simulated memory space the pointer registers index into.
    pub mem: &'a mut SimMemory,
    /// Discrete-event scheduler owning simulated time.
    pub scheduler: &'a mut dyn Scheduler,
    /// Peripheral-interconnect event router.
    pub ppi: &'a mut dyn PpiRouter,
    /// Interrupt controller for the shared CCM/AAR line.
    pub irq: &'a mut dyn IrqController,
    /// AES-128 block-cipher primitive.
    pub cipher: &'a dyn BlockCipher,
    /// Diagnostic trace sink.
    pub trace: &'a mut dyn TraceSink,
}
