//! Cycle-accurate peripheral models for a BLE radio SoC simulator.
//!
//! Two register-mapped blocks are modeled: the AES-CCM link-layer encryption
//! engine and the Accelerated Address Resolver. A simulated CPU drives them
//! through register writes; they compute their outcome immediately, arm a
//! completion timer with the host's discrete-event scheduler, and publish
//! events, interrupts and peripheral-interconnect signals when the modeled
//! processing delay elapses. The scheduler, interrupt controller, PPI fabric
//! and AES-128 primitive are host services consumed through traits.

/// Simulated time primitives and the scheduler capability.
pub mod time;
pub use time::{CompletionTimer, Scheduler, SimTime, TimerId, TIME_NEVER};

/// Host service contracts consumed by the models.
pub mod api;
pub use api::{
    BlockCipher, HwContext, IrqController, IrqLine, PpiEvent, PpiRouter, RegAccessError,
    CCM_AAR_IRQ,
};

/// Leveled, timestamped diagnostic tracing.
pub mod trace;
pub use trace::{NullTraceSink, TraceEvent, TraceLevel, TraceSink};

/// Flat simulated memory space addressed by the pointer registers.
pub mod memory;
pub use memory::{SimMemory, DEFAULT_MEMORY_BYTES};

/// Register-visible building blocks shared by both peripherals.
pub mod periph;
pub use periph::{consume_strobe, ShadowInten};

/// Accelerated Address Resolver model.
pub mod aar;
pub use aar::{Aar, AarRegisters, Resolution};

/// AES-CCM link-layer encryption engine model.
pub mod ccm;
pub use ccm::{Ccm, CcmConfig, CcmErrorCause, CcmRegisters, DataRate};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
