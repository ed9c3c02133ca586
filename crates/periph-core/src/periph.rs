//! Register-visible building blocks shared by both peripheral models.
//!
//! Both engines follow the same protocol: firmware pokes a write-strobe task
//! register, the model computes its outcome immediately, arms a completion
//! timer, and publishes events when the timer fires. The strobe and
//! interrupt-enable plumbing is identical across peripherals and lives here.

/// Consumes a task write-strobe.
///
/// A zero field means no trigger and nothing happens. A non-zero field is
/// cleared back to zero before the task runs, so a stale read of the register
/// can never replay the trigger.
#[must_use]
#[allow(clippy::missing_const_for_fn)]
pub fn consume_strobe(reg: &mut u32) -> bool {
    if *reg == 0 {
        return false;
    }
    *reg = 0;
    true
}

/// Shadow interrupt-enable mask.
///
/// Mirrors which event flags currently assert the peripheral's interrupt
/// line. The mask is reconciled against INTENSET/INTENCLR register writes and
/// is the single source of truth the event-signaling path consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ShadowInten {
    mask: u32,
}

impl ShadowInten {
    /// Creates an empty mask.
    #[must_use]
    pub const fn new() -> Self {
        Self { mask: 0 }
    }

    /// Applies an INTENSET write.
    ///
    /// A zero write is a silent no-op. Otherwise the written bits are ORed
    /// into the mask and the full mask is mirrored back into the register, so
    /// a read-back shows the cumulative enabled set rather than the last
    /// write.
    #[allow(clippy::missing_const_for_fn)]
    pub fn apply_set(&mut self, intenset: &mut u32) {
        if *intenset == 0 {
            return;
        }
        self.mask |= *intenset;
        *intenset = self.mask;
    }

    /// Applies an INTENCLR write.
    ///
    /// A zero write is a silent no-op. Otherwise the written bits are cleared
    /// from the mask, the result is mirrored into INTENSET, and INTENCLR is
    /// zeroed again (write-only-clear: the register reads back 0 once the
    /// handler has run).
    #[allow(clippy::missing_const_for_fn)]
    pub fn apply_clr(&mut self, intenset: &mut u32, intenclr: &mut u32) {
        if *intenclr == 0 {
            return;
        }
        self.mask &= !*intenclr;
        *intenset = self.mask;
        *intenclr = 0;
    }

    /// Returns true when any of `bits` is enabled.
    #[must_use]
    pub const fn is_set(&self, bits: u32) -> bool {
        self.mask & bits != 0
    }

    /// Current mask value.
    #[must_use]
    pub const fn mask(&self) -> u32 {
        self.mask
    }

    /// Clears the mask back to the reset state.
    #[allow(clippy::missing_const_for_fn)]
    pub fn reset(&mut self) {
        self.mask = 0;
    }
}
