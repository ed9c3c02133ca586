//! AES-CCM link-layer encryption engine model.
//!
//! The engine runs the same dispatch/timer/event pattern as the address
//! resolver: task strobes start work, the data transformation happens the
//! moment the task triggers, and the completion events become visible only
//! when the armed timer fires. KSGEN fills the scratch area with keystream
//! blocks; CRYPT consumes them to encrypt an outgoing packet immediately or
//! to decrypt a received one once the radio delivers it. STOP cancels
//! whatever is in flight without raising events.

pub mod crypto;

pub use crypto::{CcmConfig, CONFIG_BYTES, MIC_BYTES};

use crate::api::{HwContext, PpiEvent, RegAccessError, CCM_AAR_IRQ};
use crate::periph::{consume_strobe, ShadowInten};
use crate::time::{CompletionTimer, SimTime, TimerId, TIME_NEVER};
use crate::trace::TraceEvent;

/// Byte offsets of the CCM register block.
pub mod reg {
    /// KSGEN task strobe.
    pub const TASKS_KSGEN: u32 = 0x000;
    /// CRYPT task strobe.
    pub const TASKS_CRYPT: u32 = 0x004;
    /// STOP task strobe.
    pub const TASKS_STOP: u32 = 0x008;
    /// RATEOVERRIDE task strobe.
    pub const TASKS_RATEOVERRIDE: u32 = 0x00C;
    /// ENDKSGEN event flag.
    pub const EVENTS_ENDKSGEN: u32 = 0x100;
    /// ENDCRYPT event flag.
    pub const EVENTS_ENDCRYPT: u32 = 0x104;
    /// ERROR event flag.
    pub const EVENTS_ERROR: u32 = 0x108;
    /// Shortcut register.
    pub const SHORTS: u32 = 0x200;
    /// Interrupt-enable set register.
    pub const INTENSET: u32 = 0x304;
    /// Interrupt-enable clear register.
    pub const INTENCLR: u32 = 0x308;
    /// MIC check result of the last decryption.
    pub const MICSTATUS: u32 = 0x400;
    /// Enable field.
    pub const ENABLE: u32 = 0x500;
    /// Operating mode.
    pub const MODE: u32 = 0x504;
    /// Configuration block base address.
    pub const CNFPTR: u32 = 0x508;
    /// Input packet base address.
    pub const INPTR: u32 = 0x50C;
    /// Output packet base address.
    pub const OUTPTR: u32 = 0x510;
    /// Keystream scratch area base address.
    pub const SCRATCHPTR: u32 = 0x514;
    /// Maximum payload length in extended-length mode.
    pub const MAXPACKETSIZE: u32 = 0x518;
    /// Data-rate override applied by TASKS_RATEOVERRIDE.
    pub const RATEOVERRIDE: u32 = 0x51C;
}

/// Interrupt-enable bit for the ENDKSGEN event.
pub const INT_ENDKSGEN: u32 = 1 << 0;
/// Interrupt-enable bit for the ENDCRYPT event.
pub const INT_ENDCRYPT: u32 = 1 << 1;
/// Interrupt-enable bit for the ERROR event.
pub const INT_ERROR: u32 = 1 << 2;

/// SHORTS bit chaining ENDKSGEN straight into CRYPT.
pub const SHORT_ENDKSGEN_CRYPT: u32 = 1 << 0;

/// ENABLE encoding that activates the engine.
pub const ENABLE_ACTIVE: u32 = 0x2;

/// MODE bit selecting decryption.
const MODE_DECRYPT: u32 = 1;
/// MODE bit selecting the extended length field.
const MODE_LENGTH_EXTENDED: u32 = 1 << 24;
/// Shift of the MODE data-rate field.
const MODE_DATARATE_SHIFT: u32 = 16;
/// Width mask of the MODE data-rate field.
const MODE_DATARATE_MASK: u32 = 0x3;

/// Maximum payload when MODE selects the default length field.
const DEFAULT_MAX_PAYLOAD: u32 = 27;

/// Reset value of MAXPACKETSIZE.
const MAXPACKETSIZE_RESET: u32 = 0xFB;

/// Fixed dispatch latency charged by KSGEN, in simulated microseconds.
pub const KSGEN_OVERHEAD_US: SimTime = 1;
/// KSGEN cost per keystream block, in simulated microseconds.
pub const KSGEN_PER_BLOCK_US: SimTime = 4;
/// Fixed dispatch latency charged by CRYPT, in simulated microseconds.
pub const CRYPT_OVERHEAD_US: SimTime = 1;

/// Header, length and reserved bytes in front of a packet payload.
const PACKET_HEADER_BYTES: u32 = 3;

/// Radio data rates the crypt timing model understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DataRate {
    /// 1 Mbit/s.
    OneMbit,
    /// 2 Mbit/s.
    TwoMbit,
    /// 125 kbit/s long-range coding.
    Kbit125,
    /// 500 kbit/s long-range coding.
    Kbit500,
}

impl DataRate {
    /// Decodes the 2-bit rate field used by MODE and RATEOVERRIDE.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & MODE_DATARATE_MASK {
            1 => Self::TwoMbit,
            2 => Self::Kbit125,
            3 => Self::Kbit500,
            _ => Self::OneMbit,
        }
    }

    /// Simulated microseconds consumed per over-the-air byte.
    #[must_use]
    pub const fn cost_per_byte(self) -> SimTime {
        match self {
            Self::OneMbit => 8,
            Self::TwoMbit => 4,
            Self::Kbit125 => 64,
            Self::Kbit500 => 16,
        }
    }
}

/// Why the engine raised ERROR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcmErrorCause {
    /// CRYPT triggered without a completed keystream generation.
    KeystreamInvalid,
    /// The packet payload exceeds the effective maximum length.
    PayloadTooLong,
    /// A received packet is too short to carry a MIC.
    PacketTooShort,
}

/// CCM register block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CcmRegisters {
    /// KSGEN task strobe: generate the keystream for the configured packet.
    pub tasks_ksgen: u32,
    /// CRYPT task strobe: encrypt or decrypt a packet.
    pub tasks_crypt: u32,
    /// STOP task strobe: cancel the operation in flight.
    pub tasks_stop: u32,
    /// RATEOVERRIDE task strobe: latch RATEOVERRIDE for the next crypt.
    pub tasks_rateoverride: u32,
    /// Latched ENDKSGEN event flag.
    pub events_endksgen: u32,
    /// Latched ENDCRYPT event flag.
    pub events_endcrypt: u32,
    /// Latched ERROR event flag.
    pub events_error: u32,
    /// Shortcut register; only [`SHORT_ENDKSGEN_CRYPT`] is implemented.
    pub shorts: u32,
    /// Interrupt-enable set register.
    pub intenset: u32,
    /// Interrupt-enable clear register.
    pub intenclr: u32,
    /// MIC verdict of the last decryption: 1 passed, 0 failed.
    pub micstatus: u32,
    /// Enable field (2 bits); the engine only acts on [`ENABLE_ACTIVE`].
    pub enable: u32,
    /// Operating mode: decrypt bit, data-rate field, length-field select.
    pub mode: u32,
    /// Configuration block base address (key, packet counter, direction, IV).
    pub cnfptr: u32,
    /// Input packet base address.
    pub inptr: u32,
    /// Output packet base address.
    pub outptr: u32,
    /// Keystream scratch area base address.
    pub scratchptr: u32,
    /// Maximum payload length honored in extended-length mode (8 bits).
    pub maxpacketsize: u32,
    /// Rate value latched by TASKS_RATEOVERRIDE (2 bits).
    pub rateoverride: u32,
}

impl Default for CcmRegisters {
    fn default() -> Self {
        Self {
            tasks_ksgen: 0,
            tasks_crypt: 0,
            tasks_stop: 0,
            tasks_rateoverride: 0,
            events_endksgen: 0,
            events_endcrypt: 0,
            events_error: 0,
            shorts: 0,
            intenset: 0,
            intenclr: 0,
            micstatus: 0,
            enable: 0,
            mode: 0,
            cnfptr: 0,
            inptr: 0,
            outptr: 0,
            scratchptr: 0,
            maxpacketsize: MAXPACKETSIZE_RESET,
            rateoverride: 0,
        }
    }
}

/// Internal sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
enum CcmState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Keystream generation pending completion.
    Ksgen,
    /// Encrypt/decrypt pending completion.
    Crypt,
    /// Decrypt armed, waiting for the radio to deliver a packet.
    AwaitPacket,
}

/// One AES-CCM engine instance.
#[derive(Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Ccm {
    regs: CcmRegisters,
    inten: ShadowInten,
    state: CcmState,
    timer: CompletionTimer,
    keystream_valid: bool,
    pending_mic_ok: Option<bool>,
    rate_override: Option<DataRate>,
}

impl Ccm {
    /// Creates an engine in its documented power-on state.
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
    pub const fn regs(&self) -> &CcmRegisters {
        &self.regs
    }

    /// Returns true while a keystream generation or crypt is in flight,
    /// including the decrypt wait for a radio packet.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        !matches!(self.state, CcmState::Idle)
    }

    /// Current completion deadline, [`TIME_NEVER`] when no timed work is
    /// pending.
    #[must_use]
    pub const fn next_wake(&self) -> SimTime {
        self.timer.deadline()
    }

    /// Reads the register at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`RegAccessError::UnknownRegister`] when `offset` does not
    /// decode to a CCM register.
    pub fn read_reg(&self, offset: u32) -> Result<u32, RegAccessError> {
        match offset {
            reg::TASKS_KSGEN => Ok(self.regs.tasks_ksgen),
            reg::TASKS_CRYPT => Ok(self.regs.tasks_crypt),
            reg::TASKS_STOP => Ok(self.regs.tasks_stop),
            reg::TASKS_RATEOVERRIDE => Ok(self.regs.tasks_rateoverride),
            reg::EVENTS_ENDKSGEN => Ok(self.regs.events_endksgen),
            reg::EVENTS_ENDCRYPT => Ok(self.regs.events_endcrypt),
            reg::EVENTS_ERROR => Ok(self.regs.events_error),
            reg::SHORTS => Ok(self.regs.shorts),
            reg::INTENSET => Ok(self.regs.intenset),
            reg::INTENCLR => Ok(self.regs.intenclr),
            reg::MICSTATUS => Ok(self.regs.micstatus),
            reg::ENABLE => Ok(self.regs.enable),
            reg::MODE => Ok(self.regs.mode),
            reg::CNFPTR => Ok(self.regs.cnfptr),
            reg::INPTR => Ok(self.regs.inptr),
            reg::OUTPTR => Ok(self.regs.outptr),
            reg::SCRATCHPTR => Ok(self.regs.scratchptr),
            reg::MAXPACKETSIZE => Ok(self.regs.maxpacketsize),
            reg::RATEOVERRIDE => Ok(self.regs.rateoverride),
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
    /// decode to a CCM register.
    pub fn write_reg(
        &mut self,
        offset: u32,
        value: u32,
        ctx: &mut HwContext<'_>,
    ) -> Result<(), RegAccessError> {
        match offset {
            reg::TASKS_KSGEN => {
                self.regs.tasks_ksgen = value;
                if consume_strobe(&mut self.regs.tasks_ksgen) {
                    self.task_ksgen(ctx);
                }
            }
            reg::TASKS_CRYPT => {
                self.regs.tasks_crypt = value;
                if consume_strobe(&mut self.regs.tasks_crypt) {
                    self.task_crypt(ctx);
                }
            }
            reg::TASKS_STOP => {
                self.regs.tasks_stop = value;
                if consume_strobe(&mut self.regs.tasks_stop) {
                    self.task_stop(ctx);
                }
            }
            reg::TASKS_RATEOVERRIDE => {
                self.regs.tasks_rateoverride = value;
                if consume_strobe(&mut self.regs.tasks_rateoverride) {
                    self.task_rateoverride();
                }
            }
            reg::EVENTS_ENDKSGEN => self.regs.events_endksgen = value,
            reg::EVENTS_ENDCRYPT => self.regs.events_endcrypt = value,
            reg::EVENTS_ERROR => self.regs.events_error = value,
            reg::SHORTS => self.regs.shorts = value & SHORT_ENDKSGEN_CRYPT,
            reg::INTENSET => {
                self.regs.intenset = value;
                self.inten.apply_set(&mut self.regs.intenset);
            }
            reg::INTENCLR => {
                self.regs.intenclr = value;
                self.inten
                    .apply_clr(&mut self.regs.intenset, &mut self.regs.intenclr);
            }
            // The model owns MICSTATUS; firmware writes are dropped.
            reg::MICSTATUS => {}
            reg::ENABLE => self.regs.enable = value & 0x3,
            reg::MODE => {
                self.regs.mode = value
                    & (MODE_DECRYPT
                        | MODE_DATARATE_MASK << MODE_DATARATE_SHIFT
                        | MODE_LENGTH_EXTENDED);
            }
            reg::CNFPTR => self.regs.cnfptr = value,
            reg::INPTR => self.regs.inptr = value,
            reg::OUTPTR => self.regs.outptr = value,
            reg::SCRATCHPTR => self.regs.scratchptr = value,
            reg::MAXPACKETSIZE => self.regs.maxpacketsize = value & 0xFF,
            reg::RATEOVERRIDE => self.regs.rateoverride = value & MODE_DATARATE_MASK,
            offset => return Err(RegAccessError::UnknownRegister { offset }),
        }
        Ok(())
    }

    /// KSGEN task: generate the keystream for the configured packet.
    ///
    /// Silently ignored unless ENABLE holds the active encoding. The
    /// keystream is written to the scratch area immediately but only becomes
    /// valid for CRYPT once the completion timer fires and ENDKSGEN is
    /// raised.
    pub fn task_ksgen(&mut self, ctx: &mut HwContext<'_>) {
        if self.regs.enable != ENABLE_ACTIVE {
            return;
        }

        // A restarted generation invalidates whatever the scratch area held.
        self.keystream_valid = false;

        let config = self.read_config(ctx);
        let max_payload = self.effective_max_payload();
        let blocks = 1 + max_payload.div_ceil(16);
        // MAXPACKETSIZE is an 8-bit field, so the payload bound fits usize.
        #[allow(clippy::cast_possible_truncation)]
        let keystream = crypto::generate_keystream(ctx.cipher, &config, max_payload as usize);
        ctx.mem.write(self.regs.scratchptr, &keystream);

        ctx.trace.record(
            ctx.scheduler.now(),
            &TraceEvent::CcmKeystreamGenerated { blocks },
        );

        self.state = CcmState::Ksgen;
        let deadline =
            ctx.scheduler.now() + KSGEN_OVERHEAD_US + KSGEN_PER_BLOCK_US * SimTime::from(blocks);
        self.arm(ctx, deadline);
    }

    /// CRYPT task: encrypt the input packet, or arm a decryption that the
    /// radio packet hook will complete.
    ///
    /// Silently ignored unless ENABLE holds the active encoding. Raises
    /// ERROR when no completed keystream is available.
    pub fn task_crypt(&mut self, ctx: &mut HwContext<'_>) {
        if self.regs.enable != ENABLE_ACTIVE {
            return;
        }
        if !self.keystream_valid {
            self.fail(ctx, CcmErrorCause::KeystreamInvalid);
            return;
        }

        if self.regs.mode & MODE_DECRYPT == 0 {
            self.encrypt_packet(ctx);
        } else {
            self.state = CcmState::AwaitPacket;
        }
    }

    /// STOP task: cancel the operation in flight.
    ///
    /// Idempotent; a no-op when idle. Unlike the resolver, the engine raises
    /// no event on cancellation.
    pub fn task_stop(&mut self, ctx: &mut HwContext<'_>) {
        if matches!(self.state, CcmState::Idle) {
            return;
        }

        self.state = CcmState::Idle;
        self.pending_mic_ok = None;
        self.timer.disarm();
        ctx.scheduler.timer_changed(TimerId::Ccm, TIME_NEVER);
    }

    /// RATEOVERRIDE task: latch the RATEOVERRIDE register's rate for the
    /// next crypt operation only. Configuration only, not time-consuming.
    pub fn task_rateoverride(&mut self) {
        self.rate_override = Some(DataRate::from_bits(self.regs.rateoverride));
    }

    /// Radio notification that a packet finished arriving.
    ///
    /// Ignored unless a decryption is waiting for it. A failed CRC abandons
    /// the crypt silently: corrupted payloads never enter the crypto path and
    /// no event fires. A clean packet is decrypted immediately, with ENDCRYPT
    /// and MICSTATUS published when the completion timer fires.
    pub fn radio_packet_received(&mut self, crc_ok: bool, ctx: &mut HwContext<'_>) {
        if !matches!(self.state, CcmState::AwaitPacket) {
            return;
        }

        if !crc_ok {
            self.state = CcmState::Idle;
            ctx.trace
                .record(ctx.scheduler.now(), &TraceEvent::CcmPacketDiscarded);
            return;
        }

        self.decrypt_packet(ctx);
    }

    /// Completion handler, invoked by the host scheduler exactly when the
    /// armed deadline is reached.
    pub fn timer_fired(&mut self, ctx: &mut HwContext<'_>) {
        let completed = self.state;
        self.state = CcmState::Idle;
        self.timer.disarm();
        ctx.scheduler.timer_changed(TimerId::Ccm, TIME_NEVER);

        match completed {
            CcmState::Ksgen => {
                self.keystream_valid = true;
                self.signal_endksgen(ctx);
                if self.regs.shorts & SHORT_ENDKSGEN_CRYPT != 0 {
                    self.task_crypt(ctx);
                }
            }
            CcmState::Crypt => {
                if let Some(mic_ok) = self.pending_mic_ok.take() {
                    self.regs.micstatus = u32::from(mic_ok);
                }
                self.signal_endcrypt(ctx);
            }
            CcmState::Idle | CcmState::AwaitPacket => {}
        }
    }

    fn encrypt_packet(&mut self, ctx: &mut HwContext<'_>) {
        let config = self.read_config(ctx);
        let header = ctx.mem.read_u8(self.regs.inptr);
        let payload_len = u32::from(ctx.mem.read_u8(self.regs.inptr + 1));
        if payload_len > self.effective_max_payload() {
            self.fail(ctx, CcmErrorCause::PayloadTooLong);
            return;
        }

        // The length register is an 8-bit field, so it fits any usize.
        #[allow(clippy::cast_possible_truncation)]
        let payload_bytes = payload_len as usize;
        let mut payload = ctx
            .mem
            .read_vec(self.regs.inptr + PACKET_HEADER_BYTES, payload_bytes);
        let s0: [u8; 16] = ctx.mem.read_array(self.regs.scratchptr);
        let mic = crypto::compute_mic(ctx.cipher, &config, header, &payload, &s0);
        let keystream = ctx
            .mem
            .read_vec(self.regs.scratchptr, crypto::BLOCK_BYTES + payload_bytes);
        crypto::apply_keystream(&mut payload, &keystream);

        let out_len = payload_len + MIC_BYTES;
        ctx.mem.write_u8(self.regs.outptr, header);
        // Payload length is 8 bits and MIC_BYTES keeps the sum in range.
        #[allow(clippy::cast_possible_truncation)]
        ctx.mem.write_u8(self.regs.outptr + 1, out_len as u8);
        ctx.mem.write_u8(self.regs.outptr + 2, 0);
        ctx.mem
            .write(self.regs.outptr + PACKET_HEADER_BYTES, &payload);
        ctx.mem
            .write(self.regs.outptr + PACKET_HEADER_BYTES + payload_len, &mic);

        ctx.trace.record(
            ctx.scheduler.now(),
            &TraceEvent::CcmEncrypted {
                payload_bytes: payload_len,
            },
        );

        self.pending_mic_ok = None;
        self.state = CcmState::Crypt;
        let deadline = ctx.scheduler.now()
            + CRYPT_OVERHEAD_US
            + self.take_crypt_rate().cost_per_byte() * SimTime::from(out_len);
        self.arm(ctx, deadline);
    }

    fn decrypt_packet(&mut self, ctx: &mut HwContext<'_>) {
        let config = self.read_config(ctx);
        let header = ctx.mem.read_u8(self.regs.inptr);
        let in_len = u32::from(ctx.mem.read_u8(self.regs.inptr + 1));
        if in_len < MIC_BYTES {
            self.fail(ctx, CcmErrorCause::PacketTooShort);
            return;
        }
        let payload_len = in_len - MIC_BYTES;
        if payload_len > self.effective_max_payload() {
            self.fail(ctx, CcmErrorCause::PayloadTooLong);
            return;
        }

        // The length register is an 8-bit field, so it fits any usize.
        #[allow(clippy::cast_possible_truncation)]
        let payload_bytes = payload_len as usize;
        let mut payload = ctx
            .mem
            .read_vec(self.regs.inptr + PACKET_HEADER_BYTES, payload_bytes);
        let received_mic: [u8; 4] = ctx
            .mem
            .read_array(self.regs.inptr + PACKET_HEADER_BYTES + payload_len);

        let keystream = ctx
            .mem
            .read_vec(self.regs.scratchptr, crypto::BLOCK_BYTES + payload_bytes);
        crypto::apply_keystream(&mut payload, &keystream);

        let s0: [u8; 16] = ctx.mem.read_array(self.regs.scratchptr);
        let mic = crypto::compute_mic(ctx.cipher, &config, header, &payload, &s0);
        let mic_ok = mic == received_mic;

        ctx.mem.write_u8(self.regs.outptr, header);
        // Bounded by the 8-bit input length field.
        #[allow(clippy::cast_possible_truncation)]
        ctx.mem.write_u8(self.regs.outptr + 1, payload_len as u8);
        ctx.mem.write_u8(self.regs.outptr + 2, 0);
        ctx.mem
            .write(self.regs.outptr + PACKET_HEADER_BYTES, &payload);

        ctx.trace.record(
            ctx.scheduler.now(),
            &TraceEvent::CcmDecrypted {
                payload_bytes: payload_len,
                mic_ok,
            },
        );

        self.pending_mic_ok = Some(mic_ok);
        self.state = CcmState::Crypt;
        let deadline = ctx.scheduler.now()
            + CRYPT_OVERHEAD_US
            + self.take_crypt_rate().cost_per_byte() * SimTime::from(in_len);
        self.arm(ctx, deadline);
    }

    fn fail(&mut self, ctx: &mut HwContext<'_>, cause: CcmErrorCause) {
        self.state = CcmState::Idle;
        ctx.trace
            .record(ctx.scheduler.now(), &TraceEvent::CcmError { cause });
        self.signal_error(ctx);
    }

    fn arm(&mut self, ctx: &mut HwContext<'_>, deadline: SimTime) {
        self.timer.arm(deadline);
        ctx.scheduler.timer_changed(TimerId::Ccm, deadline);
    }

    fn read_config(&self, ctx: &HwContext<'_>) -> CcmConfig {
        let raw: [u8; CONFIG_BYTES] = ctx.mem.read_array(self.regs.cnfptr);
        CcmConfig::from_bytes(&raw)
    }

    const fn effective_max_payload(&self) -> u32 {
        if self.regs.mode & MODE_LENGTH_EXTENDED == 0 {
            DEFAULT_MAX_PAYLOAD
        } else {
            self.regs.maxpacketsize
        }
    }

    /// The rate charged for the next crypt: a latched override wins once,
    /// otherwise MODE's data-rate field applies.
    fn take_crypt_rate(&mut self) -> DataRate {
        self.rate_override
            .take()
            .unwrap_or_else(|| DataRate::from_bits(self.regs.mode >> MODE_DATARATE_SHIFT))
    }

    fn signal_endksgen(&mut self, ctx: &mut HwContext<'_>) {
        self.regs.events_endksgen = 1;
        ctx.ppi.publish(PpiEvent::CcmEndKsgen);
        if self.inten.is_set(INT_ENDKSGEN) {
            ctx.irq.raise(CCM_AAR_IRQ);
        }
    }

    fn signal_endcrypt(&mut self, ctx: &mut HwContext<'_>) {
        self.regs.events_endcrypt = 1;
        ctx.ppi.publish(PpiEvent::CcmEndCrypt);
        if self.inten.is_set(INT_ENDCRYPT) {
            ctx.irq.raise(CCM_AAR_IRQ);
        }
    }

    fn signal_error(&mut self, ctx: &mut HwContext<'_>) {
        self.regs.events_error = 1;
        ctx.ppi.publish(PpiEvent::CcmError);
        if self.inten.is_set(INT_ERROR) {
            ctx.irq.raise(CCM_AAR_IRQ);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Ccm, CcmRegisters, DataRate};

    #[test]
    fn rate_field_decodes_all_encodings() {
        assert_eq!(DataRate::from_bits(0), DataRate::OneMbit);
        assert_eq!(DataRate::from_bits(1), DataRate::TwoMbit);
        assert_eq!(DataRate::from_bits(2), DataRate::Kbit125);
        assert_eq!(DataRate::from_bits(3), DataRate::Kbit500);
        assert_eq!(DataRate::from_bits(0x101), DataRate::TwoMbit);
    }

    #[test]
    fn rate_costs_scale_with_air_time() {
        assert_eq!(DataRate::OneMbit.cost_per_byte(), 8);
        assert_eq!(DataRate::TwoMbit.cost_per_byte(), 4);
        assert_eq!(DataRate::Kbit125.cost_per_byte(), 64);
        assert_eq!(DataRate::Kbit500.cost_per_byte(), 16);
    }

    #[test]
    fn power_on_state_matches_reset_values() {
        let ccm = Ccm::new();
        assert!(!ccm.is_running());
        assert_eq!(ccm.next_wake(), crate::time::TIME_NEVER);
        assert_eq!(ccm.regs().maxpacketsize, 0xFB);
        assert_eq!(ccm.regs().micstatus, 0);
        assert_eq!(*ccm.regs(), CcmRegisters::default());
    }
}
