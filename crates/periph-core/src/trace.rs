//! Leveled, timestamped diagnostic tracing.
//!
//! Best-effort and non-functional: the models describe what they are doing
//! through structured events and the host decides what to do with them. The
//! default [`NullTraceSink`] discards everything.

use crate::ccm::CcmErrorCause;
use crate::time::SimTime;

/// Trace verbosity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TraceLevel {
    /// Outcome-level records (one per operation).
    Info,
    /// Per-step records (one per key examined, per block generated).
    Debug,
}

/// Structured diagnostic events emitted by the peripheral models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// The AAR began resolving an over-the-air address.
    AarResolving {
        /// The 6-byte address, least-significant byte first.
        address: [u8; 6],
    },
    /// The address under resolution is not a resolvable private address.
    AarNotResolvable {
        /// The 24-bit prand field extracted from the address.
        prand: u32,
    },
    /// One identity-resolving key was checked against the address hash.
    AarKeyChecked {
        /// Index of the key in the configured table.
        index: u32,
        /// 24-bit hash carried in the address.
        hash: u32,
        /// 24-bit hash computed from the key.
        hash_check: u32,
    },
    /// A key matched the address.
    AarMatched {
        /// Index of the matching key.
        index: u32,
        /// Declared table length.
        total: u32,
    },
    /// No key in the table matched the address.
    AarUnmatched {
        /// Declared table length.
        total: u32,
    },
    /// The CCM engine generated a keystream into its scratch area.
    CcmKeystreamGenerated {
        /// Number of 16-byte blocks written.
        blocks: u32,
    },
    /// The CCM engine encrypted an outgoing packet.
    CcmEncrypted {
        /// Cleartext payload length in bytes.
        payload_bytes: u32,
    },
    /// The CCM engine decrypted a received packet.
    CcmDecrypted {
        /// Decrypted payload length in bytes.
        payload_bytes: u32,
        /// Whether the received MIC verified.
        mic_ok: bool,
    },
    /// The CCM engine discarded a received packet with a failed CRC.
    CcmPacketDiscarded,
    /// The CCM engine rejected an operation.
    CcmError {
        /// Why the operation was rejected.
        cause: CcmErrorCause,
    },
}

impl TraceEvent {
    /// The verbosity tier this event is recorded at.
    #[must_use]
    pub const fn level(&self) -> TraceLevel {
        match self {
            Self::AarResolving { .. } | Self::AarKeyChecked { .. } => TraceLevel::Debug,
            Self::AarNotResolvable { .. }
            | Self::AarMatched { .. }
            | Self::AarUnmatched { .. }
            | Self::CcmKeystreamGenerated { .. }
            | Self::CcmEncrypted { .. }
            | Self::CcmDecrypted { .. }
            | Self::CcmPacketDiscarded
            | Self::CcmError { .. } => TraceLevel::Info,
        }
    }
}

/// Sink for timestamped diagnostic records.
pub trait TraceSink {
    /// Records `event` as of simulated time `time`.
    fn record(&mut self, time: SimTime, event: &TraceEvent);
}

/// Sink that discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn record(&mut self, _time: SimTime, _event: &TraceEvent) {}
}
