//! Resolvable-private-address hash check over an ordered key table.

use crate::api::BlockCipher;
use crate::memory::SimMemory;
use crate::time::SimTime;
use crate::trace::{TraceEvent, TraceSink};

/// The resolver always assumes S0, LENGTH and S1 occupy three bytes in front
/// of the over-the-air address, independent of the radio configuration.
const ADDRESS_HEADER_BYTES: u32 = 3;

/// Bytes per identity-resolving key.
pub const IRK_BYTES: u32 = 16;

/// Outcome of one resolution pass.
///
/// Computed synchronously when the START task triggers; the owning peripheral
/// publishes it to the STATUS register and event flags only when the
/// completion timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Index of the first key whose hash matched, when any did.
    pub matched: Option<u8>,
    /// Number of keys charged against the completion delay: matched index
    /// plus one on a match, the declared table length otherwise.
    pub examined: u32,
}

/// Scans the key table at `irkptr` against the address buffer at `addrptr`.
///
/// The address buffer holds the three header bytes followed by the 6-byte
/// address. The top two bits of the 24-bit prand field must be `01` for the
/// address to be resolvable at all; a non-resolvable address still charges
/// the full declared table length as its timing cost. Keys are consumed
/// strictly in index order and the first match wins.
pub(crate) fn scan(
    mem: &SimMemory,
    cipher: &dyn BlockCipher,
    trace: &mut dyn TraceSink,
    now: SimTime,
    addrptr: u32,
    irkptr: u32,
    nirk: u32,
) -> Resolution {
    let address = addrptr + ADDRESS_HEADER_BYTES;
    trace.record(
        now,
        &TraceEvent::AarResolving {
            address: mem.read_array(address),
        },
    );

    let prand = mem.read_u24_le(address + 3);
    if prand >> 22 != 0b01 {
        trace.record(now, &TraceEvent::AarNotResolvable { prand });
        return Resolution {
            matched: None,
            examined: nirk,
        };
    }

    // The cipher consumes big-endian blocks; prand occupies the three
    // least-significant byte positions.
    let prand_bytes = prand.to_le_bytes();
    let mut prand_block = [0u8; 16];
    prand_block[15] = prand_bytes[0];
    prand_block[14] = prand_bytes[1];
    prand_block[13] = prand_bytes[2];

    let hash = mem.read_u24_le(address);

    for index in 0..nirk {
        let key: [u8; 16] = mem.read_array(irkptr + IRK_BYTES * index);
        let output = cipher.encrypt_block(&key, &prand_block);
        let hash_check =
            u32::from(output[15]) | u32::from(output[14]) << 8 | u32::from(output[13]) << 16;

        trace.record(
            now,
            &TraceEvent::AarKeyChecked {
                index,
                hash,
                hash_check,
            },
        );

        if hash == hash_check {
            trace.record(now, &TraceEvent::AarMatched { index, total: nirk });
            // NIRK is a 5-bit field, so the index always fits.
            #[allow(clippy::cast_possible_truncation)]
            let matched = index as u8;
            return Resolution {
                matched: Some(matched),
                examined: index + 1,
            };
        }
    }

    trace.record(now, &TraceEvent::AarUnmatched { total: nirk });
    Resolution {
        matched: None,
        examined: nirk,
    }
}
