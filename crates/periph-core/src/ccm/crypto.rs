//! Link-layer CCM data path built on the external AES-128 primitive.
//!
//! CCM with a 4-byte MIC and 2-byte length field over a 13-byte nonce, as
//! the radio link layer uses it: the nonce carries the 39-bit packet counter
//! plus the direction bit followed by the session IV, and the single byte of
//! additional authenticated data is the packet header with its sequence bits
//! masked out.

use crate::api::BlockCipher;

/// Bytes of message-integrity check appended by encryption.
pub const MIC_BYTES: u32 = 4;

/// AES block size in bytes.
pub const BLOCK_BYTES: usize = 16;

/// Bytes occupied by the per-packet configuration block at CNFPTR.
pub const CONFIG_BYTES: usize = 33;

/// Header bits covered by the MIC (NESN, SN and MD are masked out).
const AAD_HEADER_MASK: u8 = 0xE3;

/// Per-packet CCM configuration, read from the block at CNFPTR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcmConfig {
    /// AES-128 key, big-endian as the cipher consumes it.
    pub key: [u8; 16],
    /// 39-bit packet counter, least-significant octet first.
    pub packet_counter: [u8; 5],
    /// Direction bit folded into the nonce.
    pub direction: bool,
    /// Session initialization vector.
    pub iv: [u8; 8],
}

impl CcmConfig {
    /// Decodes the 33-byte configuration layout: key, packet counter,
    /// direction flag byte, IV.
    #[must_use]
    pub fn from_bytes(raw: &[u8; CONFIG_BYTES]) -> Self {
        let mut key = [0u8; 16];
        key.copy_from_slice(&raw[..16]);
        let mut packet_counter = [0u8; 5];
        packet_counter.copy_from_slice(&raw[16..21]);
        let mut iv = [0u8; 8];
        iv.copy_from_slice(&raw[25..33]);
        Self {
            key,
            packet_counter,
            direction: raw[21] & 1 != 0,
            iv,
        }
    }

    /// Assembles the 13-byte nonce: counter octets least-significant first
    /// with the direction bit in the top bit of the fifth octet, then the IV.
    #[must_use]
    pub fn nonce(&self) -> [u8; 13] {
        let mut nonce = [0u8; 13];
        nonce[..5].copy_from_slice(&self.packet_counter);
        nonce[4] = nonce[4] & 0x7F | u8::from(self.direction) << 7;
        nonce[5..].copy_from_slice(&self.iv);
        nonce
    }
}

fn counter_block(nonce: &[u8; 13], counter: u16) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[0] = 0x01;
    block[1..14].copy_from_slice(nonce);
    block[14..].copy_from_slice(&counter.to_be_bytes());
    block
}

fn xor_into(acc: &mut [u8; 16], block: &[u8; 16]) {
    for (a, b) in acc.iter_mut().zip(block) {
        *a ^= b;
    }
}

/// Generates the keystream for payloads up to `max_payload` bytes.
///
/// The first block is S0 (consumed by the MIC), followed by enough counter
/// blocks to cover the maximum payload. The engine writes this buffer to its
/// scratch area when KSGEN triggers.
#[must_use]
pub fn generate_keystream(
    cipher: &dyn BlockCipher,
    config: &CcmConfig,
    max_payload: usize,
) -> Vec<u8> {
    let nonce = config.nonce();
    let blocks = 1 + max_payload.div_ceil(BLOCK_BYTES);
    let mut keystream = Vec::with_capacity(blocks * BLOCK_BYTES);
    for counter in 0..blocks {
        // The counter cannot exceed 17 blocks for the largest packet.
        #[allow(clippy::cast_possible_truncation)]
        let block = counter_block(&nonce, counter as u16);
        keystream.extend_from_slice(&cipher.encrypt_block(&config.key, &block));
    }
    keystream
}

/// Computes the 4-byte MIC over the cleartext payload.
///
/// CBC-MAC over B0, the one-byte masked-header AAD block and the padded
/// payload, whitened with `s0` (the first keystream block).
#[must_use]
pub fn compute_mic(
    cipher: &dyn BlockCipher,
    config: &CcmConfig,
    header: u8,
    payload: &[u8],
    s0: &[u8; 16],
) -> [u8; 4] {
    let nonce = config.nonce();

    let mut b0 = [0u8; 16];
    b0[0] = 0x49;
    b0[1..14].copy_from_slice(&nonce);
    // Payload length is bounded by the 8-bit packet length field.
    #[allow(clippy::cast_possible_truncation)]
    let length = payload.len() as u16;
    b0[14..].copy_from_slice(&length.to_be_bytes());

    let mut x = cipher.encrypt_block(&config.key, &b0);

    let mut b1 = [0u8; 16];
    b1[1] = 0x01;
    b1[2] = header & AAD_HEADER_MASK;
    xor_into(&mut x, &b1);
    x = cipher.encrypt_block(&config.key, &x);

    for chunk in payload.chunks(BLOCK_BYTES) {
        let mut block = [0u8; 16];
        block[..chunk.len()].copy_from_slice(chunk);
        xor_into(&mut x, &block);
        x = cipher.encrypt_block(&config.key, &x);
    }

    let mut mic = [0u8; 4];
    for (i, byte) in mic.iter_mut().enumerate() {
        *byte = x[i] ^ s0[i];
    }
    mic
}

/// XORs `data` in place with the payload keystream (everything after S0).
///
/// # Panics
///
/// Panics when `keystream` is shorter than `BLOCK_BYTES + data.len()`; the
/// engine always generates scratch keystreams sized for the configured
/// maximum payload.
pub fn apply_keystream(data: &mut [u8], keystream: &[u8]) {
    assert!(
        keystream.len() >= BLOCK_BYTES + data.len(),
        "keystream shorter than payload"
    );
    for (byte, key) in data.iter_mut().zip(&keystream[BLOCK_BYTES..]) {
        *byte ^= key;
    }
}
