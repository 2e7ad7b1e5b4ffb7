//! # Variable-Length Integer Encoding
//!
//! This module provides variable-length encoding of unsigned 32-bit integers,
//! used for optional field values and out-of-line reference deltas. Values are
//! encoded in little-endian base-128 chunks: each byte carries 7 payload bits
//! and a continuation flag in the high bit.
//!
//! ## Encoding Format
//!
//! | Value Range               | Bytes | Significant Bits |
//! |---------------------------|-------|------------------|
//! | 0 - 0x7F                  | 1     | 0 - 7            |
//! | 0x80 - 0x3FFF             | 2     | 8 - 14           |
//! | 0x4000 - 0x1F_FFFF        | 3     | 15 - 21          |
//! | 0x20_0000 - 0x0FFF_FFFF   | 4     | 22 - 28          |
//! | 0x1000_0000 - u32::MAX    | 5     | 29 - 32          |
//!
//! The encoding is self-describing: no length prefix is stored, and the
//! decoder recovers the byte count from the continuation bits alone. The
//! fifth byte of a 5-byte encoding carries at most 4 payload bits, so a
//! fifth byte above 0x0F (or with its continuation bit set) is malformed.
//!
//! ## Boundary Values
//!
//! Key boundary values for testing:
//!
//! - 0x7F: maximum 1-byte value
//! - 0x80: minimum 2-byte value
//! - 0x3FFF: maximum 2-byte value
//! - 0x4000: minimum 3-byte value
//! - 0x1F_FFFF: maximum 3-byte value
//! - 0x20_0000: minimum 4-byte value
//! - 0x0FFF_FFFF: maximum 4-byte value
//! - 0x1000_0000: minimum 5-byte value
//! - u32::MAX: maximum 5-byte value
//!
//! ## Zero-Copy Design
//!
//! All functions operate on byte slices directly:
//! - `encode_varint` writes to a mutable slice, returns bytes written
//! - `decode_varint` reads from a slice, returns (value, bytes_read)
//! - `varint_len` computes length without any I/O
//!
//! No heap allocations are performed by any function in this module, and all
//! functions are pure and stateless.

use eyre::{bail, ensure, Result};

/// Maximum number of bytes a 32-bit varint can occupy.
pub const MAX_VARINT_LEN: usize = 5;

/// Returns the number of bytes needed to encode `value`.
pub fn varint_len(value: u32) -> usize {
    if value < 1 << 7 {
        1
    } else if value < 1 << 14 {
        2
    } else if value < 1 << 21 {
        3
    } else if value < 1 << 28 {
        4
    } else {
        5
    }
}

/// Encodes `value` into `buf`, returning the number of bytes written.
///
/// The caller must have reserved at least `varint_len(value)` bytes;
/// a short buffer is a buffer-overrun bug and panics on the slice write.
pub fn encode_varint(value: u32, buf: &mut [u8]) -> usize {
    let mut v = value;
    let mut i = 0;
    loop {
        let chunk = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            buf[i] = chunk;
            return i + 1;
        }
        buf[i] = chunk | 0x80;
        i += 1;
    }
}

/// Decodes a varint from the start of `buf`, returning (value, bytes_read).
pub fn decode_varint(buf: &[u8]) -> Result<(u32, usize)> {
    ensure!(!buf.is_empty(), "empty buffer for varint decode");

    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        ensure!(i < buf.len(), "truncated varint after {} bytes", i);
        let byte = buf[i];
        if i == MAX_VARINT_LEN - 1 {
            // Fifth byte holds the top 4 bits of a u32 and must terminate.
            ensure!(
                byte & 0x80 == 0,
                "varint continuation bit set in fifth byte"
            );
            ensure!(byte <= 0x0F, "varint overflows 32 bits: fifth byte {byte:#x}");
        }
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    bail!("varint longer than {} bytes", MAX_VARINT_LEN)
}
