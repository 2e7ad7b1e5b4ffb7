//! # Field Entry Encoding
//!
//! One encoded field entry is a single header byte followed by a varint
//! value:
//!
//! ```text
//! +--------------------------------+------------------------+
//! | header (1 byte)                | value (1-5 byte varint)|
//! | bit 7: last-field flag         |                        |
//! | bits 0-6: tag (0-126)          |                        |
//! +--------------------------------+------------------------+
//! ```
//!
//! Tag 127 is reserved, so a structure can carry at most 127 distinct
//! fields. The tag header and the value are decoded by separate functions
//! so a scanning caller can look at the tag first and then either decode
//! the value or skip past it (skipping still decodes enough of the varint
//! to learn its length).
//!
//! For out-of-line fields the value stored here is the already-scaled
//! delta (build time) or the absolute reference (runtime); this layer
//! never interprets it.

use eyre::{ensure, Result};

use crate::encoding::varint::{decode_varint, encode_varint, varint_len};

/// Bit 7 of the header byte: this entry is the last field of the structure.
pub const LAST_FIELD_FLAG: u8 = 0x80;

/// Bits 0-6 of the header byte: the field tag.
pub const TAG_MASK: u8 = 0x7F;

/// Returns the encoded size of one field entry carrying `value`.
pub fn field_len(value: u32) -> usize {
    1 + varint_len(value)
}

/// Encodes one field entry into `buf`, returning the number of bytes
/// written (always `field_len(value)`).
///
/// The caller must have reserved exactly that many bytes; a short buffer
/// is a buffer-overrun bug and panics on the slice write.
pub fn encode_field(buf: &mut [u8], tag: u8, last: bool, value: u32) -> usize {
    debug_assert!(tag & !TAG_MASK == 0, "field tag {tag} exceeds 7 bits");
    buf[0] = tag | if last { LAST_FIELD_FLAG } else { 0 };
    1 + encode_varint(value, &mut buf[1..])
}

/// Decodes the header byte of a field entry, returning (tag, last_field).
/// Consumes exactly one byte.
pub fn decode_field_tag(buf: &[u8]) -> Result<(u8, bool)> {
    ensure!(!buf.is_empty(), "empty buffer for field header decode");
    Ok((buf[0] & TAG_MASK, buf[0] & LAST_FIELD_FLAG != 0))
}

/// Decodes the varint value that follows a field header, returning
/// (value, bytes_read). Also used to skip a non-matching field.
pub fn decode_field_value(buf: &[u8]) -> Result<(u32, usize)> {
    decode_varint(buf)
}
