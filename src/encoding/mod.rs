//! # Encoding Module
//!
//! This module provides the two leaf codecs of the optional-field format:
//!
//! - **Varint encoding**: 1-5 byte continuation-bit encoding of unsigned
//!   32-bit integers, seven value bits per byte
//! - **Field encoding**: one header byte (tag + last-field flag) followed
//!   by a varint value
//!
//! Both codecs are pure functions over byte slices with no shared state.

pub mod field;
pub mod varint;

pub use field::{
    decode_field_tag, decode_field_value, encode_field, field_len, LAST_FIELD_FLAG, TAG_MASK,
};
pub use varint::{decode_varint, encode_varint, varint_len, MAX_VARINT_LEN};
