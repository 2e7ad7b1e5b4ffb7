//! # Field Tags and Format Constants
//!
//! A field tag is a 7-bit identifier (0-126) selecting a field's semantic
//! kind; the value 127 is reserved so the header byte can never be 0xFF.
//! This crate does not assign meaning to tags: callers define their own
//! closed tag enumeration and map it onto `FieldTag` values.
//!
//! ## Anchor Constants
//!
//! Out-of-line references are encoded as deltas from a base-address anchor
//! word interleaved into the record stream. Anchor words live only at arena
//! offsets that are a multiple of the anchor alignment (default 128 bytes),
//! so the anchor governing any structure is found by masking the low-order
//! bits off the structure's own offset. Raising the alignment stores fewer
//! anchors but widens the average delta; lowering it does the reverse. The
//! alignment must leave room for the 8-byte anchor word plus at least one
//! structure, so the minimum shift is 4 (16 bytes).

use eyre::{ensure, Result};

/// Largest valid field tag; 127 is reserved.
pub const MAX_TAG: u8 = 126;

/// Number of slots in a tag-indexed sparse field array.
pub const TAG_LIMIT: usize = MAX_TAG as usize + 1;

/// Size in bytes of an anchor word (a little-endian u64 arena offset).
pub const ANCHOR_WORD_BYTES: usize = 8;

/// Default power-of-two shift for anchor placement: anchors every 128 bytes.
pub const DEFAULT_ANCHOR_ALIGNMENT_SHIFT: u32 = 7;

/// Smallest supported anchor alignment shift (16-byte boundaries).
pub const MIN_ANCHOR_ALIGNMENT_SHIFT: u32 = 4;

/// Identifier for one kind of optional field, in the range 0-126.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldTag(u8);

impl FieldTag {
    /// Creates a tag from its raw 7-bit value. Rejects values above
    /// [`MAX_TAG`]; 127 is the reserved "no tag space left" value.
    pub fn new(raw: u8) -> Result<Self> {
        ensure!(
            raw <= MAX_TAG,
            "field tag {} out of range: tags occupy 7 bits and 127 is reserved",
            raw
        );
        Ok(Self(raw))
    }

    /// The raw 7-bit tag value.
    pub fn raw(self) -> u8 {
        self.0
    }

    /// The tag as a slot-array index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for FieldTag {
    type Error = eyre::Report;

    fn try_from(raw: u8) -> Result<Self> {
        Self::new(raw)
    }
}

impl std::fmt::Display for FieldTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
