//! # FieldSet - Build-Time Field Collection
//!
//! A `FieldSet` collects the (tag, value) pairs destined for one encoded
//! structure before the layout manager turns them into bytes. Fields are
//! tracked in a fixed tag-indexed slot array (at most one entry per tag)
//! plus an insertion-order list; entries are encoded in the order they
//! were added, and the entry added last carries the last-field flag.
//!
//! ## Field Kinds
//!
//! | Kind | Payload | Encoded as |
//! |------|---------|------------|
//! | **Inline** | value meaningful at 32 bits | the value itself |
//! | **Out-of-line** | owned data blob + natural alignment | scaled delta from the governing anchor |
//!
//! Out-of-line blobs are moved into the layout manager's shared region
//! during planning; the slot keeps the assigned region offset so the
//! perform phase can compute the delta.

use eyre::{ensure, Result};
use smallvec::SmallVec;

use crate::fields::types::{FieldTag, TAG_LIMIT};

/// One tag's slot in a [`FieldSet`].
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    Empty,
    Inline(u32),
    Outline {
        data: Vec<u8>,
        align: usize,
        /// Offset within the shared out-of-line region, assigned by the
        /// layout manager during planning.
        region_offset: Option<u32>,
    },
}

/// A caller-assembled collection of optional fields to encode into one
/// structure.
#[derive(Debug, Clone)]
pub struct FieldSet {
    slots: Vec<Slot>,
    order: SmallVec<[FieldTag; 8]>,
    outline_count: usize,
    encoded: bool,
}

impl FieldSet {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::Empty; TAG_LIMIT],
            order: SmallVec::new(),
            outline_count: 0,
            encoded: false,
        }
    }

    /// Adds an inline field whose 32-bit value is stored directly in the
    /// record stream. Adding the same tag twice is an error.
    pub fn add_inline(&mut self, tag: FieldTag, value: u32) -> Result<()> {
        self.claim_slot(tag)?;
        self.slots[tag.index()] = Slot::Inline(value);
        Ok(())
    }

    /// Adds an out-of-line field. `data` is the naturally-aligned record
    /// stored in the shared out-of-line region; `align` is its required
    /// alignment (a nonzero power of two) and also the scale applied to
    /// the encoded delta.
    pub fn add_outline(&mut self, tag: FieldTag, data: Vec<u8>, align: usize) -> Result<()> {
        ensure!(
            align.is_power_of_two(),
            "out-of-line alignment {} is not a power of two",
            align
        );
        self.claim_slot(tag)?;
        self.slots[tag.index()] = Slot::Outline {
            data,
            align,
            region_offset: None,
        };
        self.outline_count += 1;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn field_count(&self) -> usize {
        self.order.len()
    }

    pub fn has_outline_fields(&self) -> bool {
        self.outline_count > 0
    }

    pub fn contains(&self, tag: FieldTag) -> bool {
        !matches!(self.slots[tag.index()], Slot::Empty)
    }

    fn claim_slot(&mut self, tag: FieldTag) -> Result<()> {
        ensure!(!self.encoded, "field set has already been encoded");
        ensure!(
            !self.contains(tag),
            "field tag {} added twice to the same structure",
            tag
        );
        self.order.push(tag);
        Ok(())
    }

    /// Tags in insertion order; the final tag carries the last-field flag.
    pub(crate) fn tag_order(&self) -> &[FieldTag] {
        &self.order
    }

    pub(crate) fn slot(&self, tag: FieldTag) -> &Slot {
        &self.slots[tag.index()]
    }

    pub(crate) fn slot_mut(&mut self, tag: FieldTag) -> &mut Slot {
        &mut self.slots[tag.index()]
    }

    pub(crate) fn is_encoded(&self) -> bool {
        self.encoded
    }

    pub(crate) fn mark_encoded(&mut self) {
        self.encoded = true;
    }
}

impl Default for FieldSet {
    fn default() -> Self {
        Self::new()
    }
}
