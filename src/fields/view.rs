//! # FieldsView - Zero-Copy Optional Field Access
//!
//! `FieldsView` reads an encoded structure in place, with no allocation.
//! It holds a reference to the arena containing the structure and the
//! structure's offset within it; an absent view (the owner's null
//! reference) answers every query with the caller's default.
//!
//! Lookups are linear scans over the field entries, which is cheap because
//! structures typically hold fewer than ten fields. The scan stops at the
//! first entry whose header carries the last-field flag.
//!
//! ## Out-of-Line Resolution
//!
//! For an out-of-line field the stored value is a delta scaled by the
//! referenced record's natural alignment. The governing anchor word is
//! found by masking the structure's own arena offset down to the anchor
//! alignment boundary; the anchor holds the arena offset of its base
//! record, so the referenced record lives at `anchor + delta * align`.
//! This resolution is only meaningful for structures placed by the layout
//! manager; structures encoded by [`RuntimeFieldSet`] store absolute
//! references and are read back with [`RuntimeFieldSet::decode`].
//!
//! [`RuntimeFieldSet`]: crate::fields::runtime::RuntimeFieldSet
//! [`RuntimeFieldSet::decode`]: crate::fields::runtime::RuntimeFieldSet::decode
//!
//! ## Thread Safety
//!
//! A view borrows the arena immutably; any number of views may scan the
//! same placed image concurrently.

use eyre::{ensure, Result};

use crate::encoding::field::{decode_field_tag, decode_field_value};
use crate::fields::types::{FieldTag, ANCHOR_WORD_BYTES, DEFAULT_ANCHOR_ALIGNMENT_SHIFT};

#[derive(Debug, Clone, Copy)]
pub struct FieldsView<'a> {
    arena: &'a [u8],
    offset: Option<usize>,
    anchor_mask: usize,
    /// The structure was placed by the layout manager, so anchor words
    /// exist on alignment boundaries. Standalone buffers have none.
    anchored: bool,
}

impl<'a> FieldsView<'a> {
    pub(crate) fn new(arena: &'a [u8], offset: Option<usize>, align_shift: u32) -> Self {
        Self {
            arena,
            offset,
            anchor_mask: (1usize << align_shift) - 1,
            anchored: true,
        }
    }

    /// A view over a single structure encoded outside of image layout
    /// (for example by `RuntimeFieldSet::encode`). Inline queries work
    /// unchanged; `get_outline` is an error, since a standalone buffer has
    /// no anchor words to resolve against.
    pub fn standalone(bytes: &'a [u8]) -> Self {
        Self {
            anchored: false,
            ..Self::new(bytes, Some(0), DEFAULT_ANCHOR_ALIGNMENT_SHIFT)
        }
    }

    /// The null reference: a view with no structure behind it.
    pub fn absent() -> FieldsView<'static> {
        FieldsView::new(&[], None, DEFAULT_ANCHOR_ALIGNMENT_SHIFT)
    }

    pub fn is_absent(&self) -> bool {
        self.offset.is_none()
    }

    /// Returns the value of the inline field `tag`, or `default` if the
    /// view is absent or the tag is not present. A miss is the common,
    /// expected outcome, not an error; `Err` means the underlying bytes
    /// are truncated.
    pub fn get_inline(&self, tag: FieldTag, default: u32) -> Result<u32> {
        Ok(self.scan(tag)?.unwrap_or(default))
    }

    /// Resolves the out-of-line field `tag` to the arena offset of its
    /// record, or `None` if the view is absent or the tag is not present.
    /// `required_align` must match the alignment the record was stored
    /// with, since it undoes the delta scaling.
    pub fn get_outline(&self, tag: FieldTag, required_align: usize) -> Result<Option<usize>> {
        ensure!(
            required_align.is_power_of_two(),
            "out-of-line alignment {} is not a power of two",
            required_align
        );
        let Some(start) = self.offset else {
            return Ok(None);
        };
        ensure!(
            self.anchored,
            "standalone structure has no anchor words: out-of-line values are \
             absolute and must be read through the runtime decoder"
        );
        let Some(delta) = self.scan(tag)? else {
            return Ok(None);
        };

        // Anchor words sit exactly on alignment boundaries, and no
        // structure crosses a boundary ahead of its anchor, so masking the
        // structure offset always lands on the governing anchor.
        let anchor_offset = start & !self.anchor_mask;
        ensure!(
            anchor_offset + ANCHOR_WORD_BYTES <= self.arena.len(),
            "arena truncated before anchor word at offset {}",
            anchor_offset
        );
        let word: [u8; ANCHOR_WORD_BYTES] = self.arena
            [anchor_offset..anchor_offset + ANCHOR_WORD_BYTES]
            .try_into()
            .expect("slice length fixed above");
        let base = u64::from_le_bytes(word) as usize;

        Ok(Some(base + delta as usize * required_align))
    }

    /// Linear scan for `tag`, returning its raw value. Stops after the
    /// entry flagged as last; bytes beyond it are never read.
    fn scan(&self, tag: FieldTag) -> Result<Option<u32>> {
        let Some(start) = self.offset else {
            return Ok(None);
        };

        let mut cursor = start;
        loop {
            let (entry_tag, last) = decode_field_tag(&self.arena[cursor..])?;
            cursor += 1;
            let (value, len) = decode_field_value(&self.arena[cursor..])?;
            cursor += len;

            if entry_tag == tag.raw() {
                return Ok(Some(value));
            }
            if last {
                return Ok(None);
            }
        }
    }
}
