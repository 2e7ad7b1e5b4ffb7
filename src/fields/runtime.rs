//! # RuntimeFieldSet - Execution-Time Encode/Decode
//!
//! The layout manager amortizes anchor words across a whole image, which
//! only works when every structure is laid out in one build pass. When a
//! structure must be materialized in isolation at execution time (for
//! example to attach optional fields to a dynamically synthesized type, or
//! to clone and extend an existing structure), this degenerate single-
//! structure codec is used instead: no anchors, no shared region, and
//! out-of-line fields are stored as absolute, unscaled references.
//!
//! The byte format is identical to the build-time one, so inline queries
//! through [`FieldsView::standalone`] work unchanged against the output.
//!
//! [`FieldsView::standalone`]: crate::fields::view::FieldsView::standalone
//!
//! ## Usage
//!
//! ```ignore
//! let mut fields = RuntimeFieldSet::decode(existing)?;
//! fields.set(extra_tag, value);
//! fields.clear(stale_tag);
//! let mut buf = vec![0u8; fields.encoding_size()];
//! fields.encode(&mut buf)?;
//! ```
//!
//! A `RuntimeFieldSet` is a plain mutable value; sharing one across
//! threads requires external synchronization.

use eyre::{bail, ensure, Result};

use crate::encoding::field::{decode_field_tag, decode_field_value, encode_field, field_len};
use crate::fields::types::{FieldTag, MAX_TAG, TAG_LIMIT};

/// Sparse tag-indexed array of raw field values: the inline value, or the
/// absolute reference for out-of-line data.
#[derive(Debug, Clone)]
pub struct RuntimeFieldSet {
    slots: Vec<Option<u32>>,
}

impl RuntimeFieldSet {
    pub fn new() -> Self {
        Self {
            slots: vec![None; TAG_LIMIT],
        }
    }

    /// Reads an existing encoded structure into a mutable sparse array.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure!(
            !bytes.is_empty(),
            "cannot decode an empty structure: absent fields are a null reference"
        );

        let mut fields = Self::new();
        let mut cursor = 0;
        loop {
            let (tag, last) = decode_field_tag(&bytes[cursor..])?;
            ensure!(
                tag <= MAX_TAG,
                "reserved field tag 127 in encoded structure"
            );
            cursor += 1;
            let (value, len) = decode_field_value(&bytes[cursor..])?;
            cursor += len;

            fields.slots[tag as usize] = Some(value);
            if last {
                return Ok(fields);
            }
        }
    }

    pub fn get(&self, tag: FieldTag) -> Option<u32> {
        self.slots[tag.index()]
    }

    /// Sets (or replaces) the raw value for `tag`.
    pub fn set(&mut self, tag: FieldTag, value: u32) {
        self.slots[tag.index()] = Some(value);
    }

    /// Removes `tag` from the set; a no-op if it was not present.
    pub fn clear(&mut self, tag: FieldTag) {
        self.slots[tag.index()] = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn field_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Exact number of bytes `encode` will write.
    pub fn encoding_size(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .map(|&value| field_len(value))
            .sum()
    }

    /// Encodes all present fields into `buf` in tag order, last-field flag
    /// on the final entry. Returns the number of bytes written, which is
    /// always `encoding_size()`. An empty set cannot be encoded; the owner
    /// should store a null reference instead.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let size = self.encoding_size();
        if size == 0 {
            bail!("an empty field set encodes as a null reference, not as bytes");
        }
        ensure!(
            buf.len() >= size,
            "buffer of {} bytes too small for {}-byte encoding",
            buf.len(),
            size
        );

        let last_index = self
            .slots
            .iter()
            .rposition(Option::is_some)
            .expect("set is non-empty");

        let mut cursor = 0;
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(value) = slot {
                let last = index == last_index;
                cursor += encode_field(&mut buf[cursor..], index as u8, last, *value);
            }
        }
        debug_assert_eq!(cursor, size);
        Ok(cursor)
    }

    /// Convenience wrapper around [`encode`](Self::encode) that allocates
    /// the exactly-sized buffer.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.encoding_size()];
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

impl Default for RuntimeFieldSet {
    fn default() -> Self {
        Self::new()
    }
}
