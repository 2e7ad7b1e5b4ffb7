//! # Build-Time Layout of Optional Field Structures
//!
//! The layout manager turns a sequence of [`FieldSet`]s into one immutable
//! byte arena. Structures with out-of-line fields encode each reference as
//! a small delta from a shared base-address anchor instead of a full
//! pointer; the manager decides where those anchor words go.
//!
//! ## Arena Layout
//!
//! ```text
//! +--------------------+  offset 0
//! | simple run         |  structures with no out-of-line fields,
//! |                    |  packed back to back, no anchors
//! +--------------------+  padded to an anchor boundary
//! | anchor word        |  arena offset of its base out-of-line record
//! | structure          |
//! | structure          |
//! | padding            |  fills the space a structure would not fit in
//! +--------------------+  next anchor boundary
//! | anchor word        |
//! | structure          |
//! :                    :
//! +--------------------+  padded to the region alignment
//! | out-of-line region |  records in first-reference order, each at its
//! |                    |  natural alignment
//! +--------------------+
//! ```
//!
//! Anchor words live only at arena offsets that are a multiple of the
//! anchor alignment (default 128 bytes), so a decoder finds the governing
//! anchor by masking the low bits off a structure's offset. Each anchor is
//! the offset of the first record referenced by the first structure after
//! it, which makes that structure's first delta zero and keeps subsequent
//! deltas small and non-negative.
//!
//! ## Two-Phase Encoding
//!
//! Each field set is encoded in two strict phases. Planning appends the
//! set's out-of-line records to the shared region, decides whether a new
//! anchor (plus padding) must precede the structure, and computes the
//! exact encoded size; performing emits exactly those bytes. The plan's
//! size prediction is only valid against the manager state it was computed
//! from, so the plan is a single-use token consumed by the perform step,
//! and a sequence counter catches any interleaved planning. Both phases
//! run inside [`LayoutManager::encode`]; the manager is `&mut self`
//! throughout, keeping the whole pass single-threaded by construction.
//!
//! ## Failure Semantics
//!
//! Invalid field data (duplicate tags, bad alignments) surfaces as
//! `eyre::Result` errors when the fields are added. Violations of the
//! layout pass discipline itself are caller logic defects and panic: a
//! structure too large for one anchor group, an out-of-line alignment
//! incompatible with the current anchor, or a perform without its
//! matching plan.

use eyre::{ensure, Result};
use log::debug;

use crate::encoding::field::{encode_field, field_len};
use crate::fields::field_set::{FieldSet, Slot};
use crate::fields::types::{
    FieldTag, ANCHOR_WORD_BYTES, DEFAULT_ANCHOR_ALIGNMENT_SHIFT, MIN_ANCHOR_ALIGNMENT_SHIFT,
};
use crate::fields::view::FieldsView;

/// Identifies one encoded structure across `encode` and the placed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldsHandle(usize);

/// Layout statistics, reported at place time and usable for tuning the
/// anchor alignment.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutStats {
    /// Total structures encoded (simple + complex).
    pub structs: u32,
    /// Structures with no out-of-line fields, emitted in the anchor-free run.
    pub simple_structs: u32,
    /// Anchor words emitted into the complex run.
    pub anchors: u32,
    /// Filler bytes emitted ahead of anchor words.
    pub padding_bytes: u32,
    /// Total size of the out-of-line region.
    pub out_of_line_bytes: u32,
}

/// Proof that a field set's encoding was planned against the current
/// manager state. Single use: `perform_encoding` consumes it.
struct PlannedEncoding {
    size: u32,
    base_offset: u32,
    seq: u64,
}

struct OutOfLineRecord {
    data: Vec<u8>,
    offset: u32,
}

enum ComplexEntry {
    Padding(u32),
    /// Anchor word holding the arena offset of the record at this region
    /// offset, resolved at place time.
    Anchor { region_offset: u32 },
    Fields(Vec<u8>),
}

enum Placement {
    Simple { offset: usize },
    Complex { offset: usize },
}

pub struct LayoutManager {
    align_shift: u32,
    align_bytes: u32,

    simple: Vec<u8>,
    complex: Vec<ComplexEntry>,
    complex_len: usize,
    placements: Vec<Placement>,

    records: Vec<OutOfLineRecord>,
    next_record_offset: u32,
    max_record_align: usize,

    // Shared anchor state for the complex run; only ever advanced by one
    // plan/perform pair at a time.
    current_base_offset: u32,
    free_space: u32,
    anchor_emitted: bool,

    plan_seq: u64,
    performed_seq: u64,
    stats: LayoutStats,
}

impl LayoutManager {
    /// A manager with the default 128-byte anchor alignment.
    pub fn new() -> Self {
        Self::with_shift(DEFAULT_ANCHOR_ALIGNMENT_SHIFT)
    }

    /// A manager with anchors every `1 << align_shift` bytes. The shift is
    /// a tuning knob: smaller values shrink deltas but store more anchor
    /// words. It must be at least [`MIN_ANCHOR_ALIGNMENT_SHIFT`] so an
    /// anchor word and at least one structure fit in each group, and below
    /// 32 so group arithmetic stays in `u32`.
    pub fn with_alignment_shift(align_shift: u32) -> Result<Self> {
        ensure!(
            (MIN_ANCHOR_ALIGNMENT_SHIFT..32).contains(&align_shift),
            "anchor alignment shift {} outside supported range {}..32",
            align_shift,
            MIN_ANCHOR_ALIGNMENT_SHIFT
        );
        Ok(Self::with_shift(align_shift))
    }

    fn with_shift(align_shift: u32) -> Self {
        Self {
            align_shift,
            align_bytes: 1 << align_shift,
            simple: Vec::new(),
            complex: Vec::new(),
            complex_len: 0,
            placements: Vec::new(),
            records: Vec::new(),
            next_record_offset: 0,
            max_record_align: 1,
            current_base_offset: 0,
            free_space: 0,
            anchor_emitted: false,
            plan_seq: 0,
            performed_seq: 0,
            stats: LayoutStats::default(),
        }
    }

    pub fn alignment_shift(&self) -> u32 {
        self.align_shift
    }

    pub fn stats(&self) -> &LayoutStats {
        &self.stats
    }

    /// Encodes one field set, taking ownership of its out-of-line blobs.
    /// Returns `None` for an empty set: the owner stores a null reference
    /// and pays nothing. A set can be encoded only once.
    pub fn encode(&mut self, set: &mut FieldSet) -> Result<Option<FieldsHandle>> {
        ensure!(
            !set.is_encoded(),
            "field set has already been encoded; each set maps to one structure"
        );
        set.mark_encoded();

        if set.is_empty() {
            return Ok(None);
        }

        let handle = FieldsHandle(self.placements.len());
        if set.has_outline_fields() {
            let plan = self.plan_encoding(set);
            let offset = self.perform_encoding(set, plan);
            self.placements.push(Placement::Complex { offset });
        } else {
            // Anchor-free bypass: inline-only structures are segregated
            // into the simple run and never touch the anchor state.
            let offset = self.simple.len();
            self.encode_simple(set);
            self.placements.push(Placement::Simple { offset });
            self.stats.simple_structs += 1;
        }
        self.stats.structs += 1;

        Ok(Some(handle))
    }

    /// Finishes the pass: concatenates the simple run, the anchor-
    /// interleaved complex run, and the out-of-line region into one arena,
    /// resolving anchor words and structure offsets.
    pub fn place(self) -> FieldsImage {
        let align_bytes = self.align_bytes as usize;
        let mut stats = self.stats;
        stats.out_of_line_bytes = self.next_record_offset;

        let mut bytes = self.simple;

        let complex_base = if self.complex.is_empty() {
            bytes.len()
        } else {
            align_up(bytes.len(), align_bytes)
        };
        bytes.resize(complex_base, 0);

        let region_base = if self.records.is_empty() {
            complex_base + self.complex_len
        } else {
            align_up(complex_base + self.complex_len, self.max_record_align)
        };

        for entry in self.complex {
            match entry {
                ComplexEntry::Padding(len) => bytes.resize(bytes.len() + len as usize, 0),
                ComplexEntry::Anchor { region_offset } => {
                    let base = (region_base + region_offset as usize) as u64;
                    bytes.extend_from_slice(&base.to_le_bytes());
                }
                ComplexEntry::Fields(encoded) => bytes.extend_from_slice(&encoded),
            }
        }
        debug_assert_eq!(bytes.len(), complex_base + self.complex_len);

        bytes.resize(region_base, 0);
        for record in self.records {
            // Natural alignment of each record relative to the (aligned)
            // region base.
            bytes.resize(region_base + record.offset as usize, 0);
            bytes.extend_from_slice(&record.data);
        }

        let structs = self
            .placements
            .iter()
            .map(|placement| match placement {
                Placement::Simple { offset } => *offset,
                Placement::Complex { offset } => complex_base + offset,
            })
            .collect();

        debug!(
            "placed optional fields image: {} structs ({} simple), {} anchors, \
             {} padding bytes, {} out-of-line bytes, {} bytes total",
            stats.structs,
            stats.simple_structs,
            stats.anchors,
            stats.padding_bytes,
            stats.out_of_line_bytes,
            bytes.len(),
        );

        FieldsImage {
            bytes,
            structs,
            out_of_line_base: region_base,
            align_shift: self.align_shift,
            stats,
        }
    }

    /// Phase one: assign region offsets to the set's out-of-line records,
    /// decide whether a padding run and a fresh anchor word must precede
    /// this structure, and compute the exact encoded size. Leaves the
    /// anchor state exactly as the matching `perform_encoding` expects it.
    fn plan_encoding(&mut self, set: &mut FieldSet) -> PlannedEncoding {
        let first_record_offset = self.add_out_of_line_records(set);

        self.plan_seq += 1;
        let seq = self.plan_seq;

        let mut base_offset = self.current_base_offset;
        let mut size = 0;
        let mut needs_anchor = true;
        if self.anchor_emitted {
            size = self.encoded_size(set, base_offset);
            needs_anchor = size > self.free_space;
        }

        if needs_anchor {
            let padding = self.free_space;
            if padding > 0 {
                self.complex.push(ComplexEntry::Padding(padding));
                self.complex_len += padding as usize;
                self.stats.padding_bytes += padding;
            }
            self.complex.push(ComplexEntry::Anchor {
                region_offset: first_record_offset,
            });
            self.complex_len += ANCHOR_WORD_BYTES;
            self.stats.anchors += 1;

            self.anchor_emitted = true;
            self.current_base_offset = first_record_offset;
            self.free_space = self.align_bytes - ANCHOR_WORD_BYTES as u32;

            // Rebasing onto this set's first record zeroes its first delta,
            // so the size can only shrink relative to the old anchor.
            base_offset = first_record_offset;
            size = self.encoded_size(set, base_offset);
            assert!(
                size <= self.free_space,
                "field set of {} bytes exceeds the {} bytes available in one anchor group",
                size,
                self.free_space,
            );
        }

        self.free_space -= size;

        PlannedEncoding {
            size,
            base_offset,
            seq,
        }
    }

    /// Phase two: emit exactly the bytes the plan accounted for. Consumes
    /// the plan token; the sequence check catches a plan interleaved
    /// between a plan/perform pair, which would have invalidated the size.
    fn perform_encoding(&mut self, set: &FieldSet, plan: PlannedEncoding) -> usize {
        self.performed_seq += 1;
        assert!(
            plan.seq == self.plan_seq && plan.seq == self.performed_seq,
            "perform_encoding must immediately follow its matching plan_encoding"
        );

        let mut encoded = vec![0u8; plan.size as usize];
        let mut cursor = 0;
        let count = set.field_count();
        for i in 0..count {
            let tag = set.tag_order()[i];
            let value = self.entry_value(set, tag, plan.base_offset);
            cursor += encode_field(&mut encoded[cursor..], tag.raw(), i + 1 == count, value);
        }
        assert_eq!(
            cursor, plan.size as usize,
            "encoded size diverged from the planned size"
        );

        let offset = self.complex_len;
        self.complex_len += encoded.len();
        self.complex.push(ComplexEntry::Fields(encoded));
        offset
    }

    /// Appends the set's not-yet-placed out-of-line records to the shared
    /// region in first-reference order, each at its natural alignment.
    /// Returns the region offset of the first record the set references,
    /// the candidate base for a fresh anchor.
    fn add_out_of_line_records(&mut self, set: &mut FieldSet) -> u32 {
        let mut first_referenced = None;
        for i in 0..set.field_count() {
            let tag = set.tag_order()[i];
            if let Slot::Outline {
                data,
                align,
                region_offset,
            } = set.slot_mut(tag)
            {
                if region_offset.is_none() {
                    let offset = align_up(self.next_record_offset as usize, *align) as u32;
                    self.next_record_offset = offset + data.len() as u32;
                    self.max_record_align = self.max_record_align.max(*align);
                    *region_offset = Some(offset);
                    self.records.push(OutOfLineRecord {
                        data: std::mem::take(data),
                        offset,
                    });
                }
                if first_referenced.is_none() {
                    first_referenced = *region_offset;
                }
            }
        }
        first_referenced.expect("caller checked the set has out-of-line fields")
    }

    /// Size of the set's encoding against the given anchor base.
    fn encoded_size(&self, set: &FieldSet, base_offset: u32) -> u32 {
        let mut size = 0;
        for &tag in set.tag_order() {
            size += field_len(self.entry_value(set, tag, base_offset)) as u32;
        }
        size
    }

    /// Raw value encoded for one entry: the inline value, or the scaled
    /// delta from the anchor base for an out-of-line reference.
    fn entry_value(&self, set: &FieldSet, tag: FieldTag, base_offset: u32) -> u32 {
        match set.slot(tag) {
            Slot::Inline(value) => *value,
            Slot::Outline {
                align,
                region_offset,
                ..
            } => {
                let offset = region_offset.expect("record placed during planning");
                debug_assert!(offset >= base_offset, "first-reference order keeps deltas non-negative");
                let delta = offset - base_offset;
                assert!(
                    delta as usize % *align == 0,
                    "record at region offset {} unreachable from anchor base {} at alignment {}",
                    offset,
                    base_offset,
                    align,
                );
                delta / *align as u32
            }
            Slot::Empty => unreachable!("tag order only lists occupied slots"),
        }
    }

    fn encode_simple(&mut self, set: &FieldSet) {
        let count = set.field_count();
        let start = self.simple.len();
        let size: usize = set
            .tag_order()
            .iter()
            .map(|&tag| match set.slot(tag) {
                Slot::Inline(value) => field_len(*value),
                _ => unreachable!("simple sets hold inline fields only"),
            })
            .sum();
        self.simple.resize(start + size, 0);

        let mut cursor = start;
        for i in 0..count {
            let tag = set.tag_order()[i];
            let Slot::Inline(value) = set.slot(tag) else {
                unreachable!("simple sets hold inline fields only");
            };
            cursor += encode_field(&mut self.simple[cursor..], tag.raw(), i + 1 == count, *value);
        }
        debug_assert_eq!(cursor, start + size);
    }
}

impl Default for LayoutManager {
    fn default() -> Self {
        Self::new()
    }
}

/// The placed, immutable arena plus the resolved offset of every structure.
#[derive(Debug, Clone)]
pub struct FieldsImage {
    bytes: Vec<u8>,
    structs: Vec<usize>,
    out_of_line_base: usize,
    align_shift: u32,
    stats: LayoutStats,
}

impl FieldsImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Arena offset of the out-of-line region.
    pub fn out_of_line_base(&self) -> usize {
        self.out_of_line_base
    }

    /// Arena offset of the encoded structure behind `handle`; this is the
    /// reference the owning metadata record stores.
    pub fn fields_offset(&self, handle: FieldsHandle) -> usize {
        self.structs[handle.0]
    }

    /// A decoder positioned on the structure behind `handle`.
    pub fn view(&self, handle: FieldsHandle) -> FieldsView<'_> {
        FieldsView::new(&self.bytes, Some(self.structs[handle.0]), self.align_shift)
    }

    pub fn stats(&self) -> &LayoutStats {
        &self.stats
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (offset + align - 1) & !(align - 1)
}
