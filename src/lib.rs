//! # optfields - Compact Optional Field Encoding
//!
//! `optfields` attaches a sparse set of optional attributes to a large
//! population of lightweight metadata records without bloating every record
//! with fields only a minority need. An owner holds a single nullable
//! reference to an encoded structure; the structure holds only the fields
//! that are present, each as a tagged variable-length entry.
//!
//! ## Encoded Structure
//!
//! ```text
//! +-------------------+-------------------+     +-------------------+
//! | header | varint   | header | varint   | ... | header | varint   |
//! +-------------------+-------------------+     +-------------------+
//!   bit 7: last field   bits 0-6: tag (0-126)     value: 1-5 bytes
//! ```
//!
//! Small values (flags, indices, anything meaningful at 32 bits) are stored
//! inline. Larger values live as naturally-aligned records in a separate
//! out-of-line region; the entry stores a compressed reference instead:
//! the record's offset delta from a shared base-address anchor, divided by
//! the record's alignment. Anchor words are interleaved into the record
//! stream at fixed power-of-two boundaries (default 128 bytes), so many
//! small structures share a handful of anchors and a decoder finds the
//! governing anchor by masking a structure's own offset.
//!
//! ## Components
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | Varint codec | [`encoding::varint`] | 1-5 byte encoding of u32 values |
//! | Field codec | [`encoding::field`] | header byte + varint per field |
//! | Field sets | [`fields::field_set`] | build-time field collection |
//! | Decoder | [`fields::view`] | zero-copy tag lookup |
//! | Layout manager | [`layout`] | anchor placement and image assembly |
//! | Runtime codec | [`fields::runtime`] | single-structure encode/decode |
//!
//! ## Build-Time Usage
//!
//! ```
//! use optfields::{FieldSet, FieldTag, LayoutManager};
//!
//! # fn main() -> eyre::Result<()> {
//! let mut manager = LayoutManager::new();
//!
//! let mut set = FieldSet::new();
//! set.add_inline(FieldTag::new(1)?, 42)?;
//! set.add_outline(FieldTag::new(9)?, vec![0u8; 24], 8)?;
//! let handle = manager.encode(&mut set)?.expect("set is non-empty");
//!
//! let image = manager.place();
//! let view = image.view(handle);
//! assert_eq!(view.get_inline(FieldTag::new(1)?, 0)?, 42);
//! assert!(view.get_outline(FieldTag::new(9)?, 8)?.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! The layout pass is sequential: one manager, one thread, field sets
//! submitted in a fixed order. Once placed, the image is immutable and
//! safe for unbounded concurrent readers.

pub mod encoding;
pub mod fields;
pub mod layout;

pub use fields::{FieldSet, FieldTag, FieldsView, RuntimeFieldSet, MAX_TAG, TAG_LIMIT};
pub use layout::{FieldsHandle, FieldsImage, LayoutManager, LayoutStats};
