//! # Optional Field Structures
//!
//! This module provides the data model around encoded optional-field
//! structures:
//!
//! - `types`: field tags and the anchor-format constants
//! - `field_set`: build-time collection of fields for one structure
//! - `view`: zero-copy decoder over a placed arena or a standalone buffer
//! - `runtime`: single-structure encode/decode for execution time
//!
//! An encoded structure is a byte run of field entries, each a header byte
//! (7-bit tag, high bit = last field) plus a varint value. A structure is
//! reachable from its owner through a single nullable reference and is
//! immutable once encoded.

pub mod field_set;
pub mod runtime;
pub mod types;
pub mod view;


pub use field_set::FieldSet;
pub use runtime::RuntimeFieldSet;
pub use types::{FieldTag, MAX_TAG, TAG_LIMIT};
pub use view::FieldsView;
