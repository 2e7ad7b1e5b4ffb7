//! Fuzz testing for the structure decoder.
//!
//! This fuzz target feeds arbitrary byte sequences to the runtime decoder
//! and the zero-copy view to ensure malformed input is rejected with an
//! error instead of panicking or reading out of bounds.

#![no_main]

use libfuzzer_sys::fuzz_target;

use optfields::{FieldTag, FieldsView, RuntimeFieldSet};

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes may fail, but must never panic.
    if let Ok(fields) = RuntimeFieldSet::decode(data) {
        // Whatever decoded must re-encode cleanly and round-trip.
        let reencoded = fields.encode_to_vec().unwrap();
        let again = RuntimeFieldSet::decode(&reencoded).unwrap();
        for raw in 0..=126u8 {
            let tag = FieldTag::new(raw).unwrap();
            assert_eq!(fields.get(tag), again.get(tag));
        }
    }

    let view = FieldsView::standalone(data);
    for raw in [0u8, 1, 63, 126] {
        let tag = FieldTag::new(raw).unwrap();
        let _ = view.get_inline(tag, 0);
    }
});
