//! # Layout and Image Integration Tests
//!
//! End-to-end coverage of the build-time path: field sets in, placed
//! arena out, queries through the zero-copy decoder. These tests pin the
//! observable layout contract:
//!
//! - inline-only structures are segregated into an anchor-free run
//! - anchor words land exactly on alignment boundaries
//! - out-of-line references resolve against the governing anchor, with
//!   the first reference after a fresh anchor at delta zero
//! - a structure that no longer fits the current anchor group forces
//!   padding plus a new anchor

use optfields::{FieldSet, FieldTag, FieldsView, LayoutManager, RuntimeFieldSet};

fn tag(raw: u8) -> FieldTag {
    FieldTag::new(raw).unwrap()
}

#[test]
fn inline_only_structures_form_an_anchor_free_run() {
    let mut manager = LayoutManager::new();

    let mut first = FieldSet::new();
    first.add_inline(tag(5), 5).unwrap();
    first.add_inline(tag(9), 300).unwrap();
    let first = manager.encode(&mut first).unwrap().unwrap();

    let mut second = FieldSet::new();
    second.add_inline(tag(1), 42).unwrap();
    let second = manager.encode(&mut second).unwrap().unwrap();

    let image = manager.place();

    // No out-of-line fields anywhere: no anchors, no padding, and the
    // arena is exactly the packed structures.
    assert_eq!(image.stats().anchors, 0);
    assert_eq!(image.stats().padding_bytes, 0);
    assert_eq!(image.stats().simple_structs, 2);
    assert_eq!(image.len(), 7);

    assert_eq!(image.fields_offset(first), 0);
    assert_eq!(&image.bytes()[0..5], &[0x05, 0x05, 0x89, 0xAC, 0x02]);
    assert_eq!(image.fields_offset(second), 5);
    assert_eq!(&image.bytes()[5..7], &[0x81, 0x2A]);

    let view = image.view(first);
    assert_eq!(view.get_inline(tag(5), 0).unwrap(), 5);
    assert_eq!(view.get_inline(tag(9), 0).unwrap(), 300);
    assert_eq!(view.get_inline(tag(6), 1234).unwrap(), 1234);
    assert_eq!(image.view(second).get_inline(tag(1), 0).unwrap(), 42);
}

#[test]
fn out_of_line_references_resolve_through_the_anchor_word() {
    let mut manager = LayoutManager::new();

    // A simple structure first, so the complex run starts past it on the
    // next 128-byte boundary.
    let mut simple = FieldSet::new();
    simple.add_inline(tag(5), 5).unwrap();
    simple.add_inline(tag(9), 300).unwrap();
    let simple = manager.encode(&mut simple).unwrap().unwrap();

    let mut c1 = FieldSet::new();
    c1.add_inline(tag(1), 42).unwrap();
    c1.add_outline(tag(2), vec![0x11; 16], 8).unwrap();
    let c1 = manager.encode(&mut c1).unwrap().unwrap();

    let mut c2 = FieldSet::new();
    c2.add_outline(tag(2), vec![0x22; 8], 8).unwrap();
    let c2 = manager.encode(&mut c2).unwrap().unwrap();

    let image = manager.place();
    assert_eq!(image.stats().anchors, 1);

    // Simple run at offset 0; complex run on the 128 boundary, anchor
    // word first, then the two structures.
    assert_eq!(image.fields_offset(simple), 0);
    assert_eq!(image.fields_offset(c1), 128 + 8);

    // The first record referenced after the anchor decodes at delta zero.
    let r1 = image.view(c1).get_outline(tag(2), 8).unwrap().unwrap();
    let anchor = u64::from_le_bytes(image.bytes()[128..136].try_into().unwrap()) as usize;
    assert_eq!(r1, anchor);
    assert_eq!(r1, image.out_of_line_base());
    assert_eq!(&image.bytes()[r1..r1 + 16], &[0x11; 16]);

    // The second structure shares the anchor; its record sits right after
    // the first one in first-reference order.
    let r2 = image.view(c2).get_outline(tag(2), 8).unwrap().unwrap();
    assert_eq!(r2, image.out_of_line_base() + 16);
    assert_eq!(&image.bytes()[r2..r2 + 8], &[0x22; 8]);

    // Inline queries work on complex structures too, and misses still
    // return the default.
    let view = image.view(c1);
    assert_eq!(view.get_inline(tag(1), 0).unwrap(), 42);
    assert_eq!(view.get_outline(tag(60), 8).unwrap(), None);
}

#[test]
fn overflowing_an_anchor_group_starts_a_new_anchor() {
    // 32-byte anchor alignment: each group holds an 8-byte anchor word
    // plus 24 bytes of structures.
    let mut manager = LayoutManager::with_alignment_shift(5).unwrap();

    let mut s1 = FieldSet::new();
    s1.add_outline(tag(1), vec![1; 8], 8).unwrap();
    let s1 = manager.encode(&mut s1).unwrap().unwrap(); // 2 bytes, 22 left

    let mut s2 = FieldSet::new();
    s2.add_outline(tag(1), vec![2; 8], 8).unwrap();
    let s2 = manager.encode(&mut s2).unwrap().unwrap(); // 2 bytes, 20 left

    // 3 five-byte values + their headers + the outline entry + one small
    // inline entry = 22 bytes: over the 20 remaining, under a fresh
    // group's 24.
    let mut s3 = FieldSet::new();
    s3.add_inline(tag(3), u32::MAX).unwrap();
    s3.add_inline(tag(4), u32::MAX).unwrap();
    s3.add_inline(tag(5), u32::MAX).unwrap();
    s3.add_outline(tag(1), vec![3; 8], 8).unwrap();
    s3.add_inline(tag(6), 0).unwrap();
    let s3 = manager.encode(&mut s3).unwrap().unwrap();

    assert_eq!(manager.stats().anchors, 2);
    assert_eq!(manager.stats().padding_bytes, 20);

    let image = manager.place();

    // First group: anchor at 0, structures at 8 and 10, padding to 32.
    // Second group: anchor at 32, third structure at 40.
    assert_eq!(image.fields_offset(s1), 8);
    assert_eq!(image.fields_offset(s2), 10);
    assert_eq!(image.fields_offset(s3), 40);

    let base = image.out_of_line_base();
    let r1 = image.view(s1).get_outline(tag(1), 8).unwrap().unwrap();
    let r2 = image.view(s2).get_outline(tag(1), 8).unwrap().unwrap();
    let r3 = image.view(s3).get_outline(tag(1), 8).unwrap().unwrap();

    assert_eq!(r1, base);
    assert_eq!(r2, base + 8);
    // The third structure resolves against the second anchor (its own
    // first record, delta zero) -- not the first anchor, which would have
    // pointed 16 bytes too low.
    assert_eq!(r3, base + 16);

    let anchor2 = u64::from_le_bytes(image.bytes()[32..40].try_into().unwrap()) as usize;
    assert_eq!(anchor2, r3);

    assert_eq!(&image.bytes()[r1..r1 + 8], &[1; 8]);
    assert_eq!(&image.bytes()[r2..r2 + 8], &[2; 8]);
    assert_eq!(&image.bytes()[r3..r3 + 8], &[3; 8]);

    // Inline values of the third structure survive the rebase.
    let view = image.view(s3);
    for t in [3u8, 4, 5] {
        assert_eq!(view.get_inline(tag(t), 0).unwrap(), u32::MAX);
    }
    assert_eq!(view.get_inline(tag(6), 9).unwrap(), 0);
}

#[test]
fn simple_structures_interleaved_with_complex_do_not_disturb_anchor_state() {
    let mut manager = LayoutManager::with_alignment_shift(5).unwrap();

    let mut c1 = FieldSet::new();
    c1.add_outline(tag(1), vec![0xA1; 8], 8).unwrap();
    let c1 = manager.encode(&mut c1).unwrap().unwrap();

    let mut simple = FieldSet::new();
    simple.add_inline(tag(2), 7).unwrap();
    let simple = manager.encode(&mut simple).unwrap().unwrap();

    let mut c2 = FieldSet::new();
    c2.add_outline(tag(1), vec![0xB2; 8], 8).unwrap();
    let c2 = manager.encode(&mut c2).unwrap().unwrap();

    let image = manager.place();

    // One anchor serves both complex structures; the simple structure sat
    // between them in submission order but lives in the separate run.
    assert_eq!(image.stats().anchors, 1);
    assert_eq!(image.stats().simple_structs, 1);
    assert!(image.fields_offset(simple) < image.fields_offset(c1));

    let r1 = image.view(c1).get_outline(tag(1), 8).unwrap().unwrap();
    let r2 = image.view(c2).get_outline(tag(1), 8).unwrap().unwrap();
    assert_eq!(r2, r1 + 8);
    assert_eq!(&image.bytes()[r2..r2 + 8], &[0xB2; 8]);
}

#[test]
fn deltas_grow_with_first_reference_order_and_stay_exact() {
    let mut manager = LayoutManager::new();

    let mut handles = Vec::new();
    for i in 0..20u8 {
        let mut set = FieldSet::new();
        set.add_outline(tag(1), vec![i; 8], 8).unwrap();
        handles.push(manager.encode(&mut set).unwrap().unwrap());
    }

    let image = manager.place();

    // 20 two-byte structures fit one 128-byte group behind a single anchor.
    assert_eq!(image.stats().anchors, 1);

    for (i, handle) in handles.iter().enumerate() {
        let offset = image.view(*handle).get_outline(tag(1), 8).unwrap().unwrap();
        assert_eq!(offset, image.out_of_line_base() + i * 8);
        assert_eq!(&image.bytes()[offset..offset + 8], &[i as u8; 8]);
    }
}

#[test]
fn mixed_record_alignments_share_an_anchor() {
    let mut manager = LayoutManager::new();

    // Base record at alignment 8; later records at smaller alignments
    // divide evenly into any delta from it.
    let mut s1 = FieldSet::new();
    s1.add_outline(tag(1), vec![0xC3; 8], 8).unwrap();
    let s1 = manager.encode(&mut s1).unwrap().unwrap();

    let mut s2 = FieldSet::new();
    s2.add_outline(tag(1), vec![0xD4; 5], 1).unwrap();
    s2.add_outline(tag(2), vec![0xE5; 4], 4).unwrap();
    let s2 = manager.encode(&mut s2).unwrap().unwrap();

    let image = manager.place();
    let base = image.out_of_line_base();

    assert_eq!(
        image.view(s1).get_outline(tag(1), 8).unwrap(),
        Some(base)
    );
    assert_eq!(
        image.view(s2).get_outline(tag(1), 1).unwrap(),
        Some(base + 8)
    );
    // The 4-aligned record starts on the next 4 boundary after the
    // 5-byte record.
    assert_eq!(
        image.view(s2).get_outline(tag(2), 4).unwrap(),
        Some(base + 16)
    );
    assert_eq!(&image.bytes()[base + 16..base + 20], &[0xE5; 4]);
}

#[test]
fn placed_image_queries_match_runtime_reencoding() {
    let mut manager = LayoutManager::new();

    let mut set = FieldSet::new();
    set.add_inline(tag(3), 10).unwrap();
    set.add_inline(tag(7), 70_000).unwrap();
    let handle = manager.encode(&mut set).unwrap().unwrap();
    let image = manager.place();

    // A placed inline-only structure can be lifted into a runtime set,
    // extended, and queried again through the standalone decoder.
    let offset = image.fields_offset(handle);
    let mut runtime = RuntimeFieldSet::decode(&image.bytes()[offset..]).unwrap();
    assert_eq!(runtime.get(tag(3)), Some(10));
    assert_eq!(runtime.get(tag(7)), Some(70_000));

    runtime.set(tag(8), 1);
    let bytes = runtime.encode_to_vec().unwrap();
    let view = FieldsView::standalone(&bytes);
    assert_eq!(view.get_inline(tag(3), 0).unwrap(), 10);
    assert_eq!(view.get_inline(tag(7), 0).unwrap(), 70_000);
    assert_eq!(view.get_inline(tag(8), 0).unwrap(), 1);
}

#[test]
fn empty_manager_places_an_empty_image() {
    let image = LayoutManager::new().place();
    assert!(image.is_empty());
    assert_eq!(image.stats().structs, 0);
}
