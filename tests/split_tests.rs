// Split key selection tests
// Size-balanced split points over a live engine scan.

use mvcc_engine::engine::{IterOptions, LiveHandle, Reader, Writer};
use mvcc_engine::keys::{KeySpan, NoSplitSpans};
use mvcc_engine::mvcc::{MvccKey, Timestamp, find_split_key};
use mvcc_engine::Options;

/// Ten keys k0..k9, one 10-byte version each: 2 + 1 + 10 + 12 = 25 bytes per row.
fn ten_keys() -> LiveHandle {
    let h = LiveHandle::open(Options::default()).unwrap();
    for i in 0..10 {
        h.put(&MvccKey::new(format!("k{}", i).as_bytes(), Timestamp::new(1, 0)), b"0123456789").unwrap();
    }
    h
}

fn split(h: &LiveHandle, options: IterOptions, min_split: &[u8], target: i64, spans: &NoSplitSpans) -> Option<Vec<u8>> {
    let mut iter = h.new_iterator(options);
    find_split_key(&mut iter, b"k", min_split, target, spans).unwrap()
}

// =============================================================================
// Test 1: Picks the key closest to the target
// =============================================================================
#[test]
fn closest_to_target() {
    let h = ten_keys();
    assert_eq!(split(&h, IterOptions::default(), b"", 100, &NoSplitSpans::none()), Some(b"k4".to_vec()));
    assert_eq!(split(&h, IterOptions::default(), b"", 50, &NoSplitSpans::none()), Some(b"k2".to_vec()));
}

// =============================================================================
// Test 2: Never splits at the first row
// =============================================================================
#[test]
fn first_row_is_not_a_split() {
    let h = ten_keys();
    assert_eq!(split(&h, IterOptions::default(), b"", 0, &NoSplitSpans::none()), Some(b"k1".to_vec()));
}

// =============================================================================
// Test 3: Honors the minimum split key
// =============================================================================
#[test]
fn respects_min_split() {
    let h = ten_keys();
    assert_eq!(split(&h, IterOptions::default(), b"k6", 100, &NoSplitSpans::none()), Some(b"k6".to_vec()));
}

// =============================================================================
// Test 4: Skips keys strictly inside a no-split span
// =============================================================================
#[test]
fn skips_span_interior() {
    let h = ten_keys();
    let spans = NoSplitSpans::new(vec![KeySpan::new(b"k2", b"k5")]);
    assert_eq!(split(&h, IterOptions::default(), b"", 100, &spans), Some(b"k5".to_vec()));
}

// =============================================================================
// Test 5: Versions of one key never produce a split between them
// =============================================================================
#[test]
fn versions_stay_together() {
    let h = LiveHandle::open(Options::default()).unwrap();
    h.put(&MvccKey::new(b"a", Timestamp::new(1, 0)), b"x").unwrap();
    for wall in 1..20 {
        h.put(&MvccKey::new(b"b", Timestamp::new(wall, 0)), b"0123456789").unwrap();
    }
    h.put(&MvccKey::new(b"c", Timestamp::new(1, 0)), b"x").unwrap();

    let mut iter = h.new_iterator(IterOptions::default());
    let key = find_split_key(&mut iter, b"", b"", 200, &NoSplitSpans::none()).unwrap();
    assert!(matches!(key.as_deref(), Some(b"b") | Some(b"c")));
}

// =============================================================================
// Test 6: The iterator's upper bound ends the scan
// =============================================================================
#[test]
fn bounded_by_iterator() {
    let h = ten_keys();
    let options = IterOptions { upper_bound: Some(MvccKey::meta(b"k3")), ..Default::default() };
    assert_eq!(split(&h, options, b"", 1000, &NoSplitSpans::none()), Some(b"k2".to_vec()));
}

// =============================================================================
// Test 7: Nothing to split in an empty range
// =============================================================================
#[test]
fn empty_range_has_no_split() {
    let h = LiveHandle::open(Options::default()).unwrap();
    assert_eq!(split(&h, IterOptions::default(), b"", 100, &NoSplitSpans::none()), None);

    let h = ten_keys();
    let options = IterOptions { upper_bound: Some(MvccKey::meta(b"k1")), ..Default::default() };
    // a single row can't be split
    assert_eq!(split(&h, options, b"", 100, &NoSplitSpans::none()), None);
}
