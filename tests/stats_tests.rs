// MVCC stats scan tests
// Live/garbage accounting, intents, tombstones, system keys and additivity.

use mvcc_engine::engine::{IterOptions, LiveHandle, Reader, Writer};
use mvcc_engine::mvcc::{KeyRange, MvccKey, MvccMetadata, MvccStats, Timestamp, TxnMeta, compute_stats};
use mvcc_engine::{Error, Options};

const SEC: i64 = 1_000_000_000;
const NOW: i64 = 10 * SEC;

fn open() -> LiveHandle {
    LiveHandle::open(Options::default()).unwrap()
}

fn put_version(h: &LiveHandle, raw: &[u8], wall: i64, value: &[u8]) {
    h.put(&MvccKey::new(raw, Timestamp::new(wall, 0)), value).unwrap();
}

fn stats_over(h: &LiveHandle, range: &KeyRange) -> MvccStats {
    let mut iter = h.new_iterator(IterOptions::default());
    compute_stats(&mut iter, range, NOW).unwrap()
}

fn range(start: &[u8], end: &[u8]) -> KeyRange {
    KeyRange::new(MvccKey::meta(start), MvccKey::meta(end))
}

// =============================================================================
// Test 1: Newer version is live, older version is garbage
// =============================================================================
#[test]
fn two_versions_live_and_garbage() {
    let h = open();
    put_version(&h, b"a", 2 * SEC, b"old");
    put_version(&h, b"a", 5 * SEC, b"newer");

    let stats = stats_over(&h, &KeyRange::all());

    // implicit meta (raw + 1) + newest version (value + 12)
    assert_eq!(stats.live_bytes, 2 + 5 + 12);
    assert_eq!(stats.live_count, 1);
    assert_eq!(stats.garbage_bytes, 3 + 12);
    assert_eq!(stats.garbage_count, 1);
    // shadowed at t=5s, now is t=10s
    assert_eq!(stats.gc_bytes_age, 15 * 5);
    assert_eq!(stats.key_bytes, 2 + 12 + 12);
    assert_eq!(stats.key_count, 1);
    assert_eq!(stats.val_bytes, 5 + 3);
    assert_eq!(stats.val_count, 2);
    assert_eq!(stats.intent_count, 0);
    assert_eq!(stats.last_update_nanos, NOW);
}

// =============================================================================
// Test 2: A newest tombstone is neither live nor garbage
// =============================================================================
#[test]
fn newest_tombstone_accrues_gc_age() {
    let h = open();
    put_version(&h, b"b", 3 * SEC, b"v");
    put_version(&h, b"b", 6 * SEC, b"");

    let stats = stats_over(&h, &KeyRange::all());

    assert_eq!(stats.live_bytes, 0);
    assert_eq!(stats.live_count, 0);
    assert_eq!(stats.key_count, 1);
    // only the shadowed value is garbage
    assert_eq!(stats.garbage_bytes, 1 + 12);
    assert_eq!(stats.garbage_count, 1);
    // meta 2*4 + tombstone 12*4 + shadowed value 13*4
    assert_eq!(stats.gc_bytes_age, 8 + 48 + 52);
    assert_eq!(stats.val_count, 2);
}

// =============================================================================
// Test 3: Intent metadata counts the provisional version as an intent
// =============================================================================
#[test]
fn intent_counted() {
    let h = open();
    let ts = Timestamp::new(8 * SEC, 0);
    let meta = MvccMetadata::intent(TxnMeta { id: 42, epoch: 1 }, ts, 3).encode();
    h.put(&MvccKey::meta(b"c"), &meta).unwrap();
    h.put(&MvccKey::new(b"c", ts), b"val").unwrap();

    let stats = stats_over(&h, &KeyRange::all());
    let meta_len = meta.len() as i64;

    assert_eq!(stats.intent_count, 1);
    assert_eq!(stats.intent_bytes, 3 + 12);
    assert_eq!(stats.intent_age, 2);
    assert_eq!(stats.live_bytes, 2 + meta_len + 3 + 12);
    assert_eq!(stats.live_count, 1);
    assert_eq!(stats.key_bytes, 2 + 12);
    assert_eq!(stats.val_bytes, meta_len + 3);
    assert_eq!(stats.val_count, 1);
    assert_eq!(stats.garbage_bytes, 0);
}

// =============================================================================
// Test 4: Inline values count as a value without versions
// =============================================================================
#[test]
fn inline_value() {
    let h = open();
    let meta = MvccMetadata::inline(b"xyz".to_vec()).encode();
    h.put(&MvccKey::meta(b"d"), &meta).unwrap();

    let stats = stats_over(&h, &KeyRange::all());
    assert_eq!(stats.live_count, 1);
    assert_eq!(stats.live_bytes, 2 + meta.len() as i64);
    assert_eq!(stats.key_count, 1);
    assert_eq!(stats.val_count, 1);
}

// =============================================================================
// Test 5: Local keys go to the system counters only
// =============================================================================
#[test]
fn local_keys_are_system() {
    let h = open();
    put_version(&h, b"\x01k", SEC, b"v");
    put_version(&h, b"\x01k", 2 * SEC, b"w");

    let stats = stats_over(&h, &KeyRange::all());
    assert_eq!(stats.sys_count, 1);
    assert_eq!(stats.sys_bytes, 3 + 13 + 13);
    assert_eq!(stats.live_bytes, 0);
    assert_eq!(stats.key_bytes, 0);
    assert_eq!(stats.garbage_bytes, 0);
}

// =============================================================================
// Test 6: Metadata that disagrees with its version is corruption
// =============================================================================
#[test]
fn inconsistent_metadata_is_corruption() {
    let h = open();
    let ts = Timestamp::new(SEC, 0);
    let meta = MvccMetadata::intent(TxnMeta { id: 1, epoch: 0 }, ts, 10).encode();
    h.put(&MvccKey::meta(b"e"), &meta).unwrap();
    h.put(&MvccKey::new(b"e", ts), b"short").unwrap();

    let mut iter = h.new_iterator(IterOptions::default());
    let err = compute_stats(&mut iter, &KeyRange::all(), NOW).unwrap_err();
    assert!(matches!(err, Error::Corruption(_)));
}

// =============================================================================
// Test 7: Undecodable metadata is corruption
// =============================================================================
#[test]
fn undecodable_metadata_is_corruption() {
    let h = open();
    h.put(&MvccKey::meta(b"f"), b"\x07junk").unwrap();

    let mut iter = h.new_iterator(IterOptions::default());
    let err = compute_stats(&mut iter, &KeyRange::all(), NOW).unwrap_err();
    assert!(matches!(err, Error::Corruption(_)));
}

// =============================================================================
// Test 8: Empty range yields zero stats
// =============================================================================
#[test]
fn empty_range_is_zero() {
    let h = open();
    put_version(&h, b"m", SEC, b"v");

    let stats = stats_over(&h, &range(b"m", b"m"));
    assert_eq!(stats, MvccStats { last_update_nanos: NOW, ..Default::default() });
}

// =============================================================================
// Test 9: Start after end is rejected
// =============================================================================
#[test]
fn inverted_range_rejected() {
    let h = open();
    let mut iter = h.new_iterator(IterOptions::default());
    let err = compute_stats(&mut iter, &range(b"z", b"a"), NOW).unwrap_err();
    assert!(matches!(err, Error::InvalidRange { .. }));
}

// =============================================================================
// Test 10: Stats over a split range add up to the whole
// =============================================================================
#[test]
fn stats_are_additive_across_splits() {
    let h = open();
    let raws: [&[u8]; 6] = [b"a", b"b", b"c", b"d", b"e", b"f"];
    for (i, raw) in raws.into_iter().enumerate() {
        let base = (i as i64 + 1) * SEC;
        put_version(&h, raw, base, b"one");
        if i % 2 == 0 {
            put_version(&h, raw, base + SEC, b"two!");
        }
        if i % 3 == 0 {
            put_version(&h, raw, base + 2 * SEC, b"");
        }
    }
    put_version(&h, b"\x01sys", SEC, b"s");
    let meta = MvccMetadata::inline(b"inline".to_vec()).encode();
    h.put(&MvccKey::meta(b"cc"), &meta).unwrap();

    let whole = stats_over(&h, &KeyRange::all());
    let splits: [&[u8]; 7] = [b"\x01", b"b", b"c", b"cc", b"d", b"f", b"zz"];
    for split in splits {
        let mut left = stats_over(&h, &KeyRange::new(MvccKey::default(), MvccKey::meta(split)));
        let right = stats_over(&h, &KeyRange::new(MvccKey::meta(split), MvccKey::default()));
        left.add(&right);
        assert_eq!(left, whole, "split at {:?}", split);
    }
}

// =============================================================================
// Test 11: Snapshot stats ignore later writes
// =============================================================================
#[test]
fn snapshot_stats_are_stable() {
    let h = open();
    put_version(&h, b"k", SEC, b"v1");
    let snap = h.new_snapshot();
    put_version(&h, b"k", 2 * SEC, b"v2");

    let mut iter = snap.new_iterator(IterOptions::default());
    let stats = compute_stats(&mut iter, &KeyRange::all(), NOW).unwrap();
    assert_eq!(stats.garbage_count, 0);
    assert_eq!(stats.val_count, 1);
}
