// MVCC key codec tests
// Layout, decoding failures and comparator order of encoded keys.

use std::cmp::Ordering;

use mvcc_engine::mvcc::key::{EncodedKey, MvccKey, Timestamp, compare, raw_key, split_key};
use mvcc_engine::Error;
use proptest::prelude::*;

fn ts(wall: i64, logical: i32) -> Timestamp {
    Timestamp::new(wall, logical)
}

// =============================================================================
// Test 1: Byte layout of each suffix length
// =============================================================================
#[test]
fn encoded_layout() {
    assert_eq!(MvccKey::meta(b"k").encode().as_bytes(), b"k\x00");

    let wall_only = MvccKey::new(b"k", ts(1, 0)).encode();
    let mut expected = b"k\x00".to_vec();
    expected.extend_from_slice(&[0x80, 0, 0, 0, 0, 0, 0, 1]);
    expected.push(9);
    assert_eq!(wall_only.as_bytes(), expected.as_slice());

    let with_logical = MvccKey::new(b"k", ts(1, 2)).encode();
    assert_eq!(with_logical.len(), 1 + 13 + 1);
    assert_eq!(&with_logical.as_bytes()[10..14], &[0x80, 0, 0, 2]);
    assert_eq!(with_logical.as_bytes()[14], 13);
}

// =============================================================================
// Test 2: Declared suffix longer than the buffer is rejected
// =============================================================================
#[test]
fn decode_short_buffer_fails() {
    let err = MvccKey::decode(&[b'a', 9]).unwrap_err();
    assert!(matches!(err, Error::MalformedKey(_)));
}

// =============================================================================
// Test 3: Other malformed inputs
// =============================================================================
#[test]
fn decode_rejects_malformed() {
    // empty buffer
    assert!(matches!(MvccKey::decode(&[]), Err(Error::MalformedKey(_))));

    // suffix length that is not 0, 9 or 13
    assert!(matches!(MvccKey::decode(&[b'a', 0, 1, 2]), Err(Error::MalformedKey(_))));

    // non-zero separator
    let mut bad_sep = MvccKey::new(b"k", ts(5, 0)).encode().into_vec();
    bad_sep[1] = 0xff;
    assert!(matches!(MvccKey::decode(&bad_sep), Err(Error::MalformedKey(_))));

    // zero timestamp written with a suffix
    let mut zero = b"k\x00".to_vec();
    zero.extend_from_slice(&0x8000_0000_0000_0000u64.to_be_bytes());
    zero.push(9);
    assert!(matches!(MvccKey::decode(&zero), Err(Error::MalformedKey(_))));
}

// =============================================================================
// Test 4: Negative wall times keep numeric order
// =============================================================================
#[test]
fn negative_wall_times() {
    let older = MvccKey::new(b"k", ts(-5, 0)).encode();
    let newer = MvccKey::new(b"k", ts(3, 0)).encode();
    assert!(newer < older);
    assert_eq!(MvccKey::decode(older.as_bytes()).unwrap().timestamp, ts(-5, 0));
}

// =============================================================================
// Test 5: Metadata key sorts before all versions of its raw key
// =============================================================================
#[test]
fn metadata_sorts_first() {
    let meta = MvccKey::meta(b"k").encode();
    let v1 = MvccKey::new(b"k", ts(1, 0)).encode();
    let v9 = MvccKey::new(b"k", ts(9, 9)).encode();
    assert!(meta < v9);
    assert!(v9 < v1);

    // a longer raw key sorts after every version of its prefix
    let longer = MvccKey::meta(b"k\x00").encode();
    assert!(v1 < longer);
}

// =============================================================================
// Test 6: Split helpers
// =============================================================================
#[test]
fn split_helpers() {
    let enc = MvccKey::new(b"raw", ts(7, 1)).encode();
    let (raw, suffix) = split_key(enc.as_bytes()).unwrap();
    assert_eq!(raw, b"raw");
    assert_eq!(suffix.len(), 12);
    assert_eq!(raw_key(enc.as_bytes()), b"raw");
    assert_eq!(enc.raw_key(), b"raw");

    // unsplittable bytes are their own raw key
    assert_eq!(raw_key(&[b'x', 40]), &[b'x', 40]);
}

// =============================================================================
// Test 7: Malformed keys compare bytewise
// =============================================================================
#[test]
fn malformed_keys_compare_bytewise() {
    assert_eq!(compare(&[1, 200], &[1, 201]), Ordering::Less);
    assert!(EncodedKey::empty() < MvccKey::meta(b"").encode());
}

fn arb_key() -> impl Strategy<Value = MvccKey> {
    (
        proptest::collection::vec(any::<u8>(), 0..12),
        any::<i64>(),
        any::<i32>(),
        any::<bool>(),
    )
        .prop_map(|(raw, wall, logical, sentinel)| {
            if sentinel {
                MvccKey::meta(raw)
            } else if wall == 0 && logical == 0 {
                MvccKey::new(raw, Timestamp::new(1, 0))
            } else {
                MvccKey::new(raw, Timestamp::new(wall, logical))
            }
        })
}

proptest! {
    // =========================================================================
    // Test 8: Decode inverts encode
    // =========================================================================
    #[test]
    fn decode_inverts_encode(key in arb_key()) {
        let enc = key.encode();
        prop_assert_eq!(enc.len(), key.encoded_len());
        prop_assert_eq!(MvccKey::decode(enc.as_bytes()).unwrap(), key);
    }

    // =========================================================================
    // Test 9: Encoded order matches key order
    // =========================================================================
    #[test]
    fn encoded_order_matches_key_order(a in arb_key(), b in arb_key()) {
        prop_assert_eq!(a.encode().cmp(&b.encode()), a.cmp(&b));
    }

    // =========================================================================
    // Test 10: Same raw key orders newest first
    // =========================================================================
    #[test]
    fn same_raw_key_newest_first(
        raw in proptest::collection::vec(any::<u8>(), 0..8),
        w1 in 1i64..1_000_000, l1 in 0i32..4,
        w2 in 1i64..1_000_000, l2 in 0i32..4,
    ) {
        let k1 = MvccKey::new(raw.clone(), Timestamp::new(w1, l1));
        let k2 = MvccKey::new(raw, Timestamp::new(w2, l2));
        let older = (w1, l1) < (w2, l2);
        prop_assert_eq!(k1.encode() > k2.encode(), older);
    }
}
