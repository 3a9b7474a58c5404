//! # Store round-trip tests
//!
//! This suite covers:
//! - Write/read round-trips for every element type
//! - Canonical file layout (offsets, sizes, sort order)
//! - Mapped vs buffered reader equivalence
//! - Lifecycle and mode errors

use rand::seq::SliceRandom;
use rand::Rng;
use tempfile::TempDir;

use kas_store::{ArrayRef, ElementType, Error, Flags, Mode, Store};

fn no_mmap() -> Flags {
    let mut flags = Flags::default();
    flags.set(Flags::NO_MMAP);
    flags
}

/// Runs `check` against the same file through both reader paths.
fn with_both_readers(path: &std::path::Path, check: impl Fn(&Store<'static>)) {
    for flags in [Flags::default(), no_mmap()] {
        let store: Store<'static> = Store::open(path, Mode::Read, flags).unwrap();
        check(&store);
        store.close().unwrap();
    }
}

#[test]
fn empty_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.kas");

    let store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    store.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 64);
    assert_eq!(&bytes[0..8], b"\x89KAS\r\n\x1a\n");
    // num_items = 0, file_size = 64
    assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
    assert_eq!(&bytes[16..24], &[64, 0, 0, 0, 0, 0, 0, 0]);

    with_both_readers(&path, |store| {
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.get(b"anything").unwrap_err().error_code(), "KEY_NOT_FOUND");
    });
}

#[test]
fn single_small_item_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("single.kas");

    let values = [1i32, 2, 3];
    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    store.put_i32(b"x", &values).unwrap();
    store.close().unwrap();

    // header (64) + descriptor (64) + key (1) + pad (7) + array (12)
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 148);

    // Descriptor fields: type, key_start, key_len, array_start, array_len
    assert_eq!(bytes[64], ElementType::Int32.code());
    assert_eq!(u64::from_le_bytes(bytes[72..80].try_into().unwrap()), 128);
    assert_eq!(u64::from_le_bytes(bytes[80..88].try_into().unwrap()), 1);
    assert_eq!(u64::from_le_bytes(bytes[88..96].try_into().unwrap()), 136);
    assert_eq!(u64::from_le_bytes(bytes[96..104].try_into().unwrap()), 3);

    // Key byte, then 7 zero pad bytes, then the array
    assert_eq!(bytes[128], b'x');
    assert_eq!(&bytes[129..136], &[0u8; 7]);

    with_both_readers(&path, |store| {
        assert_eq!(store.get_i32(b"x").unwrap(), &[1, 2, 3]);
    });
}

#[test]
fn iteration_order_is_lexicographic_shorter_first() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sorted.kas");

    let b = [1u8];
    let aa = [2u8];
    let a = [3u8];
    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    store.put_u8(b"b", &b).unwrap();
    store.put_u8(b"aa", &aa).unwrap();
    store.put_u8(b"a", &a).unwrap();
    store.close().unwrap();

    with_both_readers(&path, |store| {
        let keys: Vec<&[u8]> = store.keys().unwrap().collect();
        assert_eq!(keys, vec![&b"a"[..], &b"aa"[..], &b"b"[..]]);

        let items: Vec<_> = store.iter().unwrap().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].1.as_u8().unwrap(), &[3]);
        assert_eq!(items[1].1.as_u8().unwrap(), &[2]);
        assert_eq!(items[2].1.as_u8().unwrap(), &[1]);
    });
}

#[test]
fn duplicate_key_rejected_and_store_unchanged() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dup.kas");

    let first = [1i64];
    let second = [2i64];
    let other = [3i64];
    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    store.put_i64(b"k", &first).unwrap();

    let err = store.put_i64(b"k", &second).unwrap_err();
    assert_eq!(err.error_code(), "DUPLICATE_KEY");
    assert_eq!(store.len(), 1);

    // A later put of a different key still works.
    store.put_i64(b"other", &other).unwrap();
    store.close().unwrap();

    with_both_readers(&path, |store| {
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_i64(b"k").unwrap(), &[1]);
    });
}

#[test]
fn empty_key_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("emptykey.kas");

    let values = [1u32];
    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    let err = store.put_u32(b"", &values).unwrap_err();
    assert_eq!(err.error_code(), "EMPTY_KEY");
    assert!(store.is_empty());
}

#[test]
fn zero_length_array_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("zero.kas");

    let empty: [f64; 0] = [];
    let tail = [9u8];
    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    store.put_f64(b"empty", &empty).unwrap();
    store.put_u8(b"tail", &tail).unwrap();
    store.close().unwrap();

    with_both_readers(&path, |store| {
        let array = store.get(b"empty").unwrap();
        assert_eq!(array.element_type(), ElementType::Float64);
        assert_eq!(array.len(), 0);
        assert!(store.get_f64(b"empty").unwrap().is_empty());
        assert_eq!(store.get_u8(b"tail").unwrap(), &[9]);
    });
}

#[test]
fn sole_zero_length_array_ends_the_file_in_padding() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("zero-only.kas");

    let empty: [f64; 0] = [];
    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    store.put_f64(b"empty", &empty).unwrap();
    store.close().unwrap();

    // header (64) + descriptor (64) + key (5) + pad to the aligned array
    // offset, which is also the end of the file.
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 136);
    assert_eq!(u64::from_le_bytes(bytes[88..96].try_into().unwrap()), 136);

    with_both_readers(&path, |store| {
        let array = store.get(b"empty").unwrap();
        assert_eq!(array.element_type(), ElementType::Float64);
        assert!(array.is_empty());
    });
}

#[test]
fn all_element_types_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("types.kas");

    let i8s = [-1i8, 0, 1];
    let u8s = [0u8, 255];
    let i32s = [i32::MIN, -1, 0, i32::MAX];
    let u32s = [0u32, u32::MAX];
    let i64s = [i64::MIN, i64::MAX];
    let u64s = [u64::MAX];
    let f32s = [1.5f32, -0.25];
    let f64s = [std::f64::consts::PI];

    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    store.put_i8(b"i8", &i8s).unwrap();
    store.put_u8(b"u8", &u8s).unwrap();
    store.put_i32(b"i32", &i32s).unwrap();
    store.put_u32(b"u32", &u32s).unwrap();
    store.put_i64(b"i64", &i64s).unwrap();
    store.put_u64(b"u64", &u64s).unwrap();
    store.put_f32(b"f32", &f32s).unwrap();
    store.put_f64(b"f64", &f64s).unwrap();
    store.close().unwrap();

    with_both_readers(&path, |store| {
        assert_eq!(store.len(), 8);
        assert_eq!(store.get_i8(b"i8").unwrap(), &i8s);
        assert_eq!(store.get_u8(b"u8").unwrap(), &u8s);
        assert_eq!(store.get_i32(b"i32").unwrap(), &i32s);
        assert_eq!(store.get_u32(b"u32").unwrap(), &u32s);
        assert_eq!(store.get_i64(b"i64").unwrap(), &i64s);
        assert_eq!(store.get_u64(b"u64").unwrap(), &u64s);
        assert_eq!(store.get_f32(b"f32").unwrap(), &f32s);
        assert_eq!(store.get_f64(b"f64").unwrap(), &f64s);
    });
}

#[test]
fn typed_get_rejects_wrong_type() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mismatch.kas");

    let values = [1u32, 2];
    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    store.put_u32(b"k", &values).unwrap();
    store.close().unwrap();

    with_both_readers(&path, |store| {
        assert_eq!(store.get_f32(b"k").unwrap_err().error_code(), "BAD_TYPE");
        assert_eq!(store.get_u32(b"k").unwrap(), &[1, 2]);
    });
}

#[test]
fn arbitrary_key_bytes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rawkeys.kas");

    let values = [7i32];
    let key = [0u8, 255, b'\n', 0];
    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    store.put_i32(&key, &values).unwrap();
    store.close().unwrap();

    with_both_readers(&path, |store| {
        assert_eq!(store.get_i32(&key).unwrap(), &[7]);
        assert!(store.contains(&key).unwrap());
        assert!(!store.contains(b"missing").unwrap());
    });
}

#[test]
fn wrong_mode_operations_fail() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("modes.kas");

    let values = [1i32];
    let mut writer = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    writer.put_i32(b"k", &values).unwrap();
    assert_eq!(writer.mode(), Mode::Write);
    assert_eq!(writer.get(b"k").unwrap_err().error_code(), "BAD_MODE");
    assert!(writer.iter().is_err());
    assert!(writer.file_version().is_none());
    writer.close().unwrap();

    let reader = Store::open(&path, Mode::Read, Flags::default()).unwrap();
    assert_eq!(reader.mode(), Mode::Read);
    assert_eq!(reader.file_version(), Some((1, 0)));
    let mut reader = reader;
    assert_eq!(
        reader.put_i32(b"more", &values).unwrap_err().error_code(),
        "BAD_MODE"
    );
    reader.close().unwrap();
}

#[test]
fn opening_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("does-not-exist.kas");
    let err = Store::open(&path, Mode::Read, Flags::default()).unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
}

#[test]
fn drop_without_close_still_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dropped.kas");

    let values = [42u64];
    {
        let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
        store.put_u64(b"answer", &values).unwrap();
        // dropped here without close()
    }

    with_both_readers(&path, |store| {
        assert_eq!(store.get_u64(b"answer").unwrap(), &[42]);
    });
}

#[test]
fn views_live_as_long_as_the_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("views.kas");

    let values = [1.0f32, 2.0];
    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    store.put_f32(b"v", &values).unwrap();
    store.close().unwrap();

    let store = Store::open(&path, Mode::Read, Flags::default()).unwrap();
    let view = store.get_f32(b"v").unwrap();
    let other = store.get(b"v").unwrap();
    assert_eq!(view, other.as_f32().unwrap());
    drop(store);
}

#[test]
fn randomized_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("random.kas");
    let mut rng = rand::thread_rng();

    // Generate distinct keys with random lengths and values.
    let mut keys: Vec<Vec<u8>> = Vec::new();
    for i in 0..100u32 {
        let mut key = i.to_le_bytes().to_vec();
        key.truncate(1 + (rng.gen::<usize>() % 4));
        key.extend(std::iter::repeat(b'k').take(rng.gen::<usize>() % 3));
        key.extend(i.to_le_bytes());
        keys.push(key);
    }
    keys.sort();
    keys.dedup();

    let arrays: Vec<Vec<i64>> = keys
        .iter()
        .map(|_| (0..rng.gen_range(0..20)).map(|_| rng.gen()).collect())
        .collect();

    // Insert in shuffled order; the writer is responsible for sorting.
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.shuffle(&mut rng);

    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    for &i in &order {
        store.put_i64(&keys[i], &arrays[i]).unwrap();
    }
    store.close().unwrap();

    let expected: std::collections::BTreeMap<&[u8], &[i64]> = keys
        .iter()
        .map(|k| k.as_slice())
        .zip(arrays.iter().map(|a| a.as_slice()))
        .collect();

    with_both_readers(&path, |store| {
        assert_eq!(store.len(), keys.len());
        for (key, array) in &expected {
            assert_eq!(&store.get_i64(key).unwrap(), array);
        }
        // Reported order is the packer's order.
        let seen: Vec<&[u8]> = store.keys().unwrap().collect();
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
    });
}

#[test]
fn array_ref_put_accepts_plain_slices() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("into.kas");

    let values = vec![5i32, 6];
    let mut store = Store::open(&path, Mode::Write, Flags::default()).unwrap();
    store.put(b"v", ArrayRef::Int32(&values)).unwrap();
    store.close().unwrap();

    with_both_readers(&path, |store| {
        let array = store.get(b"v").unwrap();
        assert_eq!(array.element_type(), ElementType::Int32);
        assert_eq!(array.as_bytes(), &[5, 0, 0, 0, 6, 0, 0, 0]);
    });
}

#[test]
fn error_display_is_stable_enough_to_match_kinds() {
    // Kinds, not texts, are the contract; error_code is the stable hook.
    let err = Error::KeyNotFound;
    assert_eq!(err.error_code(), "KEY_NOT_FOUND");
    assert!(!err.to_string().is_empty());
}
