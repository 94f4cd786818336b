use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use roarbits::container::SPARSE_MAX;
use roarbits::{BlockPool, Container, Error, PoolConfig, RoaringBitmap};

fn bitmap(values: impl IntoIterator<Item = u32>) -> RoaringBitmap {
    values.into_iter().collect()
}

fn first_container(b: &RoaringBitmap) -> &Container {
    b.containers().next().map(|(_, c)| c).unwrap()
}

fn hash_of(b: &RoaringBitmap) -> u64 {
    let mut h = DefaultHasher::new();
    b.hash(&mut h);
    h.finish()
}

#[test]
fn test_union_of_small_interleaved_sets() {
    let a = bitmap([1, 3, 5, 7, 8, 9, 11, 12, 13, 14, 15]);
    let b = bitmap([2, 4, 6, 8, 9, 10]);
    let u = &a | &b;
    assert_eq!(u.cardinality(), 15);
    assert_eq!(u.iter().collect::<Vec<_>>(), (1..=15).collect::<Vec<_>>());
}

#[test]
fn test_union_across_distant_keys() {
    let a = bitmap([1, 3, 5, 7, 8, 9]);
    let b = bitmap([2, 4, 6, 8, 9, 10, 11, 12, 13, 14, 15, (1 << 31) - 1]);
    let u = &a | &b;
    assert_eq!(u.cardinality(), 16);
    assert_eq!(u.container_count(), 2);
    assert_eq!(u.max(), Some((1 << 31) - 1));
}

#[test]
fn test_union_with_full_key() {
    let u = RoaringBitmap::from_range(0..65_536) | RoaringBitmap::from_range(5000..25_000);
    assert_eq!(u.cardinality(), 65_536);
    assert!(first_container(&u).is_full());
}

#[test]
fn test_union_of_overlapping_ranges() {
    let u = RoaringBitmap::from_range(0..15_000) | RoaringBitmap::from_range(5000..25_000);
    assert_eq!(u.cardinality(), 25_000);
    assert!(first_container(&u).is_dense());
}

#[test]
fn test_equality_is_set_equality() {
    let contiguous = RoaringBitmap::from_range(0..76_636);
    let build = || {
        let mut b = RoaringBitmap::from_range(0..65_536);
        b.add_many(65_538..65_538 + 11_100);
        b
    };
    let gapped = build();
    assert_eq!(contiguous.cardinality(), gapped.cardinality());
    assert_ne!(contiguous, gapped);

    let again = build();
    assert_eq!(gapped, again);
    assert_eq!(hash_of(&gapped), hash_of(&again));

    // Same set reached through different operation histories.
    let mut via_removal = RoaringBitmap::from_range(0..65_538 + 11_100);
    via_removal.remove_many([65_536, 65_537]);
    assert_eq!(via_removal, gapped);
    assert_eq!(hash_of(&via_removal), hash_of(&gapped));
}

#[test]
fn test_union_sparse_with_high_values() {
    let mut left: Vec<u32> = vec![1, 2, 3, 5];
    left.extend(7..=15);
    left.push(i32::MAX as u32);
    let mut right: Vec<u32> = vec![4, 6];
    right.extend(1_000_012..=1_000_015);

    let u = bitmap(left) | bitmap(right);
    assert_eq!(u.cardinality(), 20);
    assert!(u.contains(1_000_013));
    assert!(u.contains(i32::MAX as u32));
}

#[test]
fn test_union_of_disjoint_ranges() {
    let u = RoaringBitmap::from_range(10_000..15_000) | RoaringBitmap::from_range(5000..6000);
    assert_eq!(u.cardinality(), 6000);
    assert!(first_container(&u).is_dense());
}

#[test]
fn test_threshold_boundary() {
    let max = SPARSE_MAX as u32;

    let at = RoaringBitmap::from_range(0..max);
    assert!(first_container(&at).is_sparse());
    let above = RoaringBitmap::from_range(0..max + 1);
    assert!(first_container(&above).is_dense());

    // OR pushes a container from T - 1 to T + 1.
    let almost = RoaringBitmap::from_range(0..max - 1);
    let pushed = &almost | &bitmap([max + 10, max + 11]);
    assert_eq!(pushed.cardinality(), u64::from(max) + 1);
    assert!(first_container(&pushed).is_dense());

    // AND_NOT drains a dense container back under the threshold.
    let drained = &above - &bitmap([0]);
    assert!(first_container(&drained).is_sparse());
    let mut drained_in_place = above.clone();
    drained_in_place.remove(0);
    assert!(first_container(&drained_in_place).is_sparse());
    assert_eq!(drained, drained_in_place);

    // AND of two dense containers can land sparse.
    let overlap =
        RoaringBitmap::from_range(0..max + 100) & RoaringBitmap::from_range(max..2 * max + 100);
    assert_eq!(overlap.cardinality(), 100);
    assert!(first_container(&overlap).is_sparse());
}

#[test]
fn test_complement() {
    let b = bitmap([0, 1, 65_536, u32::MAX]);
    let c = !&b;
    assert_eq!(c.cardinality(), (1u64 << 32) - 4);
    assert_eq!(c.min(), Some(2));
    assert_eq!(c.max(), Some(u32::MAX - 1));
    assert!(!c.contains(65_536));
    assert_eq!(!c, b);

    let everything = !RoaringBitmap::new();
    assert_eq!(everything.container_count(), 65_536);
    assert!((!everything).is_empty());
}

#[test]
fn test_golden_empty_bitmap() {
    assert_eq!(
        RoaringBitmap::new().to_bytes(),
        vec![0x3A, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_golden_mixed_bitmap() {
    let b = bitmap([1, 2, 3, 100_000]);
    let bytes = b.to_bytes();
    assert_eq!(
        bytes,
        [
            0x3A, 0x30, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x00,
            0x00, 0x00, 0x18, 0x00, 0x00, 0x00, 0x1E, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00,
            0x03, 0x00, 0xA0, 0x86,
        ]
    );
    assert_eq!(RoaringBitmap::from_bytes(&bytes).unwrap(), b);
}

#[test]
fn test_roundtrip_dense_only() {
    let b = RoaringBitmap::from_range(0..4 * 65_536) - bitmap([7, 65_536 + 9]);
    assert_eq!(b.container_count(), 4);
    assert!(b.containers().all(|(_, c)| c.is_dense()));
    let back = RoaringBitmap::from_bytes(&b.to_bytes()).unwrap();
    assert_eq!(back, b);
}

#[test]
fn test_pool_lifecycle() {
    let b = RoaringBitmap::from_range(0..3 * 65_536) | bitmap([1 << 24]);
    let bytes = b.to_bytes();

    let pool = BlockPool::new(PoolConfig::default().blocks(4));
    assert_eq!(pool.capacity(), 4);
    let pooled = RoaringBitmap::deserialize_with_pool(bytes.as_slice(), &pool).unwrap();
    assert_eq!(pooled, b);
    assert_eq!(pool.in_use(), 3);

    // Operator results never hold pooled blocks.
    let derived = &pooled | &b;
    drop(pooled);
    assert_eq!(pool.in_use(), 0);
    assert_eq!(derived, b);

    let tiny = BlockPool::with_blocks(2);
    assert!(matches!(
        RoaringBitmap::deserialize_with_pool(bytes.as_slice(), &tiny),
        Err(Error::PoolExhausted { capacity: 2 })
    ));
    assert_eq!(tiny.in_use(), 0);
}

#[test]
fn test_foreign_block_rejected() {
    let a = BlockPool::with_blocks(1);
    let b = BlockPool::with_blocks(1);
    let block = a.rent().unwrap();
    let err = b.give_back(block).unwrap_err();
    assert!(matches!(err, Error::ForeignBuffer));
    assert!(!err.is_format());
    assert_eq!(a.in_use(), 0);
}

#[test]
fn test_truncated_stream_is_format_error() {
    let bytes = RoaringBitmap::from_range(0..10_000).to_bytes();
    let err = RoaringBitmap::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
    assert!(matches!(err, Error::Truncated(_)));
    assert!(err.is_format());
}
