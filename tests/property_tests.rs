use std::collections::BTreeSet;

use proptest::prelude::*;
use roarbits::{simd, words, BitOp, RoaringBitmap};

/// Values over a few keys: scattered points plus ranges long enough to
/// produce dense containers and to straddle key boundaries.
fn values() -> impl Strategy<Value = Vec<u32>> {
    let point = (0u32..6, any::<u16>()).prop_map(|(key, low)| (key << 16) | u32::from(low));
    let run = (0u32..6, any::<u16>(), 0u32..12_000).prop_map(|(key, low, len)| {
        let start = (key << 16) | u32::from(low);
        (start, len)
    });
    (
        prop::collection::vec(point, 0..300),
        prop::collection::vec(run, 0..3),
    )
        .prop_map(|(points, runs)| {
            let mut all = points;
            for (start, len) in runs {
                all.extend(start..start.saturating_add(len));
            }
            all
        })
}

fn reference(values: &[u32]) -> BTreeSet<u32> {
    values.iter().copied().collect()
}

fn contents(bitmap: &RoaringBitmap) -> Vec<u32> {
    bitmap.iter().collect()
}

fn sorted(set: &BTreeSet<u32>) -> Vec<u32> {
    set.iter().copied().collect()
}

proptest! {
    #[test]
    fn test_construction_matches_reference(input in values()) {
        let bitmap = RoaringBitmap::from_values(input.iter().copied());
        let expected = reference(&input);

        prop_assert!(bitmap.directory().is_valid());
        prop_assert_eq!(bitmap.cardinality(), expected.len() as u64);
        prop_assert_eq!(contents(&bitmap), sorted(&expected));
        prop_assert_eq!(bitmap.min(), expected.first().copied());
        prop_assert_eq!(bitmap.max(), expected.last().copied());
        for v in input.iter().take(50) {
            prop_assert!(bitmap.contains(*v));
        }
    }

    #[test]
    fn test_serialization_roundtrip(input in values()) {
        let bitmap = RoaringBitmap::from_values(input);

        let mut bytes = Vec::new();
        let written = bitmap.serialize(&mut bytes).unwrap();
        prop_assert_eq!(written, bitmap.serialized_size());
        prop_assert_eq!(&bytes, &bitmap.to_bytes());

        let back = RoaringBitmap::deserialize(bytes.as_slice()).unwrap();
        prop_assert_eq!(&back, &bitmap);
        prop_assert_eq!(RoaringBitmap::from_bytes(&bytes).unwrap(), bitmap);
    }

    #[test]
    fn test_binary_ops_match_reference(a in values(), b in values()) {
        let (x, y) = (RoaringBitmap::from_values(a.clone()), RoaringBitmap::from_values(b.clone()));
        let (ra, rb) = (reference(&a), reference(&b));

        let cases = [
            (x.and(&y), sorted(&ra.intersection(&rb).copied().collect())),
            (x.or(&y), sorted(&ra.union(&rb).copied().collect())),
            (x.xor(&y), sorted(&ra.symmetric_difference(&rb).copied().collect())),
            (x.and_not(&y), sorted(&ra.difference(&rb).copied().collect())),
        ];
        for (got, expected) in cases {
            prop_assert!(got.directory().is_valid());
            prop_assert_eq!(contents(&got), expected);
        }
    }

    #[test]
    fn test_algebra_identities(a in values(), b in values(), c in values()) {
        let (a, b, c) = (
            RoaringBitmap::from_values(a),
            RoaringBitmap::from_values(b),
            RoaringBitmap::from_values(c),
        );

        prop_assert_eq!(&a | &b, &b | &a);
        prop_assert_eq!(&a & &b, &b & &a);
        prop_assert_eq!(&a ^ &b, &b ^ &a);
        prop_assert_eq!((&a | &b) & &c, (&a & &c) | (&b & &c));

        let both = (&a & &b).cardinality();
        prop_assert_eq!((&a - &b).cardinality(), a.cardinality() - both);
        prop_assert_eq!((&a ^ &b).cardinality(), (&a | &b).cardinality() - both);

        prop_assert_eq!(RoaringBitmap::union_all([&a, &b, &c]), &(&a | &b) | &c);
    }

    #[test]
    fn test_mutation_consistency(
        initial in values(),
        ops in prop::collection::vec((0u8..4, values()), 0..6),
    ) {
        let mut bitmap = RoaringBitmap::from_values(initial.iter().copied());
        let mut expected = reference(&initial);

        for (kind, batch) in ops {
            match kind {
                0 => {
                    for &v in batch.iter().take(40) {
                        prop_assert_eq!(bitmap.add(v), expected.insert(v));
                    }
                }
                1 => {
                    for &v in batch.iter().take(40) {
                        prop_assert_eq!(bitmap.remove(v), expected.remove(&v));
                    }
                }
                2 => {
                    expected.extend(batch.iter().copied());
                    bitmap.add_many(batch);
                }
                _ => {
                    for v in &batch {
                        expected.remove(v);
                    }
                    bitmap.remove_many(batch);
                }
            }
            prop_assert!(bitmap.directory().is_valid());
            prop_assert_eq!(bitmap.cardinality(), bitmap.iter().count() as u64);
        }
        prop_assert_eq!(contents(&bitmap), sorted(&expected));
        prop_assert_eq!(bitmap.optimize(), bitmap);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_double_complement(input in values()) {
        let bitmap = RoaringBitmap::from_values(input);
        let complement = bitmap.not();
        prop_assert_eq!(complement.cardinality(), (1u64 << 32) - bitmap.cardinality());
        prop_assert!((&complement & &bitmap).is_empty());
        prop_assert_eq!(complement.not(), bitmap);
    }
}

proptest! {
    #[test]
    fn test_simd_popcount_matches_scalar(
        data in prop::collection::vec(any::<u64>(), 0..2048),
        skip in 0usize..4,
    ) {
        let slice = &data[skip.min(data.len())..];
        prop_assert_eq!(simd::popcount(slice), words::popcount(slice));
    }

    #[test]
    fn test_simd_combine_matches_scalar(
        pairs in prop::collection::vec(any::<(u64, u64)>(), 0..600),
        dst_skip in 0usize..4,
        src_skip in 0usize..4,
    ) {
        let (a, b): (Vec<u64>, Vec<u64>) = pairs.into_iter().unzip();
        let n = a.len().saturating_sub(dst_skip.max(src_skip));

        for op in BitOp::ALL {
            let src = &b[src_skip.min(b.len())..][..n];

            let mut fast = a.clone();
            simd::combine_into(op, &mut fast[dst_skip.min(a.len())..][..n], src);

            let mut slow = a.clone();
            words::combine_into(op, &mut slow[dst_skip.min(a.len())..][..n], src);

            prop_assert_eq!(fast, slow);
        }
    }
}
