#![no_main]
use std::collections::BTreeSet;

use libfuzzer_sys::fuzz_target;
use roarbits::RoaringBitmap;

/// Spread raw fuzz values over a handful of keys so containers fill up.
fn spread(values: &[u32]) -> Vec<u32> {
    values.iter().map(|v| v % (8 << 16)).collect()
}

fuzz_target!(|data: (Vec<u32>, Vec<u32>, Vec<(bool, u32)>)| {
    let (a, b, edits) = data;
    let (a, b) = (spread(&a), spread(&b));

    let (x, y) = (RoaringBitmap::from_values(a.clone()), RoaringBitmap::from_values(b.clone()));
    let (ra, rb): (BTreeSet<u32>, BTreeSet<u32>) = (a.into_iter().collect(), b.into_iter().collect());

    let and: Vec<u32> = ra.intersection(&rb).copied().collect();
    let or: Vec<u32> = ra.union(&rb).copied().collect();
    let xor: Vec<u32> = ra.symmetric_difference(&rb).copied().collect();
    let diff: Vec<u32> = ra.difference(&rb).copied().collect();

    assert_eq!(x.and(&y).iter().collect::<Vec<_>>(), and);
    assert_eq!(x.or(&y).iter().collect::<Vec<_>>(), or);
    assert_eq!(x.xor(&y).iter().collect::<Vec<_>>(), xor);
    assert_eq!(x.and_not(&y).iter().collect::<Vec<_>>(), diff);

    let mut m = x.clone();
    let mut rm = ra.clone();
    for (insert, v) in edits {
        let v = v % (8 << 16);
        if insert {
            assert_eq!(m.add(v), rm.insert(v));
        } else {
            assert_eq!(m.remove(v), rm.remove(&v));
        }
    }
    assert!(m.directory().is_valid());
    assert_eq!(m.iter().collect::<Vec<_>>(), rm.into_iter().collect::<Vec<_>>());
});
