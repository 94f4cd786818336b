#![no_main]
use libfuzzer_sys::fuzz_target;
use roarbits::RoaringBitmap;

fuzz_target!(|data: &[u8]| {
    let Ok(bitmap) = RoaringBitmap::deserialize(data) else {
        return;
    };

    // Anything accepted must be internally consistent.
    assert!(bitmap.directory().is_valid());
    assert_eq!(bitmap.cardinality(), bitmap.iter().count() as u64);

    // Re-encoding yields the canonical layout, which must read back equal.
    let bytes = bitmap.to_bytes();
    assert_eq!(bytes.len(), bitmap.serialized_size());
    let again = RoaringBitmap::from_bytes(&bytes).unwrap();
    assert_eq!(again, bitmap);
});
