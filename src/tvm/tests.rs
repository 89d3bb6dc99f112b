//! Integration tests and additional test coverage for TVM modules

use crate::tvm::*;
use num_bigint::BigUint;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::Arc;

fn random_cell(rng: &mut StdRng, depth: usize) -> Arc<Cell> {
    let mut builder = Builder::new();
    let bits = rng.gen_range(0..=MAX_CELL_BITS);
    let bytes: Vec<u8> = (0..bits.div_ceil(8)).map(|_| rng.r#gen()).collect();
    builder.store_bits(&bytes, bits).unwrap();

    if depth > 0 {
        for _ in 0..rng.gen_range(0..=MAX_CELL_REFS) {
            builder.store_ref(random_cell(rng, depth - 1)).unwrap();
        }
    }
    builder.build().unwrap()
}

/// Hash depends on content only, not on how the cell was assembled
#[test]
fn test_hash_consistency() {
    let mut builder = CellBuilder::new();
    builder.store_byte(0x11).unwrap();
    builder.store_byte(0x22).unwrap();
    builder.store_byte(0x33).unwrap();
    let cell1 = builder.build().unwrap();

    let mut h_builder = Builder::new();
    h_builder.store_bytes(&[0x11, 0x22, 0x33]).unwrap();
    let cell2 = h_builder.build().unwrap();

    let mut bit_builder = Builder::new();
    bit_builder.store_uint(0x1, 4).unwrap();
    bit_builder.store_big_uint(&BigUint::from(0x12233u32), 20).unwrap();
    let cell3 = bit_builder.build().unwrap();

    assert_eq!(cell1.hash(), cell2.hash());
    assert_eq!(cell2.hash(), cell3.hash());
    assert_eq!(cell1, cell3);
}

/// Structurally identical trees built from separate instances hash the same
#[test]
fn test_hash_structural_identity() {
    let build_tree = || {
        let mut child = Builder::new();
        child.store_u32(111).unwrap();
        let child = child.build().unwrap();

        let mut root = Builder::new();
        root.store_u32(999).unwrap();
        root.store_ref(child).unwrap();
        root.build().unwrap()
    };

    let a = build_tree();
    let b = build_tree();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.hash(), b.hash());
    assert_eq!(a, b);
}

/// Field order is part of the encoding
#[test]
fn test_field_order_matters() {
    let mut first = Builder::new();
    first.store_u32(1).unwrap();
    first.store_u32(2).unwrap();

    let mut second = Builder::new();
    second.store_u32(2).unwrap();
    second.store_u32(1).unwrap();

    assert_ne!(first.build().unwrap().hash(), second.build().unwrap().hash());
}

/// Reference order changes the hash as well
#[test]
fn test_reference_order_matters() {
    let mut a = Builder::new();
    a.store_u32(1).unwrap();
    let a = a.build().unwrap();
    let mut b = Builder::new();
    b.store_u32(2).unwrap();
    let b = b.build().unwrap();

    let mut ab = Builder::new();
    ab.store_ref(a.clone()).unwrap();
    ab.store_ref(b.clone()).unwrap();
    let mut ba = Builder::new();
    ba.store_ref(b).unwrap();
    ba.store_ref(a).unwrap();

    assert_ne!(ab.build().unwrap().hash(), ba.build().unwrap().hash());
}

/// Boundary: 2^bits - 1 fits, 2^bits does not
#[test]
fn test_uint_width_boundaries() {
    for bits in [1usize, 8, 32, 63] {
        let mut builder = Builder::new();
        builder.store_uint((1u64 << bits) - 1, bits).unwrap();
        assert_eq!(
            builder.store_uint(1u64 << bits, bits).unwrap_err(),
            TvmError::ValueOutOfRange { bits }
        );
    }

    for bits in [128usize, 256] {
        let limit = BigUint::from(1u8) << bits;
        let mut builder = Builder::new();
        builder.store_big_uint(&(&limit - 1u8), bits).unwrap();
        assert_eq!(
            builder.store_big_uint(&limit, bits).unwrap_err(),
            TvmError::ValueOutOfRange { bits }
        );
    }
}

/// A fifth child reference is rejected
#[test]
fn test_fifth_reference() {
    let child = Builder::new().build().unwrap();
    let mut builder = Builder::new();
    for _ in 0..4 {
        builder.store_ref(child.clone()).unwrap();
    }
    assert_eq!(builder.available_refs(), 0);
    assert!(matches!(
        builder.store_ref(child),
        Err(TvmError::CapacityExceeded { refs: 5, .. })
    ));
}

/// Overflowing the bit budget through wide fields is rejected
#[test]
fn test_bit_overflow_through_fields() {
    let mut builder = Builder::new();
    for _ in 0..3 {
        builder.store_big_uint(&BigUint::from(1u8), 256).unwrap();
    }
    assert_eq!(builder.available_bits(), 255);
    assert!(matches!(
        builder.store_big_uint(&BigUint::from(1u8), 256),
        Err(TvmError::CapacityExceeded { bits: 1024, refs: 0 })
    ));
}

/// Test BoC with references
#[test]
fn test_boc_with_references() {
    let mut ref_builder_1 = Builder::new();
    ref_builder_1.store_u32(111).unwrap();
    let mut ref_builder_2 = Builder::new();
    ref_builder_2.store_u32(222).unwrap();

    let mut root_builder = Builder::new();
    root_builder.store_u32(999).unwrap();
    root_builder.store_ref(ref_builder_1.build().unwrap()).unwrap();
    root_builder.store_ref(ref_builder_2.build().unwrap()).unwrap();
    let root = root_builder.build().unwrap();

    let boc = serialize_boc(&root, false).unwrap();
    let deserialized = deserialize_boc(&boc).unwrap();

    assert_eq!(deserialized.reference_count(), 2);
    assert_eq!(root, deserialized);
    assert_eq!(root.hash(), deserialized.hash());
}

/// build -> serialize -> parse yields an equal cell for random trees
#[test]
fn test_boc_random_round_trip() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..32 {
        let root = random_cell(&mut rng, 3);
        let with_crc = rng.r#gen();
        let boc = serialize_boc(&root, with_crc).unwrap();
        let parsed = deserialize_boc(&boc).unwrap();
        assert_eq!(parsed, root);
        assert_eq!(parsed.hash(), root.hash());
        assert_eq!(parsed.depth(), root.depth());
    }
}

/// parse(to_user_friendly(parse(raw))) == parse(raw)
#[test]
fn test_address_random_round_trip() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..64 {
        let workchain: i8 = if rng.r#gen() { 0 } else { -1 };
        let hash_part: [u8; 32] = rng.r#gen();
        let raw = format!("{}:{}", workchain, hex::encode(hash_part));

        let parsed = Address::parse(&raw).unwrap();
        let flags = AddressFlags {
            url_safe: rng.r#gen(),
            bounceable: rng.r#gen(),
            test_only: rng.r#gen(),
        };
        let friendly = parsed.to_user_friendly(flags);
        let (reparsed, reparsed_flags) = Address::from_user_friendly(&friendly).unwrap();

        assert_eq!(reparsed, parsed);
        assert_eq!(reparsed.to_raw(), raw);
        assert_eq!(reparsed_flags.bounceable, flags.bounceable);
        assert_eq!(reparsed_flags.test_only, flags.test_only);
    }
}

/// Address and builder integration
#[test]
fn test_address_builder_integration() {
    let addr = Address::new(-1, [0x12; 32]);

    let mut builder = Builder::new();
    builder.store_address(Some(&addr)).unwrap();
    let cell = builder.build().unwrap();
    assert_eq!(cell.bit_len(), 267);

    let mut builder2 = Builder::new();
    builder2.store_address(Some(&addr)).unwrap();
    let cell2 = builder2.build().unwrap();
    assert_eq!(cell.hash(), cell2.hash());

    let mut slice = Slice::new(cell);
    assert_eq!(slice.load_address().unwrap(), Some(addr));
    assert!(slice.is_empty());
}
