use std::sync::Arc;

use super::*;
use crate::config::{DescriptorPolicy, LimitsConfig};
use crate::data::{DataFlags, DataRegistry};
use crate::limits::{LimitTracker, LimitType, OwnerId};
use crate::random::SeededRandom;

const OWNER: OwnerId = OwnerId(1);

struct Fixture {
    limits: Arc<LimitTracker>,
    keys: KeyRegistry,
    data: DataRegistry,
    random: SeededRandom,
}

fn fixture() -> Fixture {
    fixture_with_quota(16)
}

fn fixture_with_quota(max_keys: usize) -> Fixture {
    let limits = Arc::new(LimitTracker::new(LimitsConfig {
        max_keys_per_owner: max_keys,
        max_data_per_owner: 16,
    }));
    Fixture {
        keys: KeyRegistry::new(limits.clone(), DescriptorPolicy::MaxPlusOne),
        data: DataRegistry::new(limits.clone(), DescriptorPolicy::MaxPlusOne),
        limits,
        random: SeededRandom::new(7),
    }
}

impl Fixture {
    fn secret_key(&self, bits: u32, flags: KeyFlags) -> u32 {
        let d = self.keys.create(OWNER).unwrap();
        generate(
            &self.keys,
            &self.random,
            &KeyGenerateParams::new(d, Algorithm::AesCbc, bits, flags),
        )
        .unwrap();
        d
    }

    fn data_item(&self, capacity: usize, flags: DataFlags, contents: &[u8]) -> u32 {
        self.data
            .create_with(OWNER, capacity, flags, contents)
            .unwrap()
    }
}

#[test]
fn test_created_key_is_zeroed() {
    let f = fixture();
    let d = f.keys.create(OWNER).unwrap();
    let info = info(&f.keys, d).unwrap();
    assert_eq!(info.key_type, KeyType::Unset);
    assert_eq!(info.algorithm, Algorithm::Unset);
    assert_eq!(info.flags, KeyFlags::empty());

    let key = f.keys.lookup(d).unwrap();
    assert_eq!(key.lock().size(), 0);
    assert!(key.key_id().is_empty());
}

#[test]
fn test_create_enforces_quota() {
    let f = fixture_with_quota(2);
    let a = f.keys.create(OWNER).unwrap();
    f.keys.create(OWNER).unwrap();

    let err = f.keys.create(OWNER).unwrap_err();
    assert!(err.is_resource_exhaustion());
    assert_eq!(f.keys.len(), 2);

    f.keys.destroy(a);
    assert!(f.keys.create(OWNER).is_ok());
}

#[test]
fn test_lookup_after_destroy_is_not_found() {
    let f = fixture();
    let d = f.keys.create(OWNER).unwrap();
    let handle = f.keys.lookup(d).unwrap();

    f.keys.destroy(d);
    assert!(f.keys.lookup(d).unwrap_err().is_not_found());

    // The outstanding handle still sees a live item
    assert_eq!(handle.refcount(), 1);
    assert_eq!(handle.info().key_type, KeyType::Unset);
}

#[test]
fn test_item_freed_when_releases_balance() {
    let f = fixture();
    let d = f.keys.create(OWNER).unwrap();
    let first = f.keys.lookup(d).unwrap();
    let second = f.keys.lookup(d).unwrap();
    assert_eq!(first.refcount(), 3);

    f.keys.destroy(d);
    drop(first);
    assert_eq!(f.limits.outstanding(OWNER, LimitType::Key), 1);

    drop(second);
    assert_eq!(f.limits.outstanding(OWNER, LimitType::Key), 0);
}

#[test]
fn test_destroy_unknown_descriptor_is_noop() {
    let f = fixture();
    let d = f.keys.create(OWNER).unwrap();
    f.keys.destroy(d + 10);
    assert!(f.keys.lookup(d).is_ok());
}

#[test]
fn test_generate_secret_key() {
    let f = fixture();
    let d = f.secret_key(128, KeyFlags::EXPORTABLE);

    let info = info(&f.keys, d).unwrap();
    assert_eq!(info.key_type, KeyType::Secret);
    assert_eq!(info.flags, KeyFlags::EXPORTABLE);
    assert_eq!(info.algorithm, GENERATED_KEY_ALGORITHM);

    let key = f.keys.lookup(d).unwrap();
    assert_eq!(key.lock().size(), 16);
    assert_eq!(key.key_id().len(), GENERATED_KEY_ID_SIZE);
}

#[test]
fn test_generate_discards_requested_algorithm() {
    let f = fixture();
    let d = f.keys.create(OWNER).unwrap();
    generate(
        &f.keys,
        &f.random,
        &KeyGenerateParams::new(d, Algorithm::HmacSha2_256, 256, KeyFlags::empty()),
    )
    .unwrap();
    assert_eq!(info(&f.keys, d).unwrap().algorithm, Algorithm::AesCbc);
}

#[test]
fn test_generate_rejects_bad_sizes_and_keeps_material() {
    let f = fixture();
    let d = f.secret_key(128, KeyFlags::EXPORTABLE);
    let before = f.keys.lookup(d).unwrap().secret_material();

    for bits in [12, 129, (MAX_KEY_SIZE as u32 + 1) * 8] {
        let err = generate(
            &f.keys,
            &f.random,
            &KeyGenerateParams::new(d, Algorithm::AesCbc, bits, KeyFlags::empty()),
        )
        .unwrap_err();
        assert!(err.is_invalid_parameter(), "bits = {}", bits);
    }

    let key = f.keys.lookup(d).unwrap();
    assert_eq!(key.secret_material(), before);
    assert_eq!(key.info().flags, KeyFlags::EXPORTABLE);
}

#[test]
fn test_generate_largest_key() {
    let f = fixture();
    let d = f.secret_key(MAX_KEY_SIZE as u32 * 8, KeyFlags::empty());
    assert_eq!(f.keys.lookup(d).unwrap().lock().size(), MAX_KEY_SIZE);
}

#[test]
fn test_generate_rejects_non_secret_algorithms() {
    let f = fixture();
    let d = f.keys.create(OWNER).unwrap();

    for algorithm in [Algorithm::Rsa, Algorithm::Dsa, Algorithm::Sha1, Algorithm::Null] {
        let err = generate(
            &f.keys,
            &f.random,
            &KeyGenerateParams::new(d, algorithm, 128, KeyFlags::empty()),
        )
        .unwrap_err();
        assert!(err.is_invalid_parameter(), "{:?}", algorithm);
    }

    let unknown = KeyGenerateParams {
        desc: d,
        algorithm: 999,
        flags: 0,
        bits: 128,
    };
    assert!(generate(&f.keys, &f.random, &unknown)
        .unwrap_err()
        .is_invalid_parameter());
    assert_eq!(info(&f.keys, d).unwrap().key_type, KeyType::Unset);
}

#[test]
fn test_generate_missing_key() {
    let f = fixture();
    let err = generate(
        &f.keys,
        &f.random,
        &KeyGenerateParams::new(42, Algorithm::AesCbc, 128, KeyFlags::empty()),
    )
    .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_export_copies_material_and_exportability() {
    let f = fixture();
    let exportable = f.secret_key(128, KeyFlags::EXPORTABLE);
    let sealed = f.secret_key(128, KeyFlags::WRAPPABLE);

    let d1 = f.data_item(32, DataFlags::empty(), &[]);
    export(&f.keys, &f.data, &KeyDataParams::new(exportable, d1)).unwrap();
    let item = f.data.lookup(d1).unwrap();
    assert_eq!(item.size(), 16);
    assert_eq!(
        item.contents(),
        f.keys.lookup(exportable).unwrap().secret_material()
    );
    assert!(item.flags().is_exportable());

    let d2 = f.data_item(32, DataFlags::EXPORTABLE, &[]);
    export(&f.keys, &f.data, &KeyDataParams::new(sealed, d2)).unwrap();
    let item = f.data.lookup(d2).unwrap();
    assert!(!item.flags().is_exportable());
    assert_eq!(item.flags(), DataFlags::empty());
}

#[test]
fn test_export_into_small_item_leaves_it_untouched() {
    let f = fixture();
    let k = f.secret_key(256, KeyFlags::EXPORTABLE);
    let d = f.data_item(16, DataFlags::empty(), &[0xAA; 4]);

    let err = export(&f.keys, &f.data, &KeyDataParams::new(k, d)).unwrap_err();
    assert!(err.is_invalid_parameter());

    let item = f.data.lookup(d).unwrap();
    assert_eq!(item.contents().as_bytes(), &[0xAA; 4]);
    assert_eq!(item.flags(), DataFlags::empty());
}

#[test]
fn test_export_rejects_non_secret_and_missing_objects() {
    let f = fixture();
    let unset = f.keys.create(OWNER).unwrap();
    let d = f.data_item(32, DataFlags::empty(), &[]);

    let err = export(&f.keys, &f.data, &KeyDataParams::new(unset, d)).unwrap_err();
    assert!(err.is_invalid_parameter());

    let k = f.secret_key(128, KeyFlags::empty());
    let missing_key = export(&f.keys, &f.data, &KeyDataParams::new(99, d)).unwrap_err();
    let missing_data = export(&f.keys, &f.data, &KeyDataParams::new(k, 99)).unwrap_err();
    assert!(missing_key.is_invalid_parameter());
    assert!(missing_data.is_invalid_parameter());
}

#[test]
fn test_import_loads_material() {
    let f = fixture();
    let k = f.keys.create(OWNER).unwrap();
    let d = f.data_item(32, DataFlags::empty(), &[7; 24]);

    let params = KeyDataParams::for_import(
        k,
        d,
        KeyType::Secret,
        Algorithm::TripleDesCbc,
        KeyFlags::WRAPPABLE,
        b"my-key",
    );
    import(&f.keys, &f.data, &params).unwrap();

    let key = f.keys.lookup(k).unwrap();
    assert_eq!(key.secret_material().as_bytes(), &[7; 24]);
    assert_eq!(key.key_id(), b"my-key");
    assert_eq!(
        key.info(),
        KeyInfo {
            flags: KeyFlags::WRAPPABLE,
            key_type: KeyType::Secret,
            algorithm: Algorithm::TripleDesCbc,
        }
    );
}

#[test]
fn test_import_exportability_only_propagates_upward() {
    let f = fixture();
    let cases = [
        (DataFlags::EXPORTABLE, KeyFlags::empty(), true),
        (DataFlags::empty(), KeyFlags::EXPORTABLE, true),
        (DataFlags::empty(), KeyFlags::empty(), false),
    ];

    for (data_flags, requested, expected) in cases {
        let k = f.keys.create(OWNER).unwrap();
        let d = f.data_item(16, data_flags, &[1; 16]);
        let params =
            KeyDataParams::for_import(k, d, KeyType::Secret, Algorithm::AesCbc, requested, &[]);
        import(&f.keys, &f.data, &params).unwrap();
        assert_eq!(
            info(&f.keys, k).unwrap().flags.is_exportable(),
            expected,
            "data {:?} requested {:?}",
            data_flags,
            requested
        );
    }
}

#[test]
fn test_import_rejects_oversized_data() {
    let f = fixture();
    let k = f.keys.create(OWNER).unwrap();
    let d = f.data_item(64, DataFlags::empty(), &[3; MAX_KEY_SIZE + 1]);

    let params = KeyDataParams::for_import(
        k,
        d,
        KeyType::Secret,
        Algorithm::AesCbc,
        KeyFlags::empty(),
        &[],
    );
    let err = import(&f.keys, &f.data, &params).unwrap_err();
    assert!(err.is_invalid_parameter());
    assert_eq!(f.keys.lookup(k).unwrap().lock().size(), 0);
}

#[test]
fn test_failed_import_keeps_assigned_metadata() {
    let f = fixture();
    let k = f.keys.create(OWNER).unwrap();
    let d = f.data_item(16, DataFlags::EXPORTABLE, &[1; 16]);

    let params = KeyDataParams::for_import(
        k,
        d,
        KeyType::Public,
        Algorithm::Rsa,
        KeyFlags::WRAPPABLE,
        &[],
    );
    let err = import(&f.keys, &f.data, &params).unwrap_err();
    assert!(err.is_invalid_parameter());

    // Fields assigned before the type check stay assigned
    let info = info(&f.keys, k).unwrap();
    assert_eq!(info.key_type, KeyType::Public);
    assert_eq!(info.algorithm, Algorithm::Rsa);
    assert_eq!(info.flags, KeyFlags::WRAPPABLE | KeyFlags::EXPORTABLE);
    assert_eq!(f.keys.lookup(k).unwrap().lock().size(), 0);
}

#[test]
fn test_import_stores_unknown_algorithm_tag() {
    let f = fixture();
    let k = f.keys.create(OWNER).unwrap();
    let d = f.data_item(16, DataFlags::empty(), &[0x3c; 16]);

    let params = KeyDataParams {
        key_type: KeyType::Secret.as_raw(),
        algorithm: 7,
        ..KeyDataParams::new(k, d)
    };
    import(&f.keys, &f.data, &params).unwrap();

    let info = info(&f.keys, k).unwrap();
    assert_eq!(info.key_type, KeyType::Secret);
    assert_eq!(info.algorithm, Algorithm::Other(7));
    assert_eq!(info.algorithm.as_raw(), 7);
    assert_eq!(f.keys.lookup(k).unwrap().lock().size(), 16);
}

#[test]
fn test_import_unknown_key_type_assigns_nothing() {
    let f = fixture();
    let k = f.secret_key(128, KeyFlags::EXPORTABLE);
    let before = info(&f.keys, k).unwrap();
    let material = f.keys.lookup(k).unwrap().secret_material();
    let d = f.data_item(16, DataFlags::EXPORTABLE, &[9; 16]);

    let params = KeyDataParams {
        key_type: 9,
        algorithm: Algorithm::HmacSha1.as_raw(),
        flags: KeyFlags::WRAPPABLE.bits(),
        ..KeyDataParams::new(k, d)
    };
    let err = import(&f.keys, &f.data, &params).unwrap_err();
    assert!(err.is_invalid_parameter());
    assert_eq!(err.error_code(), crate::error::error_codes::INVALID_KEY_TYPE);

    assert_eq!(info(&f.keys, k).unwrap(), before);
    assert_eq!(f.keys.lookup(k).unwrap().secret_material(), material);
}

#[test]
fn test_debug_while_locked() {
    let f = fixture();
    let k = f.secret_key(128, KeyFlags::empty());
    let key = f.keys.lookup(k).unwrap();

    let guard = key.lock();
    let shown = format!("{:?}", *key);
    assert!(shown.contains("<locked>"));
    assert_eq!(guard.size(), 16);
    drop(guard);

    assert!(format!("{:?}", *key).contains("AesCbc"));
}

#[test]
fn test_import_rejects_long_key_id() {
    let f = fixture();
    let k = f.keys.create(OWNER).unwrap();
    let d = f.data_item(16, DataFlags::empty(), &[1; 16]);

    let params = KeyDataParams::for_import(
        k,
        d,
        KeyType::Secret,
        Algorithm::AesCbc,
        KeyFlags::EXPORTABLE,
        &[0x55; MAX_KEY_ID_SIZE + 1],
    );
    assert!(import(&f.keys, &f.data, &params)
        .unwrap_err()
        .is_invalid_parameter());

    let key = f.keys.lookup(k).unwrap();
    assert_eq!(key.info().key_type, KeyType::Secret);
    assert!(key.key_id().is_empty());
    assert_eq!(key.lock().size(), 0);
}

#[test]
fn test_import_missing_objects() {
    let f = fixture();
    let k = f.keys.create(OWNER).unwrap();
    let d = f.data_item(16, DataFlags::empty(), &[]);

    let params = KeyDataParams::for_import(
        99,
        d,
        KeyType::Secret,
        Algorithm::AesCbc,
        KeyFlags::empty(),
        &[],
    );
    assert!(import(&f.keys, &f.data, &params)
        .unwrap_err()
        .is_invalid_parameter());

    let params = KeyDataParams::for_import(
        k,
        99,
        KeyType::Secret,
        Algorithm::AesCbc,
        KeyFlags::empty(),
        &[],
    );
    assert!(import(&f.keys, &f.data, &params)
        .unwrap_err()
        .is_invalid_parameter());
}

#[test]
fn test_info_missing_key() {
    let f = fixture();
    assert!(info(&f.keys, 1).unwrap_err().is_not_found());
}

#[test]
fn test_asymmetric_operations_are_unsupported() {
    let f = fixture();
    let k = f.secret_key(128, KeyFlags::EXPORTABLE);
    let d = f.data_item(16, DataFlags::empty(), &[]);

    let pair = KeyPairParams {
        private_key: k,
        public_key: k,
        algorithm: Algorithm::Rsa.as_raw(),
        flags: 0,
        bits: 2048,
    };
    assert!(generate_pair(&f.keys, &pair).unwrap_err().is_unsupported());
    assert!(generate_pair(&f.keys, &KeyPairParams::default())
        .unwrap_err()
        .is_unsupported());
    assert!(derive(&f.keys, &KeyDeriveParams::default())
        .unwrap_err()
        .is_unsupported());
    assert!(get_public(&f.keys, &f.data, &KeyDataParams::new(k, d))
        .unwrap_err()
        .is_unsupported());
}

#[test]
fn test_algorithm_table() {
    assert_eq!(Algorithm::AesEcb.key_type(), Some(KeyType::Secret));
    assert_eq!(Algorithm::HmacMd5.key_type(), Some(KeyType::Secret));
    assert_eq!(Algorithm::Rsa.key_type(), Some(KeyType::Private));
    assert_eq!(Algorithm::Sha2_512.key_type(), None);
    assert_eq!(Algorithm::from_raw(83), Algorithm::HmacSha2_256);
    assert_eq!(Algorithm::from_raw(7), Algorithm::Other(7));
    assert_eq!(Algorithm::Other(7).as_raw(), 7);
    assert_eq!(Algorithm::Other(7).key_type(), None);
    assert!(!Algorithm::Other(7).is_known());
    assert_eq!(KeyType::from_raw(4), None);
}
