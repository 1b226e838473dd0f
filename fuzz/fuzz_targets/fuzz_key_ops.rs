#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use keycore::boundary::{self, UserCell};
use keycore::key_management::{KeyDataParams, KeyGenerateParams, KeyInfoParams, MAX_KEY_ID_SIZE};
use keycore::limits::LimitType;
use keycore::random::SeededRandom;
use keycore::{DataFlags, KeyStoreConfig, LimitTracker, OwnerId, Session};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    CreateKey,
    DestroyKey(u8),
    CreateData { capacity: u8, exportable: bool, contents: Vec<u8> },
    DestroyData(u8),
    Generate { key: u8, algorithm: u32, flags: u32, bits: u32 },
    Export { key: u8, data: u8 },
    Import {
        key: u8,
        data: u8,
        key_type: u32,
        algorithm: u32,
        flags: u32,
        key_id: [u8; MAX_KEY_ID_SIZE],
        key_id_size: u32,
    },
    Info(u8),
}

#[derive(Arbitrary, Debug)]
struct KeyOpsFuzzInput {
    seed: u64,
    ops: Vec<Op>,
}

fuzz_target!(|input: KeyOpsFuzzInput| {
    let owner = OwnerId(1);
    let limits = Arc::new(LimitTracker::default());
    let random = SeededRandom::new(input.seed);
    let session = Session::with_collaborators(
        owner,
        &KeyStoreConfig::default(),
        limits.clone(),
        Arc::new(SeededRandom::new(input.seed)),
    );

    for op in input.ops.into_iter().take(256) {
        let code = match op {
            Op::CreateKey => {
                let mut arg = UserCell::new(0);
                boundary::key_init(session.keys(), owner, &mut arg)
            }
            Op::DestroyKey(d) => boundary::key_deinit(session.keys(), &UserCell::new(d as u32)),
            Op::CreateData { capacity, exportable, contents } => {
                let flags = if exportable { DataFlags::EXPORTABLE } else { DataFlags::empty() };
                let _ = session
                    .data()
                    .create_with(owner, capacity as usize, flags, &contents);
                0
            }
            Op::DestroyData(d) => {
                session.destroy_data(d as u32);
                0
            }
            Op::Generate { key, algorithm, flags, bits } => {
                let params = KeyGenerateParams { desc: key as u32, algorithm, flags, bits };
                boundary::key_generate(session.keys(), &random, &UserCell::new(params))
            }
            Op::Export { key, data } => {
                let params = KeyDataParams::new(key as u32, data as u32);
                boundary::key_export(session.keys(), session.data(), &UserCell::new(params))
            }
            Op::Import { key, data, key_type, algorithm, flags, key_id, key_id_size } => {
                let params = KeyDataParams {
                    key: key as u32,
                    data: data as u32,
                    key_id,
                    key_id_size,
                    flags,
                    key_type,
                    algorithm,
                };
                boundary::key_import(session.keys(), session.data(), &UserCell::new(params))
            }
            Op::Info(key) => {
                let mut arg = UserCell::new(KeyInfoParams { key: key as u32, ..KeyInfoParams::default() });
                boundary::key_info(session.keys(), &mut arg)
            }
        };
        assert!(code <= 0);

        // Every live key is within bounds
        for d in session.keys().descriptors() {
            if let Ok(key) = session.lookup_key(d) {
                let state = key.lock();
                assert!(state.size() <= keycore::MAX_KEY_SIZE);
                assert!(state.key_id().len() <= MAX_KEY_ID_SIZE);
            }
        }
        assert_eq!(limits.outstanding(owner, LimitType::Key), session.keys().len());
    }

    drop(session);
    assert_eq!(limits.outstanding(owner, LimitType::Key), 0);
    assert_eq!(limits.outstanding(owner, LimitType::Data), 0);
});
