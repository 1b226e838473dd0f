//! Fixed-size request payloads exchanged with the far side of the trust
//! boundary. All fields are plain integers so the structs can be copied in
//! and out by value.

use crate::registry::Descriptor;

use super::item::{Algorithm, KeyFlags, KeyType, MAX_KEY_ID_SIZE};

/// Payload of the generate request
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyGenerateParams {
    pub desc: Descriptor,
    pub algorithm: u32,
    pub flags: u32,
    pub bits: u32,
}

impl KeyGenerateParams {
    pub fn new(desc: Descriptor, algorithm: Algorithm, bits: u32, flags: KeyFlags) -> Self {
        Self {
            desc,
            algorithm: algorithm.as_raw(),
            flags: flags.bits(),
            bits,
        }
    }
}

/// Payload shared by export, import and get-public
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyDataParams {
    pub key: Descriptor,
    pub data: Descriptor,
    pub key_id: [u8; MAX_KEY_ID_SIZE],
    pub key_id_size: u32,
    pub flags: u32,
    pub key_type: u32,
    pub algorithm: u32,
}

impl KeyDataParams {
    /// Payload naming a key and a data item, as used by export
    pub fn new(key: Descriptor, data: Descriptor) -> Self {
        Self {
            key,
            data,
            ..Self::default()
        }
    }

    /// Payload for an import request.
    ///
    /// The declared key-id size is always `key_id.len()`; at most
    /// [`MAX_KEY_ID_SIZE`] bytes fit in the payload, so an oversized id is
    /// truncated here and rejected by the import itself.
    pub fn for_import(
        key: Descriptor,
        data: Descriptor,
        key_type: KeyType,
        algorithm: Algorithm,
        flags: KeyFlags,
        key_id: &[u8],
    ) -> Self {
        let mut params = Self {
            key,
            data,
            key_id_size: key_id.len() as u32,
            flags: flags.bits(),
            key_type: key_type.as_raw(),
            algorithm: algorithm.as_raw(),
            ..Self::default()
        };
        let n = key_id.len().min(MAX_KEY_ID_SIZE);
        params.key_id[..n].copy_from_slice(&key_id[..n]);
        params
    }
}

/// Payload of the info request; the key field is input, the rest output
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyInfoParams {
    pub key: Descriptor,
    pub flags: u32,
    pub key_type: u32,
    pub algorithm: u32,
}

/// Payload of the key-pair generate request
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyPairParams {
    pub private_key: Descriptor,
    pub public_key: Descriptor,
    pub algorithm: u32,
    pub flags: u32,
    pub bits: u32,
}

/// Payload of the derive request
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyDeriveParams {
    pub base_key: Descriptor,
    pub new_key: Descriptor,
    pub algorithm: u32,
    pub flags: u32,
}
