/*!
 * Trust-boundary entry points
 *
 * Each entry point copies its fixed-size payload in, runs one lifecycle
 * operation and, on success only, copies the response back out. The result
 * is a plain integer: 0 on success or a negative errno from
 * [`KeyError::result_code`]. No registry or item lock is held while a
 * payload is being copied.
 */

use thiserror::Error;

use crate::data::DataRegistry;
use crate::error::{error_codes, KeyError, KeyResult};
use crate::key_management::{
    self, KeyDataParams, KeyDeriveParams, KeyGenerateParams, KeyInfoParams, KeyPairParams,
    KeyRegistry,
};
use crate::limits::OwnerId;
use crate::random::RandomSource;
use crate::registry::Descriptor;

/// The far side's memory could not be accessed
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("user memory fault")]
pub struct Fault;

/// A payload slot on the far side of the boundary.
///
/// Copies may block or fault; they are never performed with a lock held.
pub trait UserArg<T: Copy> {
    fn copy_from_user(&self) -> Result<T, Fault>;
    fn copy_to_user(&mut self, value: &T) -> Result<(), Fault>;
}

/// In-memory payload slot, optionally set up to fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserCell<T> {
    value: T,
    fault_on_read: bool,
    fault_on_write: bool,
}

impl<T: Copy> UserCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            fault_on_read: false,
            fault_on_write: false,
        }
    }

    /// A slot whose contents cannot be read
    pub fn unreadable(value: T) -> Self {
        Self {
            fault_on_read: true,
            ..Self::new(value)
        }
    }

    /// A slot that cannot be written back to
    pub fn unwritable(value: T) -> Self {
        Self {
            fault_on_write: true,
            ..Self::new(value)
        }
    }

    pub fn get(&self) -> T {
        self.value
    }
}

impl<T: Copy> UserArg<T> for UserCell<T> {
    fn copy_from_user(&self) -> Result<T, Fault> {
        if self.fault_on_read {
            return Err(Fault);
        }
        Ok(self.value)
    }

    fn copy_to_user(&mut self, value: &T) -> Result<(), Fault> {
        if self.fault_on_write {
            return Err(Fault);
        }
        self.value = *value;
        Ok(())
    }
}

fn copy_in<T: Copy>(arg: &impl UserArg<T>, operation: &str) -> KeyResult<T> {
    arg.copy_from_user()
        .map_err(|_| KeyError::bad_address(operation, "in", error_codes::COPY_FROM_USER_FAILED))
}

fn copy_out<T: Copy>(arg: &mut impl UserArg<T>, value: &T, operation: &str) -> KeyResult<()> {
    arg.copy_to_user(value)
        .map_err(|_| KeyError::bad_address(operation, "out", error_codes::COPY_TO_USER_FAILED))
}

fn result_code(operation: &str, result: KeyResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            log::debug!("{} failed: {}", operation, e);
            e.result_code()
        }
    }
}

/// Create a key and write its descriptor back.
///
/// If the descriptor cannot be written back the new key is destroyed again.
pub fn key_init(keys: &KeyRegistry, owner: OwnerId, arg: &mut impl UserArg<Descriptor>) -> i32 {
    let result = keys.create(owner).and_then(|desc| {
        copy_out(arg, &desc, "key_init").map_err(|e| {
            keys.destroy(desc);
            e
        })
    });
    result_code("key_init", result)
}

/// Destroy the key named by the payload
pub fn key_deinit(keys: &KeyRegistry, arg: &impl UserArg<Descriptor>) -> i32 {
    let result = copy_in(arg, "key_deinit").map(|desc| keys.destroy(desc));
    result_code("key_deinit", result)
}

pub fn key_generate(
    keys: &KeyRegistry,
    random: &dyn RandomSource,
    arg: &impl UserArg<KeyGenerateParams>,
) -> i32 {
    let result = copy_in(arg, "key_generate")
        .and_then(|params| key_management::generate(keys, random, &params));
    result_code("key_generate", result)
}

pub fn key_export(
    keys: &KeyRegistry,
    data: &DataRegistry,
    arg: &impl UserArg<KeyDataParams>,
) -> i32 {
    let result = copy_in(arg, "key_export")
        .and_then(|params| key_management::export(keys, data, &params));
    result_code("key_export", result)
}

pub fn key_import(
    keys: &KeyRegistry,
    data: &DataRegistry,
    arg: &impl UserArg<KeyDataParams>,
) -> i32 {
    let result = copy_in(arg, "key_import")
        .and_then(|params| key_management::import(keys, data, &params));
    result_code("key_import", result)
}

/// Fill the payload's flags, type and algorithm from the named key
pub fn key_info(keys: &KeyRegistry, arg: &mut impl UserArg<KeyInfoParams>) -> i32 {
    let result = copy_in(&*arg, "key_info").and_then(|mut params| {
        let info = key_management::info(keys, params.key)?;
        params.flags = info.flags.bits();
        params.key_type = info.key_type.as_raw();
        params.algorithm = info.algorithm.as_raw();
        copy_out(arg, &params, "key_info")
    });
    result_code("key_info", result)
}

pub fn key_generate_pair(keys: &KeyRegistry, arg: &impl UserArg<KeyPairParams>) -> i32 {
    let result = copy_in(arg, "key_generate_pair")
        .and_then(|params| key_management::generate_pair(keys, &params));
    result_code("key_generate_pair", result)
}

pub fn key_derive(keys: &KeyRegistry, arg: &impl UserArg<KeyDeriveParams>) -> i32 {
    let result = copy_in(arg, "key_derive")
        .and_then(|params| key_management::derive(keys, &params));
    result_code("key_derive", result)
}

pub fn key_get_public(
    keys: &KeyRegistry,
    data: &DataRegistry,
    arg: &impl UserArg<KeyDataParams>,
) -> i32 {
    let result = copy_in(arg, "key_get_public")
        .and_then(|params| key_management::get_public(keys, data, &params));
    result_code("key_get_public", result)
}
