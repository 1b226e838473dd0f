/*!
 * Key lifecycle operations
 *
 * Generate, export, import and info act on a key that already exists in a
 * [`KeyRegistry`]. Each operation takes a strong handle for its duration;
 * the handle is released on every return path when it goes out of scope.
 *
 * When a key item and a data item are both locked, the key is locked first.
 */

use crate::data::{DataFlags, DataHandle, DataRegistry};
use crate::error::{error_codes, KeyError, KeyResult};
use crate::random::RandomSource;
use crate::registry::Descriptor;
use crate::secure_memory::SecureBytes;

use super::item::{
    Algorithm, KeyFlags, KeyInfo, KeyType, GENERATED_KEY_ALGORITHM, GENERATED_KEY_ID_SIZE,
    MAX_KEY_ID_SIZE, MAX_KEY_SIZE,
};
use super::keyring::{KeyHandle, KeyRegistry};
use super::params::{KeyDataParams, KeyDeriveParams, KeyGenerateParams, KeyPairParams};

// Export and import report a missing object as a bad argument rather than
// not-found.
fn key_argument(keys: &KeyRegistry, descriptor: Descriptor, operation: &str) -> KeyResult<KeyHandle> {
    keys.lookup(descriptor).map_err(|_| {
        log::debug!("{}: no key {}", operation, descriptor);
        KeyError::invalid_parameter("key", "a live key descriptor", &descriptor.to_string())
    })
}

fn data_argument(
    data: &DataRegistry,
    descriptor: Descriptor,
    operation: &str,
) -> KeyResult<DataHandle> {
    data.lookup(descriptor).map_err(|_| {
        log::debug!("{}: no data item {}", operation, descriptor);
        KeyError::invalid_parameter("data", "a live data descriptor", &descriptor.to_string())
    })
}

fn require_secret(key_type: KeyType, operation: &str) -> KeyResult<()> {
    if key_type != KeyType::Secret {
        log::debug!("{}: {:?} keys are not supported", operation, key_type);
        return Err(KeyError::invalid_parameter_with_code(
            "key_type",
            "secret key",
            &format!("{:?}", key_type),
            error_codes::INVALID_KEY_TYPE,
        ));
    }
    Ok(())
}

/// Fill a secret key with fresh random material.
///
/// The requested algorithm only selects the key type; the key is always
/// recorded with the [`GENERATED_KEY_ALGORITHM`] tag. On any error the key's
/// existing fields are left as they were.
///
/// # Errors
///
/// * `NotFound` if the key does not exist
/// * `InvalidParameter` for an unknown or non-secret algorithm, or a bit
///   count that is not a multiple of 8 or exceeds [`MAX_KEY_SIZE`] bytes
/// * `RandomGenerationError` if the random source fails
pub fn generate(
    keys: &KeyRegistry,
    random: &dyn RandomSource,
    params: &KeyGenerateParams,
) -> KeyResult<()> {
    let key = keys.lookup(params.desc)?;

    let algorithm = Algorithm::from_raw(params.algorithm);
    if !algorithm.is_known() {
        log::debug!("generate: unknown algorithm {}", params.algorithm);
        return Err(KeyError::invalid_parameter_with_code(
            "algorithm",
            "a known algorithm",
            &params.algorithm.to_string(),
            error_codes::INVALID_ALGORITHM,
        ));
    }
    // Asymmetric generation goes through generate_pair
    require_secret(algorithm.key_type().unwrap_or_default(), "generate")?;

    let size = (params.bits / 8) as usize;
    if params.bits % 8 != 0 || size > MAX_KEY_SIZE {
        log::debug!("generate: unusable key size of {} bits", params.bits);
        return Err(KeyError::invalid_parameter_with_code(
            "bits",
            &format!("a multiple of 8 up to {}", MAX_KEY_SIZE * 8),
            &params.bits.to_string(),
            error_codes::INVALID_KEY_SIZE,
        ));
    }

    let mut secret = SecureBytes::try_zeroed(size)?;
    random.fill_random(secret.as_bytes_mut())?;
    let mut key_id = SecureBytes::try_zeroed(GENERATED_KEY_ID_SIZE)?;
    random.fill_random(key_id.as_bytes_mut())?;

    let mut state = key.lock();
    state.secret = secret;
    state.key_id = key_id;
    state.key_type = KeyType::Secret;
    state.flags = KeyFlags::from_bits(params.flags);
    state.algorithm = GENERATED_KEY_ALGORITHM;
    Ok(())
}

/// Copy a secret key's material into a data item.
///
/// The data item's flags are replaced: it is exportable exactly when the key
/// is. Every check runs before anything is written, so a failed export
/// leaves the data item untouched.
///
/// # Errors
///
/// `InvalidParameter` if either object is missing, the key is not a secret
/// key, or the key does not fit in the data item.
pub fn export(keys: &KeyRegistry, data: &DataRegistry, params: &KeyDataParams) -> KeyResult<()> {
    let key = key_argument(keys, params.key, "export")?;
    let ditem = data_argument(data, params.data, "export")?;

    let state = key.lock();
    require_secret(state.key_type, "export")?;

    let mut dstate = ditem.lock();
    if state.size() > dstate.capacity() {
        log::debug!(
            "export: key of {} bytes does not fit in {} bytes",
            state.size(),
            dstate.capacity()
        );
        return Err(KeyError::invalid_parameter_with_code(
            "data",
            &format!("capacity of at least {} bytes", state.size()),
            &format!("{} bytes", dstate.capacity()),
            error_codes::INSUFFICIENT_CAPACITY,
        ));
    }

    dstate.write(state.secret.as_bytes())?;
    dstate.set_flags(if state.flags.is_exportable() {
        DataFlags::EXPORTABLE
    } else {
        DataFlags::empty()
    });
    Ok(())
}

/// Load a key from a data item.
///
/// Type, algorithm and flags are assigned before the remaining checks run
/// and stay assigned if a later check fails. The algorithm tag is stored
/// as given, known or not. A key type outside [`KeyType`] cannot be stored
/// and is refused before anything is assigned. If the data item is
/// exportable the key becomes exportable whatever the caller asked for; a
/// non-exportable data item never clears the bit.
///
/// # Errors
///
/// `InvalidParameter` if either object is missing, the type is unknown or
/// not secret, the key id is longer than
/// [`MAX_KEY_ID_SIZE`], or the data is longer than [`MAX_KEY_SIZE`].
pub fn import(keys: &KeyRegistry, data: &DataRegistry, params: &KeyDataParams) -> KeyResult<()> {
    let key = key_argument(keys, params.key, "import")?;
    let ditem = data_argument(data, params.data, "import")?;

    let key_type = KeyType::from_raw(params.key_type).ok_or_else(|| {
        KeyError::invalid_parameter_with_code(
            "key_type",
            "a known key type",
            &params.key_type.to_string(),
            error_codes::INVALID_KEY_TYPE,
        )
    })?;
    // Stored as given; only generate consults the algorithm table
    let algorithm = Algorithm::from_raw(params.algorithm);

    let mut state = key.lock();
    let dstate = ditem.lock();

    state.key_type = key_type;
    state.algorithm = algorithm;
    state.flags = KeyFlags::from_bits(params.flags);
    if dstate.flags().is_exportable() {
        state.flags.insert(KeyFlags::EXPORTABLE);
    }

    require_secret(key_type, "import")?;

    let key_id_size = params.key_id_size as usize;
    if key_id_size > MAX_KEY_ID_SIZE {
        log::debug!("import: key id of {} bytes", key_id_size);
        return Err(KeyError::invalid_parameter_with_code(
            "key_id_size",
            &format!("at most {}", MAX_KEY_ID_SIZE),
            &key_id_size.to_string(),
            error_codes::INVALID_KEY_ID_SIZE,
        ));
    }
    state.key_id.replace_with(&params.key_id[..key_id_size]);

    if dstate.size() > MAX_KEY_SIZE {
        log::debug!("import: data of {} bytes", dstate.size());
        return Err(KeyError::invalid_parameter_with_code(
            "data",
            &format!("at most {} bytes", MAX_KEY_SIZE),
            &format!("{} bytes", dstate.size()),
            error_codes::INVALID_KEY_SIZE,
        ));
    }
    state.secret.replace_with(dstate.contents());
    Ok(())
}

/// Report a key's flags, type and algorithm
pub fn info(keys: &KeyRegistry, descriptor: Descriptor) -> KeyResult<KeyInfo> {
    let key = keys.lookup(descriptor)?;
    let info = key.info();
    Ok(info)
}

/// Public/private key-pair generation. Not available.
pub fn generate_pair(_keys: &KeyRegistry, _params: &KeyPairParams) -> KeyResult<()> {
    Err(KeyError::unsupported("generate_pair"))
}

/// Key derivation. Not available.
pub fn derive(_keys: &KeyRegistry, _params: &KeyDeriveParams) -> KeyResult<()> {
    Err(KeyError::unsupported("derive"))
}

/// Public-half extraction. Not available.
pub fn get_public(
    _keys: &KeyRegistry,
    _data: &DataRegistry,
    _params: &KeyDataParams,
) -> KeyResult<()> {
    Err(KeyError::unsupported("get_public"))
}
