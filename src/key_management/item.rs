use std::fmt;
use std::ops::BitOr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::limits::{LimitType, OwnerId, ResourceLimits};
use crate::secure_memory::SecureBytes;

/// Largest secret key, in bytes
pub const MAX_KEY_SIZE: usize = 32;

/// Largest key id, in bytes
pub const MAX_KEY_ID_SIZE: usize = 20;

/// Length of the random key id assigned by generate
pub const GENERATED_KEY_ID_SIZE: usize = 5;

/// Algorithm tag recorded on every generated key, whatever was requested
pub const GENERATED_KEY_ALGORITHM: Algorithm = Algorithm::AesCbc;

/// Kind of key material an item holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum KeyType {
    /// Freshly created item with no material
    #[default]
    Unset = 0,
    Secret = 1,
    Public = 2,
    Private = 3,
}

impl KeyType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(KeyType::Unset),
            1 => Some(KeyType::Secret),
            2 => Some(KeyType::Public),
            3 => Some(KeyType::Private),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

/// Algorithm identifier tag.
///
/// Tags outside the known table are carried as [`Algorithm::Other`] and
/// reported back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    #[default]
    Unset,
    Null,
    TripleDesCbc,
    AesCbc,
    CamelliaCbc,
    Arcfour,
    AesEcb,
    Sha1,
    Md5,
    Sha2_224,
    Sha2_256,
    Sha2_384,
    Sha2_512,
    HmacSha1,
    HmacMd5,
    HmacSha2_224,
    HmacSha2_256,
    HmacSha2_384,
    HmacSha2_512,
    Rsa,
    Dsa,
    Other(u32),
}

impl Algorithm {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Algorithm::Unset,
            1 => Algorithm::Null,
            2 => Algorithm::TripleDesCbc,
            3 => Algorithm::AesCbc,
            4 => Algorithm::CamelliaCbc,
            5 => Algorithm::Arcfour,
            6 => Algorithm::AesEcb,
            40 => Algorithm::Sha1,
            41 => Algorithm::Md5,
            42 => Algorithm::Sha2_224,
            43 => Algorithm::Sha2_256,
            44 => Algorithm::Sha2_384,
            45 => Algorithm::Sha2_512,
            80 => Algorithm::HmacSha1,
            81 => Algorithm::HmacMd5,
            82 => Algorithm::HmacSha2_224,
            83 => Algorithm::HmacSha2_256,
            84 => Algorithm::HmacSha2_384,
            85 => Algorithm::HmacSha2_512,
            140 => Algorithm::Rsa,
            141 => Algorithm::Dsa,
            other => Algorithm::Other(other),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            Algorithm::Unset => 0,
            Algorithm::Null => 1,
            Algorithm::TripleDesCbc => 2,
            Algorithm::AesCbc => 3,
            Algorithm::CamelliaCbc => 4,
            Algorithm::Arcfour => 5,
            Algorithm::AesEcb => 6,
            Algorithm::Sha1 => 40,
            Algorithm::Md5 => 41,
            Algorithm::Sha2_224 => 42,
            Algorithm::Sha2_256 => 43,
            Algorithm::Sha2_384 => 44,
            Algorithm::Sha2_512 => 45,
            Algorithm::HmacSha1 => 80,
            Algorithm::HmacMd5 => 81,
            Algorithm::HmacSha2_224 => 82,
            Algorithm::HmacSha2_256 => 83,
            Algorithm::HmacSha2_384 => 84,
            Algorithm::HmacSha2_512 => 85,
            Algorithm::Rsa => 140,
            Algorithm::Dsa => 141,
            Algorithm::Other(raw) => raw,
        }
    }

    /// Whether the tag is one of the named algorithms
    pub fn is_known(self) -> bool {
        !matches!(self, Algorithm::Other(_))
    }

    /// The kind of key this algorithm operates on.
    ///
    /// Ciphers and MACs take secret keys, signature schemes take a private
    /// key, and plain digests take no key at all.
    pub fn key_type(self) -> Option<KeyType> {
        match self {
            Algorithm::TripleDesCbc
            | Algorithm::AesCbc
            | Algorithm::CamelliaCbc
            | Algorithm::Arcfour
            | Algorithm::AesEcb
            | Algorithm::HmacSha1
            | Algorithm::HmacMd5
            | Algorithm::HmacSha2_224
            | Algorithm::HmacSha2_256
            | Algorithm::HmacSha2_384
            | Algorithm::HmacSha2_512 => Some(KeyType::Secret),
            Algorithm::Rsa | Algorithm::Dsa => Some(KeyType::Private),
            Algorithm::Unset
            | Algorithm::Null
            | Algorithm::Sha1
            | Algorithm::Md5
            | Algorithm::Sha2_224
            | Algorithm::Sha2_256
            | Algorithm::Sha2_384
            | Algorithm::Sha2_512
            | Algorithm::Other(_) => None,
        }
    }
}

/// Flag bits of a key item.
///
/// Only [`KeyFlags::EXPORTABLE`] changes behaviour; every other bit is
/// stored and reported back verbatim.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct KeyFlags(u32);

impl KeyFlags {
    /// Key material may be exported to the far side of the boundary
    pub const EXPORTABLE: KeyFlags = KeyFlags(1);
    /// Key may be wrapped by another key
    pub const WRAPPABLE: KeyFlags = KeyFlags(1 << 1);

    pub const fn empty() -> Self {
        KeyFlags(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        KeyFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: KeyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: KeyFlags) {
        self.0 |= other.0;
    }

    pub fn is_exportable(self) -> bool {
        self.contains(Self::EXPORTABLE)
    }
}

impl BitOr for KeyFlags {
    type Output = KeyFlags;

    fn bitor(self, rhs: KeyFlags) -> KeyFlags {
        KeyFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for KeyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyFlags({:#x})", self.0)
    }
}

/// Public metadata of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInfo {
    pub flags: KeyFlags,
    pub key_type: KeyType,
    pub algorithm: Algorithm,
}

/// Fields of a key item. Starts out zeroed.
#[derive(Default)]
pub struct KeyState {
    pub(crate) key_type: KeyType,
    pub(crate) algorithm: Algorithm,
    pub(crate) flags: KeyFlags,
    pub(crate) secret: SecureBytes,
    pub(crate) key_id: SecureBytes,
}

impl KeyState {
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn flags(&self) -> KeyFlags {
        self.flags
    }

    /// Length of the secret material in bytes
    pub fn size(&self) -> usize {
        self.secret.len()
    }

    pub fn secret(&self) -> &SecureBytes {
        &self.secret
    }

    pub fn key_id(&self) -> &[u8] {
        self.key_id.as_bytes()
    }

    pub fn info(&self) -> KeyInfo {
        KeyInfo {
            flags: self.flags,
            key_type: self.key_type,
            algorithm: self.algorithm,
        }
    }
}

/// A key object.
///
/// The registry lock never covers these fields. They sit behind the item's
/// own lock so that two holders of the same key serialize their reads and
/// writes; no ordering between those holders is implied.
pub struct KeyItem {
    owner: OwnerId,
    limits: Arc<dyn ResourceLimits>,
    state: Mutex<KeyState>,
}

impl KeyItem {
    pub(crate) fn new(owner: OwnerId, limits: Arc<dyn ResourceLimits>) -> Self {
        Self {
            owner,
            limits,
            state: Mutex::new(KeyState::default()),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Lock the key's fields.
    ///
    /// The lock is not reentrant. While the guard is alive, read through it
    /// rather than through [`info`](Self::info), [`secret_material`](Self::secret_material)
    /// or [`key_id`](Self::key_id), which take the lock themselves.
    pub fn lock(&self) -> MutexGuard<'_, KeyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the key's metadata. Takes the item lock.
    pub fn info(&self) -> KeyInfo {
        self.lock().info()
    }

    /// Copy of the secret material. Takes the item lock.
    pub fn secret_material(&self) -> SecureBytes {
        self.lock().secret.clone()
    }

    /// Copy of the key id. Takes the item lock.
    pub fn key_id(&self) -> Vec<u8> {
        self.lock().key_id().to_vec()
    }
}

// Final release: the material is zeroized by its own drop right after this.
impl Drop for KeyItem {
    fn drop(&mut self) {
        self.limits.remove(self.owner, LimitType::Key);
    }
}

impl fmt::Debug for KeyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("KeyItem");
        out.field("owner", &self.owner);
        // A holder of the lock may be formatting the item
        match self.state.try_lock() {
            Ok(state) => fmt_state(&mut out, &state),
            Err(TryLockError::Poisoned(poisoned)) => fmt_state(&mut out, &poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                out.field("state", &format_args!("<locked>"));
            }
        }
        out.finish()
    }
}

fn fmt_state(out: &mut fmt::DebugStruct<'_, '_>, state: &KeyState) {
    out.field("type", &state.key_type)
        .field("algorithm", &state.algorithm)
        .field("flags", &state.flags)
        .field("size", &state.size())
        .field("key_id", &hex::encode(state.key_id()));
}
