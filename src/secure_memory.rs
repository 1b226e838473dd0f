//! Secure Memory Handling Utilities
//!
//! Key material, key ids and data-item buffers are held in [`SecureBytes`],
//! a byte container that is zeroed when dropped or cleared so secret bytes
//! do not linger in freed memory after the last reference to a key object
//! is released.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{KeyError, KeyResult};

/// A container for sensitive bytes that is zeroed when dropped.
///
/// # Security Properties
///
/// 1. Automatically zeroes memory when dropped
/// 2. Prevents contents from being inadvertently logged or displayed
/// 3. Overwrites are preceded by zeroing the previous contents
///
/// # Example
///
/// ```
/// use keycore::secure_memory::SecureBytes;
///
/// let key = SecureBytes::new(&[0x01, 0x02, 0x03, 0x04]);
/// assert_eq!(key.len(), 4);
/// // When key goes out of scope, memory is securely zeroed
/// ```
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes {
    bytes: Vec<u8>,
}

impl SecureBytes {
    /// Create a new SecureBytes holding a copy of `data`
    pub fn new(data: &[u8]) -> Self {
        Self {
            bytes: data.to_vec(),
        }
    }

    /// Allocate `len` zero bytes, reporting allocation failure instead of
    /// aborting.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::MemoryError` if the buffer cannot be allocated
    pub fn try_zeroed(len: usize) -> KeyResult<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|e| KeyError::memory_error("secure_alloc", &e.to_string()))?;
        bytes.resize(len, 0);
        Ok(Self { bytes })
    }

    /// Get a reference to the underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get a mutable reference to the underlying bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Replace the contents with a copy of `data`, zeroing the old bytes
    /// first.
    pub fn replace_with(&mut self, data: &[u8]) {
        self.bytes.zeroize();
        self.bytes.extend_from_slice(data);
    }

    /// Clear the buffer, securely zeroing all data
    pub fn clear(&mut self) {
        self.bytes.zeroize();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureBytes")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl From<&[u8]> for SecureBytes {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl AsRef<[u8]> for SecureBytes {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq for SecureBytes {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for SecureBytes {}
