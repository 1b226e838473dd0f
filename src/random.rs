//! Random byte sources for key and key-id generation.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use rand::{rngs::OsRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::{KeyError, KeyResult};

/// Supplier of cryptographically secure bytes
pub trait RandomSource: Send + Sync {
    /// Fill `buf` entirely with random bytes
    fn fill_random(&self, buf: &mut [u8]) -> KeyResult<()>;
}

/// The operating system's CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_random(&self, buf: &mut [u8]) -> KeyResult<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| KeyError::random_error(&e.to_string()))
    }
}

/// A ChaCha20 stream seeded from a fixed value.
///
/// Produces the same byte sequence for the same seed, which makes
/// generated keys reproducible in tests and benchmarks.
pub struct SeededRandom {
    rng: Mutex<ChaCha20Rng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

impl fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededRandom").finish_non_exhaustive()
    }
}

impl RandomSource for SeededRandom {
    fn fill_random(&self, buf: &mut [u8]) -> KeyResult<()> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.fill_bytes(buf);
        Ok(())
    }
}
