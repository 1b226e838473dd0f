/*!
 * Per-owner resource-limit accounting
 *
 * Every key object and data item counts against its owner's quota from the
 * moment it is created until its final reference is released.
 */

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::config::LimitsConfig;
use crate::error::{error_codes, KeyError, KeyResult};

/// Opaque identity of the session that owns an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// Kind of object being accounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitType {
    Key,
    Data,
}

impl LimitType {
    fn name(self) -> &'static str {
        match self {
            LimitType::Key => "key",
            LimitType::Data => "data",
        }
    }

    fn error_code(self) -> u32 {
        match self {
            LimitType::Key => error_codes::KEY_LIMIT_EXCEEDED,
            LimitType::Data => error_codes::DATA_LIMIT_EXCEEDED,
        }
    }
}

/// Quota collaborator consulted at object creation and final release.
pub trait ResourceLimits: Send + Sync {
    /// Reserve one object of `kind` for `owner`, failing with
    /// `ResourceExhaustion` when the quota is already used up. A failed
    /// call reserves nothing.
    fn add_and_check(&self, owner: OwnerId, kind: LimitType) -> KeyResult<()>;

    /// Return one reservation of `kind` for `owner`.
    fn remove(&self, owner: OwnerId, kind: LimitType);
}

/// Counting quota tracker driven by [`LimitsConfig`].
pub struct LimitTracker {
    config: LimitsConfig,
    counts: Mutex<HashMap<(OwnerId, LimitType), usize>>,
}

impl LimitTracker {
    pub fn new(config: LimitsConfig) -> Self {
        Self {
            config,
            counts: Mutex::new(HashMap::new()),
        }
    }

    fn max_for(&self, kind: LimitType) -> usize {
        match kind {
            LimitType::Key => self.config.max_keys_per_owner,
            LimitType::Data => self.config.max_data_per_owner,
        }
    }

    /// Number of live objects of `kind` currently charged to `owner`
    pub fn outstanding(&self, owner: OwnerId, kind: LimitType) -> usize {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.get(&(owner, kind)).copied().unwrap_or(0)
    }
}

impl Default for LimitTracker {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}

impl fmt::Debug for LimitTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitTracker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResourceLimits for LimitTracker {
    fn add_and_check(&self, owner: OwnerId, kind: LimitType) -> KeyResult<()> {
        let max = self.max_for(kind);
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let count = counts.entry((owner, kind)).or_insert(0);
        if *count >= max {
            log::debug!("{} exceeded its {} quota of {}", owner, kind.name(), max);
            return Err(KeyError::resource_exhaustion(
                kind.name(),
                max,
                kind.error_code(),
            ));
        }
        *count += 1;
        Ok(())
    }

    fn remove(&self, owner: OwnerId, kind: LimitType) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        match counts.get_mut(&(owner, kind)) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                counts.remove(&(owner, kind));
            }
            None => log::warn!(
                "Released a {} reservation that {} never held",
                kind.name(),
                owner
            ),
        }
    }
}

/// Quota collaborator that never refuses
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl ResourceLimits for Unlimited {
    fn add_and_check(&self, _owner: OwnerId, _kind: LimitType) -> KeyResult<()> {
        Ok(())
    }

    fn remove(&self, _owner: OwnerId, _kind: LimitType) {}
}
