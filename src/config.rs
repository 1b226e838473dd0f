/*!
 * Key store configuration
 *
 * Per-owner object quotas and the descriptor allocation policy. The
 * configuration can be built in code or loaded from JSON.
 */

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};

/// Default number of live key objects an owner may hold
pub const DEFAULT_MAX_KEYS_PER_OWNER: usize = 64;

/// Default number of live data items an owner may hold
pub const DEFAULT_MAX_DATA_PER_OWNER: usize = 64;

/// How fresh descriptors are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorPolicy {
    /// One greater than the largest live descriptor, 1 for an empty
    /// registry. Descriptors are reused once the registry drains.
    #[default]
    MaxPlusOne,

    /// A per-registry counter that never hands out a descriptor twice.
    Monotonic,
}

/// Per-owner resource quotas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_keys_per_owner: usize,
    pub max_data_per_owner: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_keys_per_owner: DEFAULT_MAX_KEYS_PER_OWNER,
            max_data_per_owner: DEFAULT_MAX_DATA_PER_OWNER,
        }
    }
}

/// Top-level configuration for a key store session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct KeyStoreConfig {
    pub limits: LimitsConfig,
    pub descriptor_policy: DescriptorPolicy,
}

impl KeyStoreConfig {
    /// Parse a configuration from a JSON document. Missing fields take
    /// their defaults.
    ///
    /// # Example
    ///
    /// ```
    /// use keycore::config::{DescriptorPolicy, KeyStoreConfig};
    ///
    /// let config = KeyStoreConfig::from_json(
    ///     r#"{ "limits": { "max_keys_per_owner": 8 }, "descriptor_policy": "monotonic" }"#,
    /// ).unwrap();
    /// assert_eq!(config.limits.max_keys_per_owner, 8);
    /// assert_eq!(config.descriptor_policy, DescriptorPolicy::Monotonic);
    /// ```
    pub fn from_json(json: &str) -> KeyResult<Self> {
        let config: KeyStoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> KeyResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded key store configuration from {}", path.as_ref().display());
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> KeyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the quotas are usable
    pub fn validate(&self) -> KeyResult<()> {
        if self.limits.max_keys_per_owner == 0 {
            return Err(KeyError::ConfigError(
                "max_keys_per_owner must be at least 1".to_string(),
            ));
        }
        if self.limits.max_data_per_owner == 0 {
            return Err(KeyError::ConfigError(
                "max_data_per_owner must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
