/*!
 * Owning session
 *
 * A session is the context key objects and data items are scoped to. It
 * owns one key registry and one data registry and releases everything left
 * in them when it is closed or dropped.
 */

use std::fmt;
use std::sync::Arc;

use crate::config::KeyStoreConfig;
use crate::data::{DataFlags, DataHandle, DataRegistry};
use crate::error::KeyResult;
use crate::key_management::{self, KeyDataParams, KeyGenerateParams, KeyHandle, KeyInfo, KeyRegistry};
use crate::limits::{LimitTracker, OwnerId, ResourceLimits};
use crate::random::{OsRandom, RandomSource};
use crate::registry::Descriptor;

pub struct Session {
    owner: OwnerId,
    keys: KeyRegistry,
    data: DataRegistry,
    random: Arc<dyn RandomSource>,
}

impl Session {
    /// Open a session with its own quota tracker and the OS random source
    pub fn new(owner: OwnerId, config: &KeyStoreConfig) -> Self {
        let limits = Arc::new(LimitTracker::new(config.limits.clone()));
        Self::with_collaborators(owner, config, limits, Arc::new(OsRandom))
    }

    /// Open a session around existing collaborators.
    ///
    /// Sharing one `ResourceLimits` between sessions makes the quota apply
    /// across all of them.
    pub fn with_collaborators(
        owner: OwnerId,
        config: &KeyStoreConfig,
        limits: Arc<dyn ResourceLimits>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        log::info!("Opening key session for {}", owner);
        Self {
            owner,
            keys: KeyRegistry::new(Arc::clone(&limits), config.descriptor_policy),
            data: DataRegistry::new(limits, config.descriptor_policy),
            random,
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    pub fn data(&self) -> &DataRegistry {
        &self.data
    }

    pub fn random(&self) -> &dyn RandomSource {
        self.random.as_ref()
    }

    pub fn create_key(&self) -> KeyResult<Descriptor> {
        self.keys.create(self.owner)
    }

    pub fn lookup_key(&self, descriptor: Descriptor) -> KeyResult<KeyHandle> {
        self.keys.lookup(descriptor)
    }

    pub fn destroy_key(&self, descriptor: Descriptor) {
        self.keys.destroy(descriptor)
    }

    pub fn create_data(&self, capacity: usize, flags: DataFlags) -> KeyResult<Descriptor> {
        self.data.create(self.owner, capacity, flags)
    }

    pub fn lookup_data(&self, descriptor: Descriptor) -> KeyResult<DataHandle> {
        self.data.lookup(descriptor)
    }

    pub fn destroy_data(&self, descriptor: Descriptor) {
        self.data.destroy(descriptor)
    }

    pub fn generate(&self, params: &KeyGenerateParams) -> KeyResult<()> {
        key_management::generate(&self.keys, self.random.as_ref(), params)
    }

    pub fn export(&self, params: &KeyDataParams) -> KeyResult<()> {
        key_management::export(&self.keys, &self.data, params)
    }

    pub fn import(&self, params: &KeyDataParams) -> KeyResult<()> {
        key_management::import(&self.keys, &self.data, params)
    }

    pub fn info(&self, descriptor: Descriptor) -> KeyResult<KeyInfo> {
        key_management::info(&self.keys, descriptor)
    }

    /// Release every key and data item and end the session
    pub fn close(self) {}
}

impl Drop for Session {
    fn drop(&mut self) {
        log::info!(
            "Closing key session for {} ({} keys, {} data items)",
            self.owner,
            self.keys.len(),
            self.data.len()
        );
        self.keys.destroy_all();
        self.data.destroy_all();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("owner", &self.owner)
            .field("keys", &self.keys)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
