use std::fmt;
use std::sync::Arc;

use crate::config::DescriptorPolicy;
use crate::error::{error_codes, KeyError, KeyResult};
use crate::limits::{LimitType, OwnerId, ResourceLimits};
use crate::registry::{Descriptor, Handle, Registry};

use super::item::KeyItem;

/// Strong reference to a key item; dropping it releases the reference
pub type KeyHandle = Handle<KeyItem>;

/// The key objects of one owning session.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use keycore::config::DescriptorPolicy;
/// use keycore::key_management::KeyRegistry;
/// use keycore::limits::{OwnerId, Unlimited};
///
/// let keys = KeyRegistry::new(Arc::new(Unlimited), DescriptorPolicy::MaxPlusOne);
/// let d = keys.create(OwnerId(1)).unwrap();
/// assert_eq!(d, 1);
///
/// keys.destroy(d);
/// assert!(keys.lookup(d).is_err());
/// ```
pub struct KeyRegistry {
    registry: Registry<KeyItem>,
    limits: Arc<dyn ResourceLimits>,
}

impl KeyRegistry {
    pub fn new(limits: Arc<dyn ResourceLimits>, policy: DescriptorPolicy) -> Self {
        Self {
            registry: Registry::new(policy),
            limits,
        }
    }

    /// Create a zeroed key item owned by `owner` and return its descriptor.
    ///
    /// # Errors
    ///
    /// `ResourceExhaustion` when the owner's key quota is used up,
    /// `MemoryError` when the registry cannot grow. A failed create holds no
    /// quota.
    pub fn create(&self, owner: OwnerId) -> KeyResult<Descriptor> {
        self.limits.add_and_check(owner, LimitType::Key)?;

        // The item returns the quota reservation when it is dropped, which
        // includes a failed insert.
        let item = KeyItem::new(owner, Arc::clone(&self.limits));
        let descriptor = self.registry.insert(item)?;

        log::debug!("Created key {} for {}", descriptor, owner);
        Ok(descriptor)
    }

    /// Take a strong reference to a key.
    pub fn lookup(&self, descriptor: Descriptor) -> KeyResult<KeyHandle> {
        self.registry
            .lookup(descriptor)
            .ok_or_else(|| KeyError::not_found("key", descriptor, error_codes::KEY_NOT_FOUND))
    }

    /// Unlink a key and drop its creation reference.
    ///
    /// Later lookups report not-found at once; the item itself lives on
    /// until every outstanding handle is released. Destroying an unknown
    /// descriptor does nothing.
    pub fn destroy(&self, descriptor: Descriptor) {
        match self.registry.remove(descriptor) {
            Some(creation) => {
                log::debug!(
                    "Destroyed key {} ({} references outstanding)",
                    descriptor,
                    creation.refcount() - 1
                );
            }
            None => log::debug!("destroy of unknown key {}", descriptor),
        }
    }

    /// Unlink and release every key
    pub fn destroy_all(&self) {
        let released = self.registry.drain();
        if !released.is_empty() {
            log::debug!("Released {} keys", released.len());
        }
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn descriptors(&self) -> Vec<Descriptor> {
        self.registry.descriptors()
    }
}

impl Drop for KeyRegistry {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

impl fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("registry", &self.registry)
            .finish()
    }
}
