/*!
 * Data items
 *
 * Capacity-bounded plaintext buffers used to relay key bytes across the
 * trust boundary. A data item carries a single policy bit, Exportable, which
 * says whether its contents may be handed to the far side of the boundary.
 */

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::config::DescriptorPolicy;
use crate::error::{error_codes, KeyError, KeyResult};
use crate::limits::{LimitType, OwnerId, ResourceLimits};
use crate::registry::{Descriptor, Handle, Registry};
use crate::secure_memory::SecureBytes;

/// Flag bits of a data item
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct DataFlags(u32);

impl DataFlags {
    /// Contents may leave the trust boundary
    pub const EXPORTABLE: DataFlags = DataFlags(1);

    pub const fn empty() -> Self {
        DataFlags(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        DataFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: DataFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_exportable(self) -> bool {
        self.contains(Self::EXPORTABLE)
    }
}

impl fmt::Debug for DataFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataFlags({:#x})", self.0)
    }
}

/// Mutable contents of a data item
pub struct DataState {
    buffer: SecureBytes,
    size: usize,
    flags: DataFlags,
}

impl DataState {
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn flags(&self) -> DataFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: DataFlags) {
        self.flags = flags;
    }

    /// The first `size` bytes of the buffer
    pub fn contents(&self) -> &[u8] {
        &self.buffer.as_bytes()[..self.size]
    }

    /// Overwrite the contents with `bytes`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `bytes` is longer than the capacity; the item
    /// is left unmodified.
    pub fn write(&mut self, bytes: &[u8]) -> KeyResult<()> {
        if bytes.len() > self.capacity() {
            return Err(KeyError::invalid_parameter_with_code(
                "data",
                &format!("at most {} bytes", self.capacity()),
                &format!("{} bytes", bytes.len()),
                error_codes::INSUFFICIENT_CAPACITY,
            ));
        }
        self.buffer.as_bytes_mut()[..bytes.len()].copy_from_slice(bytes);
        self.buffer.as_bytes_mut()[bytes.len()..self.size.max(bytes.len())].fill(0);
        self.size = bytes.len();
        Ok(())
    }
}

/// A registered data item
pub struct DataItem {
    owner: OwnerId,
    limits: Arc<dyn ResourceLimits>,
    state: Mutex<DataState>,
}

impl DataItem {
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Lock the item's contents.
    ///
    /// The lock is not reentrant: the accessors below take it themselves, so
    /// read through the guard while holding it.
    pub fn lock(&self) -> MutexGuard<'_, DataState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn size(&self) -> usize {
        self.lock().size()
    }

    pub fn flags(&self) -> DataFlags {
        self.lock().flags()
    }

    /// Copy of the current contents
    pub fn contents(&self) -> SecureBytes {
        SecureBytes::new(self.lock().contents())
    }
}

impl Drop for DataItem {
    fn drop(&mut self) {
        self.limits.remove(self.owner, LimitType::Data);
    }
}

impl fmt::Debug for DataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("DataItem");
        out.field("owner", &self.owner);
        let state = match self.state.try_lock() {
            Ok(state) => Some(state),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        };
        match state {
            Some(state) => out
                .field("capacity", &state.capacity())
                .field("size", &state.size)
                .field("flags", &state.flags),
            None => out.field("state", &format_args!("<locked>")),
        };
        out.finish()
    }
}

pub type DataHandle = Handle<DataItem>;

/// Per-session store of data items
pub struct DataRegistry {
    registry: Registry<DataItem>,
    limits: Arc<dyn ResourceLimits>,
}

impl DataRegistry {
    pub fn new(limits: Arc<dyn ResourceLimits>, policy: DescriptorPolicy) -> Self {
        Self {
            registry: Registry::new(policy),
            limits,
        }
    }

    /// Create an empty data item able to hold `capacity` bytes
    pub fn create(
        &self,
        owner: OwnerId,
        capacity: usize,
        flags: DataFlags,
    ) -> KeyResult<Descriptor> {
        self.limits.add_and_check(owner, LimitType::Data)?;

        let buffer = match SecureBytes::try_zeroed(capacity) {
            Ok(buffer) => buffer,
            Err(e) => {
                self.limits.remove(owner, LimitType::Data);
                return Err(e);
            }
        };

        // From here on the item's own drop returns the reservation
        let item = DataItem {
            owner,
            limits: Arc::clone(&self.limits),
            state: Mutex::new(DataState {
                buffer,
                size: 0,
                flags,
            }),
        };
        let descriptor = self.registry.insert(item)?;
        log::debug!(
            "Created data item {} ({} bytes) for {}",
            descriptor,
            capacity,
            owner
        );
        Ok(descriptor)
    }

    /// Create a data item holding a copy of `contents`
    pub fn create_with(
        &self,
        owner: OwnerId,
        capacity: usize,
        flags: DataFlags,
        contents: &[u8],
    ) -> KeyResult<Descriptor> {
        let descriptor = self.create(owner, capacity, flags)?;
        let written = self.lookup(descriptor).and_then(|h| h.lock().write(contents));
        if let Err(e) = written {
            self.destroy(descriptor);
            return Err(e);
        }
        Ok(descriptor)
    }

    pub fn lookup(&self, descriptor: Descriptor) -> KeyResult<DataHandle> {
        self.registry.lookup(descriptor).ok_or_else(|| {
            KeyError::not_found("data item", descriptor, error_codes::DATA_NOT_FOUND)
        })
    }

    /// Unlink a data item and drop the creation reference
    pub fn destroy(&self, descriptor: Descriptor) {
        if self.registry.remove(descriptor).is_none() {
            log::debug!("destroy of unknown data item {}", descriptor);
        }
    }

    pub fn destroy_all(&self) {
        let released = self.registry.drain();
        if !released.is_empty() {
            log::debug!("Released {} data items", released.len());
        }
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

impl Drop for DataRegistry {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

impl fmt::Debug for DataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataRegistry")
            .field("registry", &self.registry)
            .finish()
    }
}
