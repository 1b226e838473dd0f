/*!
 * Descriptor registry with reference-counted handles
 *
 * A registry is an unordered set of objects addressed by small integer
 * descriptors. One blocking mutex guards membership and the descriptor
 * allocator; it is never held while an object's own fields are read or
 * written.
 *
 * Every object is shared through an `Arc`. The registry's entry is the
 * creation reference and every successful [`Registry::lookup`] hands out one
 * more reference wrapped in a [`Handle`]. Dropping a handle is a release.
 * The object is freed (its `Drop` runs) exactly when the last reference is
 * released, which can only happen after the entry has been unlinked.
 */

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::DescriptorPolicy;
use crate::error::{error_codes, KeyError, KeyResult};

/// Integer handle naming an object within its registry
pub type Descriptor = u32;

/// A strong reference to a registered object.
///
/// Holding a handle keeps the object alive even after it has been unlinked
/// from its registry. Dropping the handle releases the reference.
pub struct Handle<T> {
    descriptor: Descriptor,
    item: Arc<T>,
}

impl<T> Handle<T> {
    /// Descriptor the object was registered under
    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    /// Current number of references (registry entry plus live handles)
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.item)
    }
}

impl<T> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("descriptor", &self.descriptor)
            .field("refcount", &self.refcount())
            .finish()
    }
}

struct Entry<T> {
    descriptor: Descriptor,
    item: Arc<T>,
}

struct Inner<T> {
    entries: Vec<Entry<T>>,
    next: Descriptor,
}

impl<T> Inner<T> {
    fn allocate(&mut self, policy: DescriptorPolicy) -> KeyResult<Descriptor> {
        let descriptor = match policy {
            DescriptorPolicy::MaxPlusOne => self
                .entries
                .iter()
                .map(|e| e.descriptor)
                .max()
                .unwrap_or(0)
                .checked_add(1),
            // `next` sticks at 0 once the counter has wrapped
            DescriptorPolicy::Monotonic => {
                let descriptor = self.next;
                if descriptor != 0 {
                    self.next = descriptor.checked_add(1).unwrap_or(0);
                }
                (descriptor != 0).then_some(descriptor)
            }
        };

        descriptor.ok_or_else(|| {
            KeyError::resource_exhaustion(
                "descriptor",
                Descriptor::MAX as usize,
                error_codes::DESCRIPTORS_EXHAUSTED,
            )
        })
    }
}

/// Descriptor-indexed object store
pub struct Registry<T> {
    inner: Mutex<Inner<T>>,
    policy: DescriptorPolicy,
}

impl<T> Registry<T> {
    pub fn new(policy: DescriptorPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                next: 1,
            }),
            policy,
        }
    }

    // Nothing in this module panics while the lock is held with the list in
    // an inconsistent state, so a poisoned lock still guards a valid list.
    fn locked(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Link `item` under a freshly allocated descriptor.
    ///
    /// The item is allocated by the caller before the lock is taken; only
    /// descriptor allocation and linking happen under the lock.
    ///
    /// # Errors
    ///
    /// `MemoryError` if the list cannot grow, `ResourceExhaustion` if the
    /// descriptor space is used up. The item is dropped in both cases.
    pub fn insert(&self, item: T) -> KeyResult<Descriptor> {
        let item = Arc::new(item);
        let mut inner = self.locked();
        inner.entries.try_reserve(1)?;
        let descriptor = inner.allocate(self.policy)?;
        inner.entries.push(Entry { descriptor, item });
        Ok(descriptor)
    }

    /// Take a new reference to the object registered under `descriptor`.
    pub fn lookup(&self, descriptor: Descriptor) -> Option<Handle<T>> {
        let inner = self.locked();
        inner
            .entries
            .iter()
            .find(|e| e.descriptor == descriptor)
            .map(|e| Handle {
                descriptor,
                item: Arc::clone(&e.item),
            })
    }

    /// Unlink `descriptor`, returning the creation reference.
    ///
    /// The returned handle is released by the caller after the lock has been
    /// dropped.
    pub fn remove(&self, descriptor: Descriptor) -> Option<Handle<T>> {
        let mut inner = self.locked();
        let pos = inner
            .entries
            .iter()
            .position(|e| e.descriptor == descriptor)?;
        let entry = inner.entries.swap_remove(pos);
        Some(Handle {
            descriptor: entry.descriptor,
            item: entry.item,
        })
    }

    /// Unlink every object, returning their creation references.
    pub fn drain(&self) -> Vec<Handle<T>> {
        let entries = std::mem::take(&mut self.locked().entries);
        entries
            .into_iter()
            .map(|e| Handle {
                descriptor: e.descriptor,
                item: e.item,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.locked().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Descriptors of all linked objects, in no particular order
    pub fn descriptors(&self) -> Vec<Descriptor> {
        self.locked().entries.iter().map(|e| e.descriptor).collect()
    }

    pub fn policy(&self) -> DescriptorPolicy {
        self.policy
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("policy", &self.policy)
            .field("len", &self.len())
            .finish()
    }
}
