/*!
 * keycore
 *
 * A reference-counted store of symmetric key objects and raw data items,
 * scoped to an owning session and reached through small integer
 * descriptors. Key bytes only leave the store through a data item, and only
 * as far as the key's exportable flag allows.
 *
 * The pieces:
 *
 * - [`registry`] allocates descriptors and hands out counted handles
 * - [`key_management`] holds the key registry and the lifecycle operations
 * - [`data`] holds the opaque byte buffers keys are moved through
 * - [`boundary`] turns fixed-size request payloads into integer result codes
 * - [`session`] ties one owner to a pair of registries
 */

/// Owning sessions
pub mod session;

/// Trust-boundary entry points returning integer result codes
pub mod boundary;

/// Key registry and key lifecycle operations
pub mod key_management;

/// Raw data items
pub mod data;

/// Descriptor allocation and handle counting
pub mod registry;

/// Per-owner quotas
pub mod limits;

/// Random byte sources
pub mod random;

/// Store configuration
pub mod config;

/// Common error types
pub mod error;

/// Zeroizing byte buffers
pub mod secure_memory;

pub use config::{DescriptorPolicy, KeyStoreConfig, LimitsConfig};
pub use data::{DataFlags, DataHandle, DataRegistry};
pub use error::{KeyError, KeyResult};
pub use key_management::{
    Algorithm, KeyFlags, KeyHandle, KeyInfo, KeyRegistry, KeyType, MAX_KEY_ID_SIZE, MAX_KEY_SIZE,
};
pub use limits::{LimitTracker, OwnerId, ResourceLimits};
pub use random::{OsRandom, RandomSource};
pub use registry::Descriptor;
pub use session::Session;

/// The types most callers need to open a session and drive the lifecycle.
pub mod prelude {
    pub use crate::config::DescriptorPolicy;
    pub use crate::config::KeyStoreConfig;
    pub use crate::data::DataFlags;
    pub use crate::key_management::derive;
    pub use crate::key_management::export;
    pub use crate::key_management::generate;
    pub use crate::key_management::generate_pair;
    pub use crate::key_management::get_public;
    pub use crate::key_management::import;
    pub use crate::key_management::info;
    pub use crate::key_management::Algorithm;
    pub use crate::key_management::KeyDataParams;
    pub use crate::key_management::KeyFlags;
    pub use crate::key_management::KeyGenerateParams;
    pub use crate::key_management::KeyInfo;
    pub use crate::key_management::KeyType;
    pub use crate::limits::OwnerId;
    pub use crate::secure_memory::SecureBytes;
    pub use crate::session::Session;
    pub use crate::Descriptor;
    pub use crate::KeyError;
    pub use crate::KeyResult;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_generate_and_export() {
        let session = Session::new(OwnerId(1), &KeyStoreConfig::default());
        let key = session.create_key().unwrap();
        session
            .generate(&KeyGenerateParams::new(
                key,
                Algorithm::AesCbc,
                256,
                KeyFlags::EXPORTABLE,
            ))
            .unwrap();

        let data = session.create_data(32, DataFlags::empty()).unwrap();
        session.export(&KeyDataParams::new(key, data)).unwrap();

        let ditem = session.lookup_data(data).unwrap();
        assert_eq!(ditem.size(), 32);
        assert!(ditem.flags().is_exportable());
        assert_eq!(
            ditem.contents(),
            session.lookup_key(key).unwrap().secret_material()
        );
    }
}
