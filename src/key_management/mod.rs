/*!
 * Key management
 *
 * The key registry of an owning session and the lifecycle operations that
 * move key bytes across the trust boundary while enforcing the
 * exportability policy.
 */

mod item;
mod keyring;
pub mod lifecycle;
pub mod params;

#[cfg(test)]
mod tests;

pub use item::Algorithm;
pub use item::KeyFlags;
pub use item::KeyInfo;
pub use item::KeyItem;
pub use item::KeyState;
pub use item::KeyType;
pub use item::GENERATED_KEY_ALGORITHM;
pub use item::GENERATED_KEY_ID_SIZE;
pub use item::MAX_KEY_ID_SIZE;
pub use item::MAX_KEY_SIZE;
pub use keyring::KeyHandle;
pub use keyring::KeyRegistry;
pub use lifecycle::derive;
pub use lifecycle::export;
pub use lifecycle::generate;
pub use lifecycle::generate_pair;
pub use lifecycle::get_public;
pub use lifecycle::import;
pub use lifecycle::info;
pub use params::KeyDataParams;
pub use params::KeyDeriveParams;
pub use params::KeyGenerateParams;
pub use params::KeyInfoParams;
pub use params::KeyPairParams;
