// SPDX-License-Identifier: MIT OR Apache-2.0

//! `p2panda-session` establishes encrypted sessions between two devices and keeps them
//! forward-secure with a key ratchet.
//!
//! Sessions follow the design of the Signal protocol: a device publishes a [`PreKeyBundle`] with a
//! signed pre-key and optional one-time pre-keys. Another device can then build a session without
//! the first one being online and start sending messages right away. Both parties derive the same
//! root key from a set of Diffie-Hellman exchanges and afterwards advance it with every new
//! ratchet key, while a symmetric chain derives a fresh key for every single message.
//!
//! Next to the asynchronous pre-key flow, sessions can be established with an interactive key
//! exchange while both parties are online. Two devices which initiate at the same time still
//! arrive at the same session.
//!
//! ## Usage
//!
//! All state is persisted behind the store traits in [`traits`], [`MemoryStore`] implements them
//! in memory. [`SessionBuilder`] establishes sessions, [`SessionCipher`] encrypts and decrypts
//! messages with them. Both are bound to the [`ProtocolAddress`] of one device of the other party
//! and serialize their access to the stored session with a shared set of [`SessionLocks`].
//!
//! ```
//! use p2panda_session::key_helper::{
//!     generate_identity_key_pair, generate_prekeys, generate_registration_id,
//!     generate_signed_prekey,
//! };
//! use p2panda_session::traits::{IdentityKeyStore, PreKeyStore, SignedPreKeyStore};
//! use p2panda_session::{
//!     MemoryStore, OneTimePreKey, PreKeyBundle, ProtocolAddress, Rng, SessionBuilder,
//!     SessionCipher, SessionLocks, SignedPreKey,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rng = Rng::default();
//!
//! // Bob publishes a bundle of pre-keys.
//! let bob_identity = generate_identity_key_pair(&rng)?;
//! let bob_store = MemoryStore::new(bob_identity.clone(), generate_registration_id(&rng)?);
//! let signed_prekey = generate_signed_prekey(&bob_identity, 1, 0, &rng)?;
//! let prekey = generate_prekeys(0, 1, &rng)?.remove(0);
//!
//! let bundle = PreKeyBundle::new(
//!     bob_store.local_registration_id()?,
//!     1,
//!     *bob_identity.identity_key(),
//!     Some(OneTimePreKey {
//!         id: prekey.id(),
//!         public_key: *prekey.public_key(),
//!     }),
//!     Some(SignedPreKey {
//!         id: signed_prekey.id(),
//!         public_key: *signed_prekey.public_key(),
//!         signature: *signed_prekey.signature(),
//!     }),
//! )?;
//! bob_store.store_prekey(prekey)?;
//! bob_store.store_signed_prekey(signed_prekey)?;
//!
//! // Alice builds a session from it and encrypts a message.
//! let alice_identity = generate_identity_key_pair(&rng)?;
//! let alice_store = MemoryStore::new(alice_identity, generate_registration_id(&rng)?);
//! let bob_address = ProtocolAddress::new(2, 1);
//!
//! let builder = SessionBuilder::new(alice_store.clone(), SessionLocks::new(), bob_address);
//! builder.process_prekey_bundle(&bundle, &rng)?;
//!
//! let alice_cipher = SessionCipher::from_builder(builder);
//! let message = alice_cipher.encrypt(b"Hello, Bob!")?;
//!
//! // Bob decrypts it, building his end of the session on the way.
//! let alice_address = ProtocolAddress::new(1, 1);
//! let bob_cipher = SessionCipher::new(bob_store, SessionLocks::new(), alice_address);
//! assert_eq!(bob_cipher.decrypt(&message, &rng)?, b"Hello, Bob!");
//! # Ok(())
//! # }
//! ```
//!
//! ## Security
//!
//! Trust decisions about identity keys are left to the
//! [`IdentityKeyStore`](traits::IdentityKeyStore) implementation. Pre-key bundles and signed base
//! keys are only authenticated against the identity key they carry, applications need to verify
//! identities out of band.
mod address;
mod cbor;
mod config;
pub mod crypto;
mod error;
mod identity;
mod key_bundle;
pub mod key_helper;
mod lock;
pub mod protocol;
pub mod ratchet;
mod session_builder;
mod session_cipher;
pub mod state;
pub mod stores;
#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;
pub mod traits;

pub use address::{DeviceId, ProtocolAddress, RecipientId};
pub use cbor::{DecodeError, EncodeError};
pub use config::{
    DEFAULT_ARCHIVED_STATES_MAX, DEFAULT_FUTURE_MESSAGES_MAX, DEFAULT_MESSAGE_KEYS_MAX,
    DEFAULT_RECEIVER_CHAINS_MAX, SessionConfig,
};
pub use crypto::{Rng, RngError};
pub use error::{KeyId, SessionError};
pub use identity::{IdentityKey, IdentityKeyPair};
pub use key_bundle::{
    KeyBundleError, MAX_PREKEY_ID, OneTimePreKey, PreKeyBundle, PreKeyId, PreKeyRecord,
    SignedPreKey, SignedPreKeyId, SignedPreKeyRecord, Timestamp,
};
pub use lock::SessionLocks;
pub use protocol::{
    CiphertextMessage, KeyExchangeFlags, KeyExchangeMessage, PreKeyMessage, ProtocolVersion,
    RatchetMessage, VersionError,
};
pub use session_builder::SessionBuilder;
pub use session_cipher::SessionCipher;
pub use state::{SessionRecord, SessionState};
pub use stores::{MemoryStore, TrustPolicy};
