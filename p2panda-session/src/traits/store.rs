// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use crate::address::{ProtocolAddress, RecipientId};
use crate::identity::{IdentityKey, IdentityKeyPair};
use crate::key_bundle::{PreKeyId, PreKeyRecord, SignedPreKeyId, SignedPreKeyRecord};
use crate::state::SessionRecord;

/// Our own identity and the identities of other parties we've seen.
pub trait IdentityKeyStore {
    type Error: Error + Send + Sync + 'static;

    fn identity_key_pair(&self) -> Result<IdentityKeyPair, Self::Error>;

    fn local_registration_id(&self) -> Result<u32, Self::Error>;

    /// Returns true if we have not seen an identity for this peer yet or if it matches the stored
    /// one.
    ///
    /// Implementations may decide to accept changed identities.
    fn is_trusted_identity(
        &self,
        recipient_id: RecipientId,
        identity_key: &IdentityKey,
    ) -> Result<bool, Self::Error>;

    fn save_identity(
        &self,
        recipient_id: RecipientId,
        identity_key: &IdentityKey,
    ) -> Result<(), Self::Error>;
}

/// Session records per device of other parties.
pub trait SessionStore {
    type Error: Error + Send + Sync + 'static;

    /// Returns a fresh record if no session exists for this address.
    fn load_session(&self, address: &ProtocolAddress) -> Result<SessionRecord, Self::Error>;

    fn store_session(
        &self,
        address: &ProtocolAddress,
        record: &SessionRecord,
    ) -> Result<(), Self::Error>;

    fn contains_session(&self, address: &ProtocolAddress) -> Result<bool, Self::Error>;
}

/// Our one-time pre-keys.
pub trait PreKeyStore {
    type Error: Error + Send + Sync + 'static;

    fn load_prekey(&self, id: PreKeyId) -> Result<Option<PreKeyRecord>, Self::Error>;

    fn store_prekey(&self, record: PreKeyRecord) -> Result<(), Self::Error>;

    fn contains_prekey(&self, id: PreKeyId) -> Result<bool, Self::Error>;

    fn remove_prekey(&self, id: PreKeyId) -> Result<(), Self::Error>;
}

/// Our signed pre-keys.
pub trait SignedPreKeyStore {
    type Error: Error + Send + Sync + 'static;

    fn load_signed_prekey(
        &self,
        id: SignedPreKeyId,
    ) -> Result<Option<SignedPreKeyRecord>, Self::Error>;

    fn store_signed_prekey(&self, record: SignedPreKeyRecord) -> Result<(), Self::Error>;

    fn contains_signed_prekey(&self, id: SignedPreKeyId) -> Result<bool, Self::Error>;
}

/// All stores a session builder and cipher depend on.
pub trait ProtocolStore: IdentityKeyStore + SessionStore + PreKeyStore + SignedPreKeyStore {}

impl<T> ProtocolStore for T where T: IdentityKeyStore + SessionStore + PreKeyStore + SignedPreKeyStore
{}
