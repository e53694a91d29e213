// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for sessions, identities and pre-keys.
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::address::{ProtocolAddress, RecipientId};
use crate::identity::{IdentityKey, IdentityKeyPair};
use crate::key_bundle::{PreKeyId, PreKeyRecord, SignedPreKeyId, SignedPreKeyRecord};
use crate::state::SessionRecord;
use crate::traits::{IdentityKeyStore, PreKeyStore, SessionStore, SignedPreKeyStore};

/// Decides if a changed identity key of a known peer is accepted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Trust the first identity key seen for a peer and reject any other afterwards.
    #[default]
    TrustOnFirstUse,

    /// Accept changed identity keys, the new key replaces the stored one.
    AcceptKeyChange,
}

#[derive(Clone, Debug)]
pub struct InnerMemoryStore {
    identity_key_pair: IdentityKeyPair,
    registration_id: u32,
    trust_policy: TrustPolicy,
    identities: HashMap<RecipientId, IdentityKey>,
    sessions: HashMap<ProtocolAddress, SessionRecord>,
    prekeys: HashMap<PreKeyId, PreKeyRecord>,
    signed_prekeys: HashMap<SignedPreKeyId, SignedPreKeyRecord>,
}

impl InnerMemoryStore {
    pub fn identity(&self, recipient_id: RecipientId) -> Option<&IdentityKey> {
        self.identities.get(&recipient_id)
    }

    pub fn session(&self, address: &ProtocolAddress) -> Option<&SessionRecord> {
        self.sessions.get(address)
    }

    pub fn prekeys_len(&self) -> usize {
        self.prekeys.len()
    }
}

/// An in-memory store implementing all store traits for one local identity.
///
/// `MemoryStore` supports usage in multi-threaded contexts by wrapping an `InnerMemoryStore` with
/// an `RwLock` and `Arc`, clones share the same data.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
}

impl MemoryStore {
    pub fn new(identity_key_pair: IdentityKeyPair, registration_id: u32) -> Self {
        Self::with_trust_policy(identity_key_pair, registration_id, TrustPolicy::default())
    }

    pub fn with_trust_policy(
        identity_key_pair: IdentityKeyPair,
        registration_id: u32,
        trust_policy: TrustPolicy,
    ) -> Self {
        let inner = InnerMemoryStore {
            identity_key_pair,
            registration_id,
            trust_policy,
            identities: HashMap::new(),
            sessions: HashMap::new(),
            prekeys: HashMap::new(),
            signed_prekeys: HashMap::new(),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Obtain a read-lock on the store.
    pub fn read_store(&self) -> Result<RwLockReadGuard<'_, InnerMemoryStore>, MemoryStoreError> {
        self.inner.read().map_err(|_| MemoryStoreError::LockPoisoned)
    }

    /// Obtain a write-lock on the store.
    pub fn write_store(&self) -> Result<RwLockWriteGuard<'_, InnerMemoryStore>, MemoryStoreError> {
        self.inner.write().map_err(|_| MemoryStoreError::LockPoisoned)
    }
}

impl IdentityKeyStore for MemoryStore {
    type Error = MemoryStoreError;

    fn identity_key_pair(&self) -> Result<IdentityKeyPair, Self::Error> {
        Ok(self.read_store()?.identity_key_pair.clone())
    }

    fn local_registration_id(&self) -> Result<u32, Self::Error> {
        Ok(self.read_store()?.registration_id)
    }

    fn is_trusted_identity(
        &self,
        recipient_id: RecipientId,
        identity_key: &IdentityKey,
    ) -> Result<bool, Self::Error> {
        let store = self.read_store()?;
        let trusted = match store.identities.get(&recipient_id) {
            None => true,
            Some(stored) if stored == identity_key => true,
            Some(_) => store.trust_policy == TrustPolicy::AcceptKeyChange,
        };
        Ok(trusted)
    }

    fn save_identity(
        &self,
        recipient_id: RecipientId,
        identity_key: &IdentityKey,
    ) -> Result<(), Self::Error> {
        self.write_store()?
            .identities
            .insert(recipient_id, *identity_key);
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    type Error = MemoryStoreError;

    fn load_session(&self, address: &ProtocolAddress) -> Result<SessionRecord, Self::Error> {
        Ok(self
            .read_store()?
            .sessions
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    fn store_session(
        &self,
        address: &ProtocolAddress,
        record: &SessionRecord,
    ) -> Result<(), Self::Error> {
        self.write_store()?.sessions.insert(*address, record.clone());
        Ok(())
    }

    fn contains_session(&self, address: &ProtocolAddress) -> Result<bool, Self::Error> {
        Ok(self
            .read_store()?
            .sessions
            .get(address)
            .is_some_and(|record| !record.session_state().is_fresh()))
    }
}

impl PreKeyStore for MemoryStore {
    type Error = MemoryStoreError;

    fn load_prekey(&self, id: PreKeyId) -> Result<Option<PreKeyRecord>, Self::Error> {
        Ok(self.read_store()?.prekeys.get(&id).cloned())
    }

    fn store_prekey(&self, record: PreKeyRecord) -> Result<(), Self::Error> {
        self.write_store()?.prekeys.insert(record.id(), record);
        Ok(())
    }

    fn contains_prekey(&self, id: PreKeyId) -> Result<bool, Self::Error> {
        Ok(self.read_store()?.prekeys.contains_key(&id))
    }

    fn remove_prekey(&self, id: PreKeyId) -> Result<(), Self::Error> {
        self.write_store()?.prekeys.remove(&id);
        Ok(())
    }
}

impl SignedPreKeyStore for MemoryStore {
    type Error = MemoryStoreError;

    fn load_signed_prekey(
        &self,
        id: SignedPreKeyId,
    ) -> Result<Option<SignedPreKeyRecord>, Self::Error> {
        Ok(self.read_store()?.signed_prekeys.get(&id).cloned())
    }

    fn store_signed_prekey(&self, record: SignedPreKeyRecord) -> Result<(), Self::Error> {
        self.write_store()?.signed_prekeys.insert(record.id(), record);
        Ok(())
    }

    fn contains_signed_prekey(&self, id: SignedPreKeyId) -> Result<bool, Self::Error> {
        Ok(self.read_store()?.signed_prekeys.contains_key(&id))
    }
}

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("store lock is poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;
    use crate::identity::IdentityKeyPair;
    use crate::traits::IdentityKeyStore;

    use super::{MemoryStore, TrustPolicy};

    #[test]
    fn trust_on_first_use() {
        let rng = Rng::from_seed([1; 32]);
        let store = MemoryStore::new(IdentityKeyPair::generate(&rng).unwrap(), 1);

        let identity_1 = *IdentityKeyPair::generate(&rng).unwrap().identity_key();
        let identity_2 = *IdentityKeyPair::generate(&rng).unwrap().identity_key();

        // Unknown peers are trusted.
        assert!(store.is_trusted_identity(5, &identity_1).unwrap());
        store.save_identity(5, &identity_1).unwrap();

        assert!(store.is_trusted_identity(5, &identity_1).unwrap());
        assert!(!store.is_trusted_identity(5, &identity_2).unwrap());

        // Identities are per peer.
        assert!(store.is_trusted_identity(6, &identity_2).unwrap());
    }

    #[test]
    fn accept_key_change() {
        let rng = Rng::from_seed([1; 32]);
        let store = MemoryStore::with_trust_policy(
            IdentityKeyPair::generate(&rng).unwrap(),
            1,
            TrustPolicy::AcceptKeyChange,
        );

        let identity_1 = *IdentityKeyPair::generate(&rng).unwrap().identity_key();
        let identity_2 = *IdentityKeyPair::generate(&rng).unwrap().identity_key();

        store.save_identity(5, &identity_1).unwrap();
        assert!(store.is_trusted_identity(5, &identity_2).unwrap());
    }
}
