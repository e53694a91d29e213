// SPDX-License-Identifier: MIT OR Apache-2.0

//! Devices with in-memory stores to test sessions between them.
use crate::address::{ProtocolAddress, RecipientId};
use crate::config::SessionConfig;
use crate::crypto::Rng;
use crate::crypto::x25519::KeyPair;
use crate::identity::IdentityKeyPair;
use crate::key_bundle::{
    OneTimePreKey, PreKeyBundle, PreKeyId, PreKeyRecord, SignedPreKey, SignedPreKeyId,
};
use crate::key_helper::{generate_registration_id, generate_signed_prekey};
use crate::lock::SessionLocks;
use crate::session_builder::SessionBuilder;
use crate::session_cipher::SessionCipher;
use crate::state::SessionRecord;
use crate::stores::MemoryStore;
use crate::traits::{PreKeyStore, SessionStore, SignedPreKeyStore};

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// A device with its own identity, stores and locks, reachable under `address`.
#[derive(Clone, Debug)]
pub struct Device {
    pub address: ProtocolAddress,
    pub identity: IdentityKeyPair,
    pub registration_id: u32,
    pub store: MemoryStore,
    pub locks: SessionLocks,
}

impl Device {
    pub fn new(recipient_id: RecipientId, rng: &Rng) -> Self {
        let identity = IdentityKeyPair::generate(rng).unwrap();
        let registration_id = generate_registration_id(rng).unwrap();
        Self {
            address: ProtocolAddress::new(recipient_id, 1),
            store: MemoryStore::new(identity.clone(), registration_id),
            identity,
            registration_id,
            locks: SessionLocks::new(),
        }
    }

    /// Generates and stores a signed pre-key and optionally a one-time pre-key and returns the
    /// bundle to publish them.
    pub fn publish_bundle(
        &self,
        signed_prekey_id: SignedPreKeyId,
        prekey_id: Option<PreKeyId>,
        rng: &Rng,
    ) -> PreKeyBundle {
        let signed_prekey =
            generate_signed_prekey(&self.identity, signed_prekey_id, 0, rng).unwrap();
        let prekey = prekey_id.map(|id| self.store_prekey(id, rng));

        let bundle = PreKeyBundle::new(
            self.registration_id,
            self.address.device_id(),
            *self.identity.identity_key(),
            prekey,
            Some(SignedPreKey {
                id: signed_prekey.id(),
                public_key: *signed_prekey.public_key(),
                signature: *signed_prekey.signature(),
            }),
        )
        .unwrap();
        self.store.store_signed_prekey(signed_prekey).unwrap();
        bundle
    }

    /// Bundle of a version 2 device, holding an unsigned pre-key only.
    pub fn publish_v2_bundle(&self, prekey_id: PreKeyId, rng: &Rng) -> PreKeyBundle {
        let prekey = self.store_prekey(prekey_id, rng);
        PreKeyBundle::new(
            self.registration_id,
            self.address.device_id(),
            *self.identity.identity_key(),
            Some(prekey),
            None,
        )
        .unwrap()
    }

    pub fn builder(&self, remote: &Device) -> SessionBuilder<MemoryStore> {
        SessionBuilder::new(self.store.clone(), self.locks.clone(), remote.address)
    }

    pub fn cipher(&self, remote: &Device) -> SessionCipher<MemoryStore> {
        self.cipher_with_config(remote, SessionConfig::default())
    }

    pub fn cipher_with_config(
        &self,
        remote: &Device,
        config: SessionConfig,
    ) -> SessionCipher<MemoryStore> {
        SessionCipher::from_config(self.store.clone(), self.locks.clone(), remote.address, config)
    }

    /// Stored session record with the remote device.
    pub fn session(&self, remote: &Device) -> SessionRecord {
        self.store.load_session(&remote.address).unwrap()
    }

    fn store_prekey(&self, id: PreKeyId, rng: &Rng) -> OneTimePreKey {
        let record = PreKeyRecord::new(id, KeyPair::generate(rng).unwrap());
        let prekey = OneTimePreKey {
            id,
            public_key: *record.public_key(),
        };
        self.store.store_prekey(record).unwrap();
        prekey
    }
}
