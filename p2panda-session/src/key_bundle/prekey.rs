// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::crypto::x25519::{KeyPair, PublicKey};
use crate::crypto::xeddsa::{XEdDSAError, XSignature};
use crate::identity::IdentityKey;

/// Unique identifier of one of our one-time pre-keys.
///
/// Identifiers are 24-bit values.
pub type PreKeyId = u32;

/// Unique identifier of one of our signed pre-keys.
pub type SignedPreKeyId = u32;

/// UNIX timestamp in milliseconds.
pub type Timestamp = u64;

/// Highest 24-bit pre-key id.
///
/// It is reserved for the "last resort" pre-key which is never consumed. Prekey messages
/// referencing it do not report a consumed pre-key.
pub const MAX_PREKEY_ID: PreKeyId = 0xFFFFFF;

/// One-time pre-key with its secret, kept in our pre-key store until used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKeyRecord {
    id: PreKeyId,
    key_pair: KeyPair,
}

impl PreKeyRecord {
    pub fn new(id: PreKeyId, key_pair: KeyPair) -> Self {
        Self { id, key_pair }
    }

    pub fn id(&self) -> PreKeyId {
        self.id
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key_pair.public_key()
    }
}

/// Signed pre-key with its secret, kept in our signed pre-key store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPreKeyRecord {
    id: SignedPreKeyId,
    key_pair: KeyPair,
    signature: XSignature,
    timestamp: Timestamp,
}

impl SignedPreKeyRecord {
    pub fn new(
        id: SignedPreKeyId,
        key_pair: KeyPair,
        signature: XSignature,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            key_pair,
            signature,
            timestamp,
        }
    }

    pub fn id(&self) -> SignedPreKeyId {
        self.id
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key_pair.public_key()
    }

    pub fn signature(&self) -> &XSignature {
        &self.signature
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Checks that the pre-key was signed by the given identity.
    pub fn verify(&self, identity_key: &IdentityKey) -> Result<(), XEdDSAError> {
        identity_key.verify_signature(self.public_key().as_bytes(), &self.signature)
    }
}
