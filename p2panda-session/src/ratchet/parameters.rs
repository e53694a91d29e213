// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

use crate::crypto::x25519::{KeyPair, PublicKey};
use crate::identity::{IdentityKey, IdentityKeyPair};

/// Key material of the initiating party ("Alice") of an asynchronous handshake.
#[derive(Clone, Debug)]
pub struct AliceParameters {
    pub(crate) our_identity_key_pair: IdentityKeyPair,
    pub(crate) our_base_key: KeyPair,
    pub(crate) our_ratchet_key: KeyPair,
    pub(crate) their_identity_key: IdentityKey,
    pub(crate) their_signed_prekey: PublicKey,
    pub(crate) their_ratchet_key: PublicKey,
    pub(crate) their_onetime_prekey: Option<PublicKey>,
}

impl AliceParameters {
    pub fn new(
        our_identity_key_pair: IdentityKeyPair,
        our_base_key: KeyPair,
        our_ratchet_key: KeyPair,
        their_identity_key: IdentityKey,
        their_signed_prekey: PublicKey,
        their_ratchet_key: PublicKey,
        their_onetime_prekey: Option<PublicKey>,
    ) -> Self {
        Self {
            our_identity_key_pair,
            our_base_key,
            our_ratchet_key,
            their_identity_key,
            their_signed_prekey,
            their_ratchet_key,
            their_onetime_prekey,
        }
    }
}

/// Key material of the responding party ("Bob") of an asynchronous handshake.
#[derive(Clone, Debug)]
pub struct BobParameters {
    pub(crate) our_identity_key_pair: IdentityKeyPair,
    pub(crate) our_signed_prekey: KeyPair,
    pub(crate) our_ratchet_key: KeyPair,
    pub(crate) our_onetime_prekey: Option<KeyPair>,
    pub(crate) their_identity_key: IdentityKey,
    pub(crate) their_base_key: PublicKey,
}

impl BobParameters {
    pub fn new(
        our_identity_key_pair: IdentityKeyPair,
        our_signed_prekey: KeyPair,
        our_ratchet_key: KeyPair,
        our_onetime_prekey: Option<KeyPair>,
        their_identity_key: IdentityKey,
        their_base_key: PublicKey,
    ) -> Self {
        Self {
            our_identity_key_pair,
            our_signed_prekey,
            our_ratchet_key,
            our_onetime_prekey,
            their_identity_key,
            their_base_key,
        }
    }
}

/// Key material of either party of the interactive key exchange.
#[derive(Clone, Debug)]
pub struct SymmetricParameters {
    pub(crate) our_identity_key_pair: IdentityKeyPair,
    pub(crate) our_base_key: KeyPair,
    pub(crate) our_ratchet_key: KeyPair,
    pub(crate) their_identity_key: IdentityKey,
    pub(crate) their_base_key: PublicKey,
    pub(crate) their_ratchet_key: PublicKey,
}

impl SymmetricParameters {
    /// Fails if both parties used the same base key, no role could be assigned then.
    pub fn new(
        our_identity_key_pair: IdentityKeyPair,
        our_base_key: KeyPair,
        our_ratchet_key: KeyPair,
        their_identity_key: IdentityKey,
        their_base_key: PublicKey,
        their_ratchet_key: PublicKey,
    ) -> Result<Self, ParametersError> {
        if our_base_key.public_key() == &their_base_key {
            return Err(ParametersError::IdenticalBaseKeys);
        }

        Ok(Self {
            our_identity_key_pair,
            our_base_key,
            our_ratchet_key,
            their_identity_key,
            their_base_key,
            their_ratchet_key,
        })
    }

    /// The party with the lower base key takes the role of the initiator.
    pub fn is_alice(&self) -> bool {
        self.our_base_key.public_key() < &self.their_base_key
    }

    pub fn our_base_key(&self) -> &KeyPair {
        &self.our_base_key
    }

    pub fn our_ratchet_key(&self) -> &KeyPair {
        &self.our_ratchet_key
    }

    pub fn our_identity_key_pair(&self) -> &IdentityKeyPair {
        &self.our_identity_key_pair
    }
}

impl From<SymmetricParameters> for AliceParameters {
    fn from(value: SymmetricParameters) -> Self {
        AliceParameters::new(
            value.our_identity_key_pair,
            value.our_base_key,
            value.our_ratchet_key,
            value.their_identity_key,
            value.their_base_key,
            value.their_ratchet_key,
            None,
        )
    }
}

impl From<SymmetricParameters> for BobParameters {
    fn from(value: SymmetricParameters) -> Self {
        BobParameters::new(
            value.our_identity_key_pair,
            value.our_base_key,
            value.our_ratchet_key,
            None,
            value.their_identity_key,
            value.their_base_key,
        )
    }
}

#[derive(Debug, Error)]
pub enum ParametersError {
    #[error("both parties used the same base key")]
    IdenticalBaseKeys,
}
