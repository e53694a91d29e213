// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::DeviceId;
use crate::crypto::x25519::PublicKey;
use crate::crypto::xeddsa::{XEdDSAError, XSignature};
use crate::identity::IdentityKey;
use crate::key_bundle::{PreKeyId, SignedPreKeyId};

/// Public part of a one-time pre-key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimePreKey {
    pub id: PreKeyId,
    pub public_key: PublicKey,
}

/// Public part of a signed pre-key with the signature of the owner's identity over it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPreKey {
    pub id: SignedPreKeyId,
    pub public_key: PublicKey,
    pub signature: XSignature,
}

/// Published handshake material of a peer's device.
///
/// Bundles are transient and possibly stale, they are not persisted by this crate. At least one
/// of the pre-keys is always present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKeyBundle {
    registration_id: u32,
    device_id: DeviceId,
    identity_key: IdentityKey,
    prekey: Option<OneTimePreKey>,
    signed_prekey: Option<SignedPreKey>,
}

impl PreKeyBundle {
    pub fn new(
        registration_id: u32,
        device_id: DeviceId,
        identity_key: IdentityKey,
        prekey: Option<OneTimePreKey>,
        signed_prekey: Option<SignedPreKey>,
    ) -> Result<Self, KeyBundleError> {
        if prekey.is_none() && signed_prekey.is_none() {
            return Err(KeyBundleError::MissingPreKeys);
        }

        Ok(Self {
            registration_id,
            device_id,
            identity_key,
            prekey,
            signed_prekey,
        })
    }

    pub fn registration_id(&self) -> u32 {
        self.registration_id
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn identity_key(&self) -> &IdentityKey {
        &self.identity_key
    }

    pub fn prekey(&self) -> Option<&OneTimePreKey> {
        self.prekey.as_ref()
    }

    pub fn signed_prekey(&self) -> Option<&SignedPreKey> {
        self.signed_prekey.as_ref()
    }

    /// Checks that the bundle holds a pre-key and that a present signed pre-key was signed by the
    /// bundle's identity.
    pub fn verify(&self) -> Result<(), KeyBundleError> {
        if self.prekey.is_none() && self.signed_prekey.is_none() {
            return Err(KeyBundleError::MissingPreKeys);
        }

        if let Some(signed_prekey) = &self.signed_prekey {
            self.identity_key
                .verify_signature(signed_prekey.public_key.as_bytes(), &signed_prekey.signature)?;
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum KeyBundleError {
    #[error("both signed and one-time pre-keys are absent")]
    MissingPreKeys,

    #[error("invalid signature on signed pre-key: {0}")]
    InvalidSignature(#[from] XEdDSAError),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::crypto::Rng;
    use crate::crypto::x25519::KeyPair;
    use crate::identity::IdentityKeyPair;

    use super::{KeyBundleError, OneTimePreKey, PreKeyBundle, SignedPreKey};

    #[test]
    fn verify() {
        let rng = Rng::from_seed([1; 32]);

        let identity = IdentityKeyPair::generate(&rng).unwrap();
        let signed_prekey = KeyPair::generate(&rng).unwrap();
        let prekey = KeyPair::generate(&rng).unwrap();

        let signature = identity
            .sign(signed_prekey.public_key().as_bytes(), &rng)
            .unwrap();

        let bundle = PreKeyBundle::new(
            1,
            1,
            *identity.identity_key(),
            Some(OneTimePreKey {
                id: 7,
                public_key: *prekey.public_key(),
            }),
            Some(SignedPreKey {
                id: 1,
                public_key: *signed_prekey.public_key(),
                signature,
            }),
        )
        .unwrap();
        assert!(bundle.verify().is_ok());

        // Legacy bundles without signed pre-key.
        let bundle = PreKeyBundle::new(
            1,
            1,
            *identity.identity_key(),
            Some(OneTimePreKey {
                id: 7,
                public_key: *prekey.public_key(),
            }),
            None,
        )
        .unwrap();
        assert!(bundle.verify().is_ok());

        // Signature over another key.
        let bundle = PreKeyBundle::new(
            1,
            1,
            *identity.identity_key(),
            None,
            Some(SignedPreKey {
                id: 1,
                public_key: *prekey.public_key(),
                signature,
            }),
        )
        .unwrap();
        assert_matches!(bundle.verify(), Err(KeyBundleError::InvalidSignature(_)));
    }

    #[test]
    fn missing_prekeys() {
        let rng = Rng::from_seed([1; 32]);
        let identity = IdentityKeyPair::generate(&rng).unwrap();

        assert_matches!(
            PreKeyBundle::new(1, 1, *identity.identity_key(), None, None),
            Err(KeyBundleError::MissingPreKeys)
        );
    }
}
