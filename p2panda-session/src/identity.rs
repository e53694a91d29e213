// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term identity keys of peers.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::x25519::{PublicKey, SHARED_SECRET_SIZE, SecretKey, X25519Error};
use crate::crypto::xeddsa::{XEdDSAError, XSignature, xeddsa_sign, xeddsa_verify};
use crate::crypto::{Rng, RngError};

/// Public identity key of a peer, trust decisions are made against it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityKey(PublicKey);

impl IdentityKey {
    pub fn new(public_key: PublicKey) -> Self {
        Self(public_key)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Verifies an XEdDSA signature created with the secret half of this identity.
    pub fn verify_signature(&self, bytes: &[u8], signature: &XSignature) -> Result<(), XEdDSAError> {
        xeddsa_verify(bytes, &self.0, signature)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PublicKey> for IdentityKey {
    fn from(public_key: PublicKey) -> Self {
        Self(public_key)
    }
}

/// Our own long-term identity key pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityKeyPair {
    identity_key: IdentityKey,
    secret_key: SecretKey,
}

impl IdentityKeyPair {
    pub fn generate(rng: &Rng) -> Result<Self, RngError> {
        Ok(Self::from_secret_key(SecretKey::from_bytes(
            rng.random_array()?,
        )))
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        Self {
            identity_key: IdentityKey(secret_key.public_key()),
            secret_key,
        }
    }

    pub fn identity_key(&self) -> &IdentityKey {
        &self.identity_key
    }

    pub fn sign(&self, bytes: &[u8], rng: &Rng) -> Result<XSignature, XEdDSAError> {
        xeddsa_sign(bytes, &self.secret_key, rng)
    }

    pub(crate) fn calculate_agreement(
        &self,
        their_public: &PublicKey,
    ) -> Result<[u8; SHARED_SECRET_SIZE], X25519Error> {
        self.secret_key.calculate_agreement(their_public)
    }
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;

    use super::IdentityKeyPair;

    #[test]
    fn sign_and_verify() {
        let rng = Rng::from_seed([1; 32]);
        let identity = IdentityKeyPair::generate(&rng).unwrap();

        let signature = identity.sign(b"base key", &rng).unwrap();
        assert!(
            identity
                .identity_key()
                .verify_signature(b"base key", &signature)
                .is_ok()
        );

        let other = IdentityKeyPair::generate(&rng).unwrap();
        assert!(
            other
                .identity_key()
                .verify_signature(b"base key", &signature)
                .is_err()
        );
    }
}
