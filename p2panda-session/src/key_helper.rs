// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers to generate the key material a device needs before it can take part in sessions.
//!
//! A device generates its identity key pair and registration id once at install time. Afterwards
//! it publishes a signed pre-key and a batch of one-time pre-keys, their secrets are kept in the
//! pre-key stores.
use crate::crypto::x25519::KeyPair;
use crate::crypto::{Rng, RngError};
use crate::error::SessionError;
use crate::identity::IdentityKeyPair;
use crate::key_bundle::{
    MAX_PREKEY_ID, PreKeyId, PreKeyRecord, SignedPreKeyId, SignedPreKeyRecord, Timestamp,
};

/// Upper bound (inclusive) of registration ids.
pub const MAX_REGISTRATION_ID: u32 = 16380;

/// Upper bound (inclusive) of interactive key exchange sequence numbers.
pub const MAX_SEQUENCE: u32 = 65534;

pub fn generate_identity_key_pair(rng: &Rng) -> Result<IdentityKeyPair, RngError> {
    IdentityKeyPair::generate(rng)
}

/// Returns a random registration id in the range `1..=16380`.
pub fn generate_registration_id(rng: &Rng) -> Result<u32, RngError> {
    Ok(rng.random_below(MAX_REGISTRATION_ID)? + 1)
}

/// Generates a batch of one-time pre-keys with consecutive ids starting at `start`.
///
/// Ids wrap around before reaching the reserved last-resort id and never become `0`.
pub fn generate_prekeys(
    start: PreKeyId,
    count: u32,
    rng: &Rng,
) -> Result<Vec<PreKeyRecord>, RngError> {
    let mut prekeys = Vec::with_capacity(count as usize);
    for i in 0..count {
        let id = (start.wrapping_add(i) % (MAX_PREKEY_ID - 1)) + 1;
        prekeys.push(PreKeyRecord::new(id, KeyPair::generate(rng)?));
    }
    Ok(prekeys)
}

/// Generates the pre-key which is used when all one-time pre-keys have been consumed.
pub fn generate_last_resort_prekey(rng: &Rng) -> Result<PreKeyRecord, RngError> {
    Ok(PreKeyRecord::new(MAX_PREKEY_ID, KeyPair::generate(rng)?))
}

/// Generates a signed pre-key, the signature covers the public key.
pub fn generate_signed_prekey(
    identity_key_pair: &IdentityKeyPair,
    id: SignedPreKeyId,
    timestamp: Timestamp,
    rng: &Rng,
) -> Result<SignedPreKeyRecord, SessionError> {
    let key_pair = KeyPair::generate(rng)?;
    let signature = identity_key_pair.sign(key_pair.public_key().as_bytes(), rng)?;
    Ok(SignedPreKeyRecord::new(id, key_pair, signature, timestamp))
}

/// Returns a random sequence number for the interactive key exchange in the range `1..=65534`.
pub fn generate_sequence(rng: &Rng) -> Result<u32, RngError> {
    Ok(rng.random_below(MAX_SEQUENCE)? + 1)
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;
    use crate::key_bundle::MAX_PREKEY_ID;

    use super::{
        MAX_REGISTRATION_ID, generate_identity_key_pair, generate_last_resort_prekey,
        generate_prekeys, generate_registration_id, generate_sequence, generate_signed_prekey,
    };

    #[test]
    fn registration_ids_in_range() {
        let rng = Rng::from_seed([1; 32]);
        for _ in 0..1000 {
            let id = generate_registration_id(&rng).unwrap();
            assert!((1..=MAX_REGISTRATION_ID).contains(&id));
        }
    }

    #[test]
    fn sequences_in_range() {
        let rng = Rng::from_seed([1; 32]);
        for _ in 0..1000 {
            let sequence = generate_sequence(&rng).unwrap();
            assert!((1..=65534).contains(&sequence));
        }
    }

    #[test]
    fn prekey_ids_wrap_around() {
        let rng = Rng::from_seed([1; 32]);

        let prekeys = generate_prekeys(1, 3, &rng).unwrap();
        let ids: Vec<u32> = prekeys.iter().map(|prekey| prekey.id()).collect();
        assert_eq!(ids, vec![2, 3, 4]);

        let prekeys = generate_prekeys(MAX_PREKEY_ID - 2, 3, &rng).unwrap();
        let ids: Vec<u32> = prekeys.iter().map(|prekey| prekey.id()).collect();
        assert_eq!(ids, vec![MAX_PREKEY_ID - 1, 1, 2]);

        // All generated keys are distinct.
        assert_ne!(prekeys[0].public_key(), prekeys[1].public_key());
        assert_eq!(generate_last_resort_prekey(&rng).unwrap().id(), MAX_PREKEY_ID);
    }

    #[test]
    fn signed_prekey_verifies() {
        let rng = Rng::from_seed([1; 32]);
        let identity = generate_identity_key_pair(&rng).unwrap();
        let other = generate_identity_key_pair(&rng).unwrap();

        let signed_prekey = generate_signed_prekey(&identity, 1, 1_700_000_000_000, &rng).unwrap();
        assert_eq!(signed_prekey.id(), 1);
        assert_eq!(signed_prekey.timestamp(), 1_700_000_000_000);
        assert!(signed_prekey.verify(identity.identity_key()).is_ok());
        assert!(signed_prekey.verify(other.identity_key()).is_err());
    }
}
