// SPDX-License-Identifier: MIT OR Apache-2.0

//! Root-, chain- and message keys of the ratchet.
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::Secret;
use crate::crypto::hkdf::{HkdfError, hkdf, hkdf_v2};
use crate::crypto::hmac::hmac_sha256;
use crate::crypto::x25519::{KeyPair, PublicKey};
use crate::crypto::xchacha20::{XAEAD_KEY_SIZE, XAEAD_NONCE_SIZE, XAeadKey, XAeadNonce};
use crate::error::SessionError;
use crate::protocol::ProtocolVersion;

pub const KEY_SIZE: usize = 32;

const ROOT_INFO: &[u8] = b"WhisperText";

const RATCHET_INFO: &[u8] = b"WhisperRatchet";

const MESSAGE_KEYS_INFO: &[u8] = b"WhisperMessageKeys";

const MESSAGE_KEY_SEED: [u8; 1] = [0x01];

const CHAIN_KEY_SEED: [u8; 1] = [0x02];

/// HKDF variant of the given protocol version.
fn kdf<const N: usize>(
    version: ProtocolVersion,
    salt: &[u8],
    ikm: &[u8],
    info: &[u8],
) -> Result<[u8; N], HkdfError> {
    match version {
        ProtocolVersion::V2 => hkdf_v2(salt, ikm, Some(info)),
        ProtocolVersion::V3 => hkdf(salt, ikm, Some(info)),
    }
}

/// Splits derived key material into the root key and a chain key at index `0`.
fn split(derived: &[u8; 2 * KEY_SIZE]) -> (RootKey, ChainKey) {
    let mut root_key = [0u8; KEY_SIZE];
    let mut chain_key = [0u8; KEY_SIZE];
    root_key.copy_from_slice(&derived[..KEY_SIZE]);
    chain_key.copy_from_slice(&derived[KEY_SIZE..]);
    (
        RootKey(Secret::from_bytes(root_key)),
        ChainKey {
            key: Secret::from_bytes(chain_key),
            index: 0,
        },
    )
}

/// Derives the first root key and chain key of a session from the master secret.
pub(crate) fn derive_initial_keys(
    version: ProtocolVersion,
    master_secret: &[u8],
) -> Result<(RootKey, ChainKey), HkdfError> {
    let derived = Zeroizing::new(kdf::<{ 2 * KEY_SIZE }>(
        version,
        &[0u8; KEY_SIZE],
        master_secret,
        ROOT_INFO,
    )?);
    Ok(split(&derived))
}

/// Root key of a session, reseeds the chain keys whenever a new ratchet key is seen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootKey(Secret<KEY_SIZE>);

impl RootKey {
    /// Derives the next root key and a new chain key from a Diffie-Hellman exchange between
    /// their ratchet key and ours.
    pub(crate) fn create_chain(
        &self,
        version: ProtocolVersion,
        their_ratchet_key: &PublicKey,
        our_ratchet_key: &KeyPair,
    ) -> Result<(RootKey, ChainKey), SessionError> {
        let shared_secret =
            Zeroizing::new(our_ratchet_key.calculate_agreement(their_ratchet_key)?);
        let derived = Zeroizing::new(kdf::<{ 2 * KEY_SIZE }>(
            version,
            self.0.as_bytes(),
            &shared_secret[..],
            RATCHET_INFO,
        )?);
        Ok(split(&derived))
    }
}

/// Symmetric chain key, advanced once per message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainKey {
    key: Secret<KEY_SIZE>,
    index: u32,
}

impl ChainKey {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn next(&self) -> Result<ChainKey, SessionError> {
        let index = self
            .index
            .checked_add(1)
            .ok_or(SessionError::InvalidMessage("chain key index overflow"))?;
        Ok(ChainKey {
            key: Secret::from_bytes(hmac_sha256(
                self.key.as_bytes(),
                &[CHAIN_KEY_SEED.as_slice()],
            )?),
            index,
        })
    }

    pub(crate) fn message_keys(
        &self,
        version: ProtocolVersion,
    ) -> Result<MessageKeys, SessionError> {
        let seed = Zeroizing::new(hmac_sha256(
            self.key.as_bytes(),
            &[MESSAGE_KEY_SEED.as_slice()],
        )?);
        let derived = Zeroizing::new(kdf::<{ XAEAD_KEY_SIZE + XAEAD_NONCE_SIZE }>(
            version,
            &[],
            &seed[..],
            MESSAGE_KEYS_INFO,
        )?);

        let mut cipher_key = [0u8; XAEAD_KEY_SIZE];
        let mut nonce = [0u8; XAEAD_NONCE_SIZE];
        cipher_key.copy_from_slice(&derived[..XAEAD_KEY_SIZE]);
        nonce.copy_from_slice(&derived[XAEAD_KEY_SIZE..]);

        Ok(MessageKeys {
            cipher_key: Secret::from_bytes(cipher_key),
            nonce: Secret::from_bytes(nonce),
            counter: self.index,
        })
    }
}

/// Key and nonce to encrypt exactly one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageKeys {
    cipher_key: Secret<XAEAD_KEY_SIZE>,
    nonce: Secret<XAEAD_NONCE_SIZE>,
    counter: u32,
}

impl MessageKeys {
    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub(crate) fn cipher_key(&self) -> &XAeadKey {
        self.cipher_key.as_bytes()
    }

    pub(crate) fn nonce(&self) -> &XAeadNonce {
        self.nonce.as_bytes()
    }
}
