// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;
use std::fmt;

use thiserror::Error;

use crate::address::ProtocolAddress;
use crate::cbor::{DecodeError, EncodeError};
use crate::crypto::RngError;
use crate::crypto::hkdf::HkdfError;
use crate::crypto::hmac::HmacError;
use crate::crypto::x25519::X25519Error;
use crate::crypto::xchacha20::XAeadError;
use crate::crypto::xeddsa::XEdDSAError;
use crate::key_bundle::{KeyBundleError, PreKeyId, SignedPreKeyId};
use crate::protocol::VersionError;
use crate::ratchet::ParametersError;

/// Pre-key a handshake referenced but which could not be located.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyId {
    PreKey(PreKeyId),
    SignedPreKey(SignedPreKeyId),
    /// The message did not reference a required pre-key at all.
    Missing,
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::PreKey(id) => write!(f, "pre-key {id}"),
            KeyId::SignedPreKey(id) => write!(f, "signed pre-key {id}"),
            KeyId::Missing => write!(f, "missing pre-key id"),
        }
    }
}

/// Errors which can occur while establishing sessions or encrypting and decrypting messages.
///
/// None of the failing operations leave a modified session record or identity store behind.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("identity key of {0} is not trusted")]
    UntrustedIdentity(ProtocolAddress),

    #[error("invalid pre-key bundle: {0}")]
    InvalidKey(#[from] KeyBundleError),

    #[error("invalid base key signature: {0}")]
    InvalidSignature(XEdDSAError),

    #[error("unknown key id: {0}")]
    InvalidKeyId(KeyId),

    #[error("received key exchange response does not match pending key exchange")]
    StaleKeyExchange,

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),

    #[error("no session for {0}")]
    NoSession(ProtocolAddress),

    #[error("message could not be decrypted with any session state")]
    NoValidSessions,

    #[error("received message with old counter {0}")]
    DuplicateMessage(u32),

    #[error("session lock is poisoned")]
    LockPoisoned,

    #[error("store error: {0}")]
    Store(Box<dyn Error + Send + Sync + 'static>),

    #[error(transparent)]
    Parameters(#[from] ParametersError),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    X25519(#[from] X25519Error),

    #[error(transparent)]
    XEdDSA(#[from] XEdDSAError),

    #[error(transparent)]
    Hkdf(#[from] HkdfError),

    #[error(transparent)]
    Hmac(#[from] HmacError),

    #[error(transparent)]
    XAead(#[from] XAeadError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl SessionError {
    pub(crate) fn store<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }
}
