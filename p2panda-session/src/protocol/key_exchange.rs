// SPDX-License-Identifier: MIT OR Apache-2.0

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::cbor::{decode_cbor, encode_cbor};
use crate::crypto::x25519::PublicKey;
use crate::crypto::xeddsa::XSignature;
use crate::error::SessionError;
use crate::identity::IdentityKey;
use crate::protocol::ProtocolVersion;

/// Role flags of an interactive key exchange message.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyExchangeFlags(u8);

impl KeyExchangeFlags {
    pub const INITIATE: Self = Self(0x01);
    pub const RESPONSE: Self = Self(0x02);
    pub const SIMULTANEOUS_INITIATE: Self = Self(0x04);

    /// Flags occupy the lowest five bits of the packed message id.
    const MASK: u32 = 0x1F;

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for KeyExchangeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Message of the interactive key exchange, used when no pre-key bundle of the other party is
/// available.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyExchangeMessage {
    version: ProtocolVersion,
    max_version: u8,
    sequence: u32,
    flags: KeyExchangeFlags,
    base_key: PublicKey,
    base_key_signature: Option<XSignature>,
    ratchet_key: PublicKey,
    identity_key: IdentityKey,
}

#[derive(Serialize, Deserialize)]
struct KeyExchangeMessageBody {
    id: Option<u32>,
    base_key: Option<PublicKey>,
    ratchet_key: Option<PublicKey>,
    identity_key: Option<IdentityKey>,
    base_key_signature: Option<XSignature>,
}

impl KeyExchangeMessage {
    pub fn new(
        version: ProtocolVersion,
        sequence: u32,
        flags: KeyExchangeFlags,
        base_key: PublicKey,
        base_key_signature: Option<XSignature>,
        ratchet_key: PublicKey,
        identity_key: IdentityKey,
    ) -> Self {
        Self {
            version,
            max_version: ProtocolVersion::CURRENT.into(),
            sequence,
            flags,
            base_key,
            base_key_signature,
            ratchet_key,
            identity_key,
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Highest version the sender supports.
    pub fn max_version(&self) -> u8 {
        self.max_version
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn flags(&self) -> KeyExchangeFlags {
        self.flags
    }

    pub fn base_key(&self) -> &PublicKey {
        &self.base_key
    }

    pub fn base_key_signature(&self) -> Option<&XSignature> {
        self.base_key_signature.as_ref()
    }

    pub fn ratchet_key(&self) -> &PublicKey {
        &self.ratchet_key
    }

    pub fn identity_key(&self) -> &IdentityKey {
        &self.identity_key
    }

    pub fn is_initiate(&self) -> bool {
        self.flags.contains(KeyExchangeFlags::INITIATE)
    }

    pub fn is_response(&self) -> bool {
        self.flags.contains(KeyExchangeFlags::RESPONSE)
    }

    pub fn is_response_for_simultaneous_initiate(&self) -> bool {
        self.flags.contains(KeyExchangeFlags::SIMULTANEOUS_INITIATE)
    }

    /// Checks the signature of the base key against the sender's identity.
    pub(crate) fn verify_base_key_signature(&self) -> Result<(), SessionError> {
        let signature = self
            .base_key_signature
            .as_ref()
            .ok_or(SessionError::InvalidMessage("missing base key signature"))?;
        self.identity_key
            .verify_signature(self.base_key.as_bytes(), signature)
            .map_err(SessionError::InvalidSignature)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SessionError> {
        let body = KeyExchangeMessageBody {
            id: Some((self.sequence << 5) | u32::from(self.flags.bits())),
            base_key: Some(self.base_key),
            ratchet_key: Some(self.ratchet_key),
            identity_key: Some(self.identity_key),
            base_key_signature: self.base_key_signature,
        };
        let mut bytes = vec![(u8::from(self.version) << 4) | self.max_version];
        bytes.extend(encode_cbor(&body)?);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SessionError> {
        let (version_byte, body) = bytes
            .split_first()
            .ok_or(SessionError::InvalidMessage("empty message"))?;
        let (version, max_version) = ProtocolVersion::parse_version_byte(*version_byte)?;
        let body: KeyExchangeMessageBody = decode_cbor(body)?;

        let (Some(id), Some(base_key), Some(ratchet_key), Some(identity_key)) =
            (body.id, body.base_key, body.ratchet_key, body.identity_key)
        else {
            return Err(SessionError::InvalidMessage("incomplete key exchange message"));
        };

        if version >= ProtocolVersion::V3 && body.base_key_signature.is_none() {
            return Err(SessionError::InvalidMessage("missing base key signature"));
        }

        Ok(Self {
            version,
            max_version,
            sequence: id >> 5,
            // Masked to five bits, the cast is lossless.
            flags: KeyExchangeFlags((id & KeyExchangeFlags::MASK) as u8),
            base_key,
            base_key_signature: body.base_key_signature,
            ratchet_key,
            identity_key,
        })
    }
}
