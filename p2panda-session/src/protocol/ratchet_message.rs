// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::cbor::{decode_cbor, encode_cbor};
use crate::crypto::x25519::PublicKey;
use crate::error::SessionError;
use crate::identity::IdentityKey;
use crate::protocol::ProtocolVersion;

/// Message encrypted with a message key of an established session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RatchetMessage {
    message_version: ProtocolVersion,
    sender_ratchet_key: PublicKey,
    counter: u32,
    previous_counter: u32,
    ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct RatchetMessageBody {
    ratchet_key: Option<PublicKey>,
    counter: Option<u32>,
    previous_counter: Option<u32>,
    #[serde(default, with = "serde_bytes")]
    ciphertext: Option<Vec<u8>>,
}

impl RatchetMessage {
    pub fn new(
        message_version: ProtocolVersion,
        sender_ratchet_key: PublicKey,
        counter: u32,
        previous_counter: u32,
        ciphertext: Vec<u8>,
    ) -> Self {
        Self {
            message_version,
            sender_ratchet_key,
            counter,
            previous_counter,
            ciphertext,
        }
    }

    pub fn message_version(&self) -> ProtocolVersion {
        self.message_version
    }

    pub fn sender_ratchet_key(&self) -> &PublicKey {
        &self.sender_ratchet_key
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn previous_counter(&self) -> u32 {
        self.previous_counter
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Associated data authenticated together with the ciphertext.
    ///
    /// Binds the message header and both identities to the ciphertext.
    pub(crate) fn associated_data(
        message_version: ProtocolVersion,
        sender_ratchet_key: &PublicKey,
        counter: u32,
        previous_counter: u32,
        sender_identity: &IdentityKey,
        receiver_identity: &IdentityKey,
    ) -> Vec<u8> {
        let mut aad = Vec::with_capacity(32 * 3 + 1 + 4 * 2);
        aad.extend_from_slice(sender_identity.as_bytes());
        aad.extend_from_slice(receiver_identity.as_bytes());
        aad.push(message_version.version_byte());
        aad.extend_from_slice(sender_ratchet_key.as_bytes());
        aad.extend_from_slice(&counter.to_be_bytes());
        aad.extend_from_slice(&previous_counter.to_be_bytes());
        aad
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SessionError> {
        let body = RatchetMessageBody {
            ratchet_key: Some(self.sender_ratchet_key),
            counter: Some(self.counter),
            previous_counter: Some(self.previous_counter),
            ciphertext: Some(self.ciphertext.clone()),
        };
        let mut bytes = vec![self.message_version.version_byte()];
        bytes.extend(encode_cbor(&body)?);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SessionError> {
        let (version_byte, body) = bytes
            .split_first()
            .ok_or(SessionError::InvalidMessage("empty message"))?;
        let (message_version, _) = ProtocolVersion::parse_version_byte(*version_byte)?;
        let body: RatchetMessageBody = decode_cbor(body)?;

        match body {
            RatchetMessageBody {
                ratchet_key: Some(ratchet_key),
                counter: Some(counter),
                previous_counter: Some(previous_counter),
                ciphertext: Some(ciphertext),
            } => Ok(Self::new(
                message_version,
                ratchet_key,
                counter,
                previous_counter,
                ciphertext,
            )),
            _ => Err(SessionError::InvalidMessage("incomplete ratchet message")),
        }
    }
}
