// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::cbor::{decode_cbor, encode_cbor};
use crate::crypto::x25519::PublicKey;
use crate::error::SessionError;
use crate::identity::IdentityKey;
use crate::key_bundle::{PreKeyId, SignedPreKeyId};
use crate::protocol::{ProtocolVersion, RatchetMessage};

/// First messages of a session sent by the initiator until the responder answered.
///
/// Carries everything the responder needs to derive the session from its pre-keys, next to the
/// actual encrypted message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreKeyMessage {
    message_version: ProtocolVersion,
    registration_id: u32,
    prekey_id: Option<PreKeyId>,
    signed_prekey_id: Option<SignedPreKeyId>,
    base_key: PublicKey,
    identity_key: IdentityKey,
    message: RatchetMessage,
}

#[derive(Serialize, Deserialize)]
struct PreKeyMessageBody {
    registration_id: Option<u32>,
    prekey_id: Option<PreKeyId>,
    signed_prekey_id: Option<SignedPreKeyId>,
    base_key: Option<PublicKey>,
    identity_key: Option<IdentityKey>,
    #[serde(default, with = "serde_bytes")]
    message: Option<Vec<u8>>,
}

impl PreKeyMessage {
    pub fn new(
        message_version: ProtocolVersion,
        registration_id: u32,
        prekey_id: Option<PreKeyId>,
        signed_prekey_id: Option<SignedPreKeyId>,
        base_key: PublicKey,
        identity_key: IdentityKey,
        message: RatchetMessage,
    ) -> Self {
        Self {
            message_version,
            registration_id,
            prekey_id,
            signed_prekey_id,
            base_key,
            identity_key,
            message,
        }
    }

    pub fn message_version(&self) -> ProtocolVersion {
        self.message_version
    }

    pub fn registration_id(&self) -> u32 {
        self.registration_id
    }

    pub fn prekey_id(&self) -> Option<PreKeyId> {
        self.prekey_id
    }

    pub fn signed_prekey_id(&self) -> Option<SignedPreKeyId> {
        self.signed_prekey_id
    }

    pub fn base_key(&self) -> &PublicKey {
        &self.base_key
    }

    pub fn identity_key(&self) -> &IdentityKey {
        &self.identity_key
    }

    pub fn message(&self) -> &RatchetMessage {
        &self.message
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SessionError> {
        let body = PreKeyMessageBody {
            registration_id: Some(self.registration_id),
            prekey_id: self.prekey_id,
            signed_prekey_id: self.signed_prekey_id,
            base_key: Some(self.base_key),
            identity_key: Some(self.identity_key),
            message: Some(self.message.to_bytes()?),
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
        let body: PreKeyMessageBody = decode_cbor(body)?;

        let (Some(registration_id), Some(base_key), Some(identity_key), Some(message)) = (
            body.registration_id,
            body.base_key,
            body.identity_key,
            body.message,
        ) else {
            return Err(SessionError::InvalidMessage("incomplete pre-key message"));
        };

        if message_version == ProtocolVersion::V3 && body.signed_prekey_id.is_none() {
            return Err(SessionError::InvalidMessage(
                "pre-key message without signed pre-key id",
            ));
        }

        Ok(Self::new(
            message_version,
            registration_id,
            body.prekey_id,
            body.signed_prekey_id,
            base_key,
            identity_key,
            RatchetMessage::from_bytes(&message)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::crypto::Rng;
    use crate::crypto::x25519::KeyPair;
    use crate::error::SessionError;
    use crate::identity::IdentityKeyPair;
    use crate::protocol::{ProtocolVersion, RatchetMessage};

    use super::PreKeyMessage;

    #[test]
    fn signed_prekey_id_required_for_v3() {
        let rng = Rng::from_seed([1; 32]);
        let identity = IdentityKeyPair::generate(&rng).unwrap();
        let base_key = KeyPair::generate(&rng).unwrap();
        let ratchet_key = KeyPair::generate(&rng).unwrap();

        let inner = RatchetMessage::new(
            ProtocolVersion::V3,
            *ratchet_key.public_key(),
            0,
            0,
            vec![7; 24],
        );
        let message = PreKeyMessage::new(
            ProtocolVersion::V3,
            42,
            Some(7),
            Some(1),
            *base_key.public_key(),
            *identity.identity_key(),
            inner.clone(),
        );
        let bytes = message.to_bytes().unwrap();
        assert_eq!(PreKeyMessage::from_bytes(&bytes).unwrap(), message);

        let message = PreKeyMessage::new(
            ProtocolVersion::V3,
            42,
            Some(7),
            None,
            *base_key.public_key(),
            *identity.identity_key(),
            inner,
        );
        assert_matches!(
            PreKeyMessage::from_bytes(&message.to_bytes().unwrap()),
            Err(SessionError::InvalidMessage(_))
        );
    }
}
