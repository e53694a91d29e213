// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire messages of the session protocol.
//!
//! Every message starts with a version byte, its high nibble holds the message version and its
//! low nibble the highest version the sender supports. The rest of the message is a CBOR encoded
//! body.
mod key_exchange;
mod prekey_message;
mod ratchet_message;
mod version;

pub use key_exchange::{KeyExchangeFlags, KeyExchangeMessage};
pub use prekey_message::PreKeyMessage;
pub use ratchet_message::RatchetMessage;
pub use version::{ProtocolVersion, VersionError};

use crate::error::SessionError;

/// Encrypted message produced by a session cipher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CiphertextMessage {
    /// Sent while the other party has not yet acknowledged the session.
    PreKey(PreKeyMessage),
    Ratchet(RatchetMessage),
}

impl CiphertextMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SessionError> {
        match self {
            CiphertextMessage::PreKey(message) => message.to_bytes(),
            CiphertextMessage::Ratchet(message) => message.to_bytes(),
        }
    }
}
