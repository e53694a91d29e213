// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a remote peer.
pub type RecipientId = u64;

/// Identifier of one of the devices of a peer.
pub type DeviceId = u32;

/// Address of a single device of a remote peer.
///
/// Sessions are established per device, every address has at most one session record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolAddress {
    recipient_id: RecipientId,
    device_id: DeviceId,
}

impl ProtocolAddress {
    pub fn new(recipient_id: RecipientId, device_id: DeviceId) -> Self {
        Self {
            recipient_id,
            device_id,
        }
    }

    pub fn recipient_id(&self) -> RecipientId {
        self.recipient_id
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }
}

impl fmt::Display for ProtocolAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.recipient_id, self.device_id)
    }
}
