// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Versions of the session protocol.
///
/// Version 3 adds the discontinuity bytes and the optional one-time pre-key term to the master
/// secret, signs pre-keys and base keys and uses RFC 5869 HKDF. Version 2 is kept to interoperate
/// with older peers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProtocolVersion {
    V2,
    V3,
}

impl ProtocolVersion {
    /// Highest version this implementation supports.
    pub const CURRENT: ProtocolVersion = ProtocolVersion::V3;

    /// Returns the highest version both we and the other party support.
    pub fn negotiate(their_max_version: u8) -> Result<Self, VersionError> {
        Self::try_from(their_max_version.min(Self::CURRENT.into()))
    }

    /// Byte prefixing every wire message, high nibble is the message version, low nibble the
    /// highest version we support.
    pub(crate) fn version_byte(self) -> u8 {
        (u8::from(self) << 4) | u8::from(Self::CURRENT)
    }

    /// Splits a version byte into the message version and the sender's highest version.
    pub(crate) fn parse_version_byte(byte: u8) -> Result<(Self, u8), VersionError> {
        Ok((Self::try_from(byte >> 4)?, byte & 0x0F))
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(value: ProtocolVersion) -> Self {
        match value {
            ProtocolVersion::V2 => 2,
            ProtocolVersion::V3 => 3,
        }
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = VersionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 | 1 => Err(VersionError::LegacyMessage(value)),
            2 => Ok(ProtocolVersion::V2),
            3 => Ok(ProtocolVersion::V3),
            _ => Err(VersionError::InvalidVersion(value)),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", u8::from(*self))
    }
}

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("legacy message with unsupported version {0}")]
    LegacyMessage(u8),

    #[error("unknown message version {0}")]
    InvalidVersion(u8),
}
