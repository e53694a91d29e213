// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed-hash message authentication code (HMAC) with SHA256.
//!
//! <https://www.rfc-editor.org/rfc/rfc2104>
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

pub const HMAC_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Computes HMAC-SHA256 over the concatenation of all given messages.
pub fn hmac_sha256(key: &[u8], messages: &[&[u8]]) -> Result<[u8; HMAC_SIZE], HmacError> {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| HmacError::InvalidKeyLength)?;
    for message in messages {
        mac.update(message);
    }
    let mut out = [0u8; HMAC_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

#[derive(Debug, Error)]
pub enum HmacError {
    #[error("invalid hmac key length")]
    InvalidKeyLength,
}

#[cfg(test)]
mod tests {
    use super::hmac_sha256;

    #[test]
    fn rfc4231_test_case_2() {
        let mac = hmac_sha256(b"Jefe", &[b"what do ya want ", b"for nothing?"]).unwrap();
        assert_eq!(
            hex::encode(mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
