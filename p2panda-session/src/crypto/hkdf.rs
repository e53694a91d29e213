// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hashed Message Authentication Code (HMAC)-based key derivation function (HKDF) using
//! "hash-mode" with SHA256.
//!
//! Sessions of protocol version 3 use HKDF exactly as specified in RFC 5869. Sessions of protocol
//! version 2 use a legacy variant which starts the expand-step counter at `0` instead of `1`. Both
//! variants produce different output for the same input and can not be interchanged.
//!
//! <https://www.rfc-editor.org/rfc/rfc5869>
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::hmac::{HMAC_SIZE, HmacError, hmac_sha256};

/// RFC 5869 HKDF.
pub fn hkdf<const N: usize>(
    salt: &[u8],
    ikm: &[u8],
    info: Option<&[u8]>,
) -> Result<[u8; N], HkdfError> {
    let salt = if salt.is_empty() { None } else { Some(salt) };
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; N];
    hk.expand(info.unwrap_or_default(), &mut okm)
        .map_err(|_| HkdfError::InvalidArguments)?;
    Ok(okm)
}

/// Legacy HKDF variant with an expand-step counter starting at `0`.
pub fn hkdf_v2<const N: usize>(
    salt: &[u8],
    ikm: &[u8],
    info: Option<&[u8]>,
) -> Result<[u8; N], HkdfError> {
    // An empty salt is treated like a zero-filled one with the length of the hash output.
    let zero_salt = [0u8; HMAC_SIZE];
    let salt = if salt.is_empty() { &zero_salt[..] } else { salt };
    let prk = Zeroizing::new(hmac_sha256(salt, &[ikm])?);

    let info = info.unwrap_or_default();
    let mut okm = [0u8; N];
    let mut mixin = Zeroizing::new(Vec::with_capacity(HMAC_SIZE));
    let mut counter = 0u8;

    for chunk in okm.chunks_mut(HMAC_SIZE) {
        let step = Zeroizing::new(hmac_sha256(&prk[..], &[mixin.as_slice(), info, &[counter]])?);
        chunk.copy_from_slice(&step[..chunk.len()]);
        mixin.clear();
        mixin.extend_from_slice(&step[..]);
        counter = counter
            .checked_add(1)
            .ok_or(HkdfError::InvalidArguments)?;
    }

    Ok(okm)
}

#[derive(Debug, Error)]
pub enum HkdfError {
    #[error("arguments too large for hkdf")]
    InvalidArguments,

    #[error(transparent)]
    Hmac(#[from] HmacError),
}
