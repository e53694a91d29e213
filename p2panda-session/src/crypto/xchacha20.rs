// SPDX-License-Identifier: MIT OR Apache-2.0

//! XChaCha20Poly1305 is a ChaCha20Poly1305 AEAD variant with an extended 192-bit (24-byte) nonce.
//!
//! Every message key is used exactly once, key and nonce are both derived from the chain key of
//! the sending chain.
use chacha20poly1305::{AeadInPlace, Key, KeyInit, XChaCha20Poly1305, XNonce};
use thiserror::Error;

pub const XAEAD_KEY_SIZE: usize = 32;

pub const XAEAD_NONCE_SIZE: usize = 24;

pub type XAeadNonce = [u8; XAEAD_NONCE_SIZE];

pub type XAeadKey = [u8; XAEAD_KEY_SIZE];

pub fn x_aead_encrypt(
    key: &XAeadKey,
    plaintext: &[u8],
    nonce: &XAeadNonce,
    aad: &[u8],
) -> Result<Vec<u8>, XAeadError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let mut ciphertext = Vec::from(plaintext);
    cipher
        .encrypt_in_place(XNonce::from_slice(nonce), aad, &mut ciphertext)
        .map_err(XAeadError::Encrypt)?;
    Ok(ciphertext)
}

pub fn x_aead_decrypt(
    key: &XAeadKey,
    ciphertext_tag: &[u8],
    nonce: &XAeadNonce,
    aad: &[u8],
) -> Result<Vec<u8>, XAeadError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let mut plaintext = Vec::from(ciphertext_tag);
    cipher
        .decrypt_in_place(XNonce::from_slice(nonce), aad, &mut plaintext)
        .map_err(XAeadError::Decrypt)?;
    Ok(plaintext)
}

#[derive(Debug, Error)]
pub enum XAeadError {
    #[error("could not encrypt with xchacha20poly1305 aead: {0}")]
    Encrypt(chacha20poly1305::Error),

    #[error("could not decrypt with xchacha20poly1305 aead: {0}")]
    Decrypt(chacha20poly1305::Error),
}
