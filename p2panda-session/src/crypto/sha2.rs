// SPDX-License-Identifier: MIT OR Apache-2.0

//! SHA2 hashing functions.
use sha2::{Digest, Sha512};

pub const SHA512_DIGEST_SIZE: usize = 64;

/// SHA2-512 hashing function over the concatenation of all given messages.
pub fn sha2_512(messages: &[&[u8]]) -> [u8; SHA512_DIGEST_SIZE] {
    let mut hasher = Sha512::new();
    for message in messages {
        hasher.update(message);
    }
    let mut digest = [0u8; SHA512_DIGEST_SIZE];
    digest.copy_from_slice(&hasher.finalize());
    digest
}
