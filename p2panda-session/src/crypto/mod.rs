// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic algorithms and secure random number generation used by sessions.
//!
//! Following algorithms are used:
//! * ChaCha random number generator with 20 rounds
//! * ECDH key agreement with X25519
//! * XEdDSA signatures over X25519 keys
//! * HKDF and HMAC with SHA256
//! * XChaCha20-Poly1305 AEAD
pub mod hkdf;
pub mod hmac;
mod rng;
mod secret;
pub mod sha2;
pub mod x25519;
pub mod xchacha20;
pub mod xeddsa;

pub use rng::{Rng, RngError};
pub use secret::Secret;
