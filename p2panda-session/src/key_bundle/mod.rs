// SPDX-License-Identifier: MIT OR Apache-2.0

//! Public pre-keys of peers and our own pre-key secrets.
//!
//! A peer publishes a [`PreKeyBundle`] so others can establish a session without the peer being
//! online. The bundle carries a medium-lived signed pre-key, optionally a one-time pre-key which
//! is consumed on first use, or both.
#[allow(clippy::module_inception)]
mod key_bundle;
mod prekey;

pub use key_bundle::{KeyBundleError, OneTimePreKey, PreKeyBundle, SignedPreKey};
pub use prekey::{
    MAX_PREKEY_ID, PreKeyId, PreKeyRecord, SignedPreKeyId, SignedPreKeyRecord, Timestamp,
};
