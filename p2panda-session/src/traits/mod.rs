// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces to persist sessions, identities and pre-keys.
//!
//! Store calls are synchronous. The session builder and cipher serialize access per address, see
//! [`SessionLocks`](crate::SessionLocks), implementations do not need to guard against
//! concurrent modifications of the same record.
mod store;

pub use store::{IdentityKeyStore, PreKeyStore, ProtocolStore, SessionStore, SignedPreKeyStore};
