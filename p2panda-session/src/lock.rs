// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::address::ProtocolAddress;
use crate::error::SessionError;

/// Table of mutual-exclusion locks, one per remote device.
///
/// Builders and ciphers sharing the same table serialize every load-modify-store cycle of a
/// session record, while sessions with different devices proceed in parallel.
///
/// Entries are created on first use and never removed, the table holds one entry for every
/// remote device we ever had a session with.
#[derive(Clone, Debug, Default)]
pub struct SessionLocks {
    inner: Arc<Mutex<HashMap<ProtocolAddress, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock of the given address.
    pub(crate) fn with_lock<T, F>(&self, address: &ProtocolAddress, f: F) -> Result<T, SessionError>
    where
        F: FnOnce() -> Result<T, SessionError>,
    {
        let lock = {
            let mut table = self.inner.lock().map_err(|_| SessionError::LockPoisoned)?;
            table.entry(*address).or_default().clone()
        };
        let _guard = lock.lock().map_err(|_| SessionError::LockPoisoned)?;
        f()
    }
}
