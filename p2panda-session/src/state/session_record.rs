// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cbor::{decode_cbor, encode_cbor};
use crate::crypto::x25519::PublicKey;
use crate::error::SessionError;
use crate::protocol::ProtocolVersion;
use crate::state::SessionState;

/// All session states we keep for one device of the other party.
///
/// The record holds the current state and a bounded history of archived states, most recent
/// first. Archived states are only consulted to decrypt messages which were in flight while a new
/// session was installed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    current: SessionState,
    archived: VecDeque<SessionState>,
}

impl SessionRecord {
    /// Returns a fresh record without any session.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: SessionState) -> Self {
        Self {
            current: state,
            archived: VecDeque::new(),
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.current.is_fresh() && self.archived.is_empty()
    }

    pub fn session_state(&self) -> &SessionState {
        &self.current
    }

    pub(crate) fn session_state_mut(&mut self) -> &mut SessionState {
        &mut self.current
    }

    /// Archived states, most recent first.
    pub fn archived_states(&self) -> impl Iterator<Item = &SessionState> {
        self.archived.iter()
    }

    /// Returns true if the current or an archived state was established with the given base key
    /// and version.
    pub fn has_session_state(&self, version: ProtocolVersion, alice_base_key: &PublicKey) -> bool {
        std::iter::once(&self.current)
            .chain(self.archived.iter())
            .any(|state| {
                state.session_version() == Some(version)
                    && state.alice_base_key() == Some(alice_base_key)
            })
    }

    /// Installs a new current state.
    ///
    /// The previous current state is archived unless it is fresh. Archived states beyond
    /// `archived_states_max` are evicted, oldest first.
    pub(crate) fn promote_state(&mut self, state: SessionState, archived_states_max: usize) {
        let previous = std::mem::replace(&mut self.current, state);
        if previous.is_fresh() {
            return;
        }

        self.archived.push_front(previous);
        while self.archived.len() > archived_states_max {
            debug!("evict oldest archived session state");
            self.archived.pop_back();
        }
    }

    /// Replaces the archived state at `index` with `state` and makes it the current one.
    pub(crate) fn promote_archived_state(
        &mut self,
        index: usize,
        state: SessionState,
        archived_states_max: usize,
    ) {
        self.archived.remove(index);
        self.promote_state(state, archived_states_max);
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SessionError> {
        Ok(encode_cbor(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SessionError> {
        Ok(decode_cbor(bytes)?)
    }
}
