// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

/// The default number of superseded session states kept per record.
pub const DEFAULT_ARCHIVED_STATES_MAX: usize = 40;

/// The default number of receiver chains kept per session state.
pub const DEFAULT_RECEIVER_CHAINS_MAX: usize = 5;

/// The default number of skipped message keys kept per receiver chain.
pub const DEFAULT_MESSAGE_KEYS_MAX: usize = 2000;

/// The default number of messages a received counter may be ahead of its chain.
pub const DEFAULT_FUTURE_MESSAGES_MAX: u32 = 2000;

/// Limits applied to the state kept for every session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of archived session states per record.
    ///
    /// When a new session gets installed and this limit is reached, the oldest archived state is
    /// dropped. Messages which could only be decrypted with that state are lost.
    pub archived_states_max: usize,

    /// Maximum number of receiver chains (one per remote ratchet key) per session state.
    pub receiver_chains_max: usize,

    /// Maximum number of stored message keys of skipped, not yet received messages per chain.
    pub message_keys_max: usize,

    /// Maximum distance between the expected and the received counter of a message.
    pub future_messages_max: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            archived_states_max: DEFAULT_ARCHIVED_STATES_MAX,
            receiver_chains_max: DEFAULT_RECEIVER_CHAINS_MAX,
            message_keys_max: DEFAULT_MESSAGE_KEYS_MAX,
            future_messages_max: DEFAULT_FUTURE_MESSAGES_MAX,
        }
    }
}
