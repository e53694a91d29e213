// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted state of sessions.
mod session_record;
mod session_state;

pub use session_record::SessionRecord;
pub use session_state::{
    PendingKeyExchange, ReceiverChain, SenderChain, SessionState, UnacknowledgedPreKeyMessage,
};
