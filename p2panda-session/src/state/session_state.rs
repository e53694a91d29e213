// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::crypto::x25519::{KeyPair, PublicKey};
use crate::identity::{IdentityKey, IdentityKeyPair};
use crate::key_bundle::{PreKeyId, SignedPreKeyId};
use crate::protocol::ProtocolVersion;
use crate::ratchet::{ChainKey, MessageKeys, RootKey};

/// Our current ratchet key pair and the chain key derived for it.
///
/// The initiator of a session learns the chain key only when sending the first message, until
/// then only the ratchet key pair is known.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderChain {
    ratchet_key: KeyPair,
    chain_key: Option<ChainKey>,
}

/// Chain of one remote ratchet key with the keys of skipped messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverChain {
    ratchet_key: PublicKey,
    chain_key: ChainKey,
    message_keys: VecDeque<MessageKeys>,
}

/// Key material of an outstanding interactive key exchange we initiated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingKeyExchange {
    sequence: u32,
    base_key: KeyPair,
    ratchet_key: KeyPair,
    identity_key_pair: IdentityKeyPair,
}

impl PendingKeyExchange {
    pub fn new(
        sequence: u32,
        base_key: KeyPair,
        ratchet_key: KeyPair,
        identity_key_pair: IdentityKeyPair,
    ) -> Self {
        Self {
            sequence,
            base_key,
            ratchet_key,
            identity_key_pair,
        }
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn base_key(&self) -> &KeyPair {
        &self.base_key
    }

    pub fn ratchet_key(&self) -> &KeyPair {
        &self.ratchet_key
    }

    pub fn identity_key_pair(&self) -> &IdentityKeyPair {
        &self.identity_key_pair
    }
}

/// Pre-keys of the other party we used to initiate a session and which they did not confirm yet.
///
/// As long as this is set, outgoing messages are sent as pre-key messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnacknowledgedPreKeyMessage {
    prekey_id: Option<PreKeyId>,
    signed_prekey_id: Option<SignedPreKeyId>,
    base_key: PublicKey,
}

impl UnacknowledgedPreKeyMessage {
    pub fn prekey_id(&self) -> Option<PreKeyId> {
        self.prekey_id
    }

    pub fn signed_prekey_id(&self) -> Option<SignedPreKeyId> {
        self.signed_prekey_id
    }

    pub fn base_key(&self) -> &PublicKey {
        &self.base_key
    }
}

/// Ratchet state of one session between us and a device of the other party.
///
/// A state is either fresh, without any key material, or established and holding a root key. A
/// fresh state can still carry a pending interactive key exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    session_version: Option<ProtocolVersion>,
    local_registration_id: u32,
    remote_registration_id: u32,
    local_identity_key: Option<IdentityKey>,
    remote_identity_key: Option<IdentityKey>,
    root_key: Option<RootKey>,
    sender_chain: Option<SenderChain>,
    receiver_chains: VecDeque<ReceiverChain>,
    previous_counter: u32,
    alice_base_key: Option<PublicKey>,
    pending_key_exchange: Option<PendingKeyExchange>,
    unacknowledged_prekey_message: Option<UnacknowledgedPreKeyMessage>,
}

impl SessionState {
    /// Returns a fresh state without key material.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn initialized(
        version: ProtocolVersion,
        local_identity_key: IdentityKey,
        remote_identity_key: IdentityKey,
        root_key: RootKey,
    ) -> Self {
        Self {
            session_version: Some(version),
            local_identity_key: Some(local_identity_key),
            remote_identity_key: Some(remote_identity_key),
            root_key: Some(root_key),
            ..Default::default()
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.root_key.is_none()
    }

    /// Version of an established session, fresh states have none.
    pub fn session_version(&self) -> Option<ProtocolVersion> {
        self.session_version
    }

    pub fn local_registration_id(&self) -> u32 {
        self.local_registration_id
    }

    pub fn remote_registration_id(&self) -> u32 {
        self.remote_registration_id
    }

    pub(crate) fn set_registration_ids(&mut self, local: u32, remote: u32) {
        self.local_registration_id = local;
        self.remote_registration_id = remote;
    }

    pub fn local_identity_key(&self) -> Option<&IdentityKey> {
        self.local_identity_key.as_ref()
    }

    pub fn remote_identity_key(&self) -> Option<&IdentityKey> {
        self.remote_identity_key.as_ref()
    }

    pub fn root_key(&self) -> Option<&RootKey> {
        self.root_key.as_ref()
    }

    pub(crate) fn set_root_key(&mut self, root_key: RootKey) {
        self.root_key = Some(root_key);
    }

    /// Base key the initiator of this session used.
    pub fn alice_base_key(&self) -> Option<&PublicKey> {
        self.alice_base_key.as_ref()
    }

    pub(crate) fn set_alice_base_key(&mut self, base_key: PublicKey) {
        self.alice_base_key = Some(base_key);
    }

    pub fn previous_counter(&self) -> u32 {
        self.previous_counter
    }

    pub(crate) fn set_previous_counter(&mut self, previous_counter: u32) {
        self.previous_counter = previous_counter;
    }

    pub(crate) fn sender_ratchet_key_pair(&self) -> Option<&KeyPair> {
        self.sender_chain.as_ref().map(|chain| &chain.ratchet_key)
    }

    pub fn sender_ratchet_key(&self) -> Option<&PublicKey> {
        self.sender_ratchet_key_pair().map(|key_pair| key_pair.public_key())
    }

    pub fn sender_chain_key(&self) -> Option<&ChainKey> {
        self.sender_chain
            .as_ref()
            .and_then(|chain| chain.chain_key.as_ref())
    }

    pub(crate) fn set_sender_chain(&mut self, ratchet_key: KeyPair, chain_key: Option<ChainKey>) {
        self.sender_chain = Some(SenderChain {
            ratchet_key,
            chain_key,
        });
    }

    pub(crate) fn set_sender_chain_key(&mut self, chain_key: ChainKey) {
        if let Some(chain) = self.sender_chain.as_mut() {
            chain.chain_key = Some(chain_key);
        }
    }

    pub fn receiver_chain_key(&self, their_ratchet_key: &PublicKey) -> Option<&ChainKey> {
        self.receiver_chain(their_ratchet_key)
            .map(|chain| &chain.chain_key)
    }

    /// Ratchet key of the most recently added receiver chain.
    pub(crate) fn latest_receiver_ratchet_key(&self) -> Option<&PublicKey> {
        self.receiver_chains.back().map(|chain| &chain.ratchet_key)
    }

    /// Adds a chain for a new remote ratchet key, dropping the oldest chains beyond `max`.
    pub(crate) fn add_receiver_chain(
        &mut self,
        their_ratchet_key: PublicKey,
        chain_key: ChainKey,
        max: usize,
    ) {
        self.receiver_chains.push_back(ReceiverChain {
            ratchet_key: their_ratchet_key,
            chain_key,
            message_keys: VecDeque::new(),
        });
        while self.receiver_chains.len() > max.max(1) {
            self.receiver_chains.pop_front();
        }
    }

    pub(crate) fn set_receiver_chain_key(
        &mut self,
        their_ratchet_key: &PublicKey,
        chain_key: ChainKey,
    ) {
        if let Some(chain) = self.receiver_chain_mut(their_ratchet_key) {
            chain.chain_key = chain_key;
        }
    }

    /// Keeps the keys of a skipped message, dropping the oldest keys beyond `max`.
    pub(crate) fn set_message_keys(
        &mut self,
        their_ratchet_key: &PublicKey,
        message_keys: MessageKeys,
        max: usize,
    ) {
        if let Some(chain) = self.receiver_chain_mut(their_ratchet_key) {
            chain.message_keys.push_back(message_keys);
            while chain.message_keys.len() > max {
                chain.message_keys.pop_front();
            }
        }
    }

    /// Removes and returns the stored keys of a skipped message.
    pub(crate) fn remove_message_keys(
        &mut self,
        their_ratchet_key: &PublicKey,
        counter: u32,
    ) -> Option<MessageKeys> {
        let chain = self.receiver_chain_mut(their_ratchet_key)?;
        let index = chain
            .message_keys
            .iter()
            .position(|keys| keys.counter() == counter)?;
        chain.message_keys.remove(index)
    }

    pub fn has_pending_key_exchange(&self) -> bool {
        self.pending_key_exchange.is_some()
    }

    pub fn pending_key_exchange(&self) -> Option<&PendingKeyExchange> {
        self.pending_key_exchange.as_ref()
    }

    pub(crate) fn set_pending_key_exchange(&mut self, pending: PendingKeyExchange) {
        self.pending_key_exchange = Some(pending);
    }

    pub fn unacknowledged_prekey_message(&self) -> Option<&UnacknowledgedPreKeyMessage> {
        self.unacknowledged_prekey_message.as_ref()
    }

    pub(crate) fn set_unacknowledged_prekey_message(
        &mut self,
        prekey_id: Option<PreKeyId>,
        signed_prekey_id: Option<SignedPreKeyId>,
        base_key: PublicKey,
    ) {
        self.unacknowledged_prekey_message = Some(UnacknowledgedPreKeyMessage {
            prekey_id,
            signed_prekey_id,
            base_key,
        });
    }

    pub(crate) fn clear_unacknowledged_prekey_message(&mut self) {
        self.unacknowledged_prekey_message = None;
    }

    fn receiver_chain(&self, their_ratchet_key: &PublicKey) -> Option<&ReceiverChain> {
        self.receiver_chains
            .iter()
            .find(|chain| &chain.ratchet_key == their_ratchet_key)
    }

    fn receiver_chain_mut(&mut self, their_ratchet_key: &PublicKey) -> Option<&mut ReceiverChain> {
        self.receiver_chains
            .iter_mut()
            .find(|chain| &chain.ratchet_key == their_ratchet_key)
    }
}
