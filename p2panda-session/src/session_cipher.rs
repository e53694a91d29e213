// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypts and decrypts messages of an established session.
//!
//! Every message is encrypted with its own message key. The sending chain advances with each
//! message and a new Diffie-Hellman ratchet step happens whenever the other party presents a new
//! ratchet key. Keys of skipped messages are kept (bounded) so messages can arrive out of order.
//!
//! Decryption tries the current session state first and falls back to archived states. State
//! changes are only committed if the message could be authenticated.
use tracing::{debug, trace};

use crate::address::ProtocolAddress;
use crate::config::SessionConfig;
use crate::crypto::Rng;
use crate::crypto::x25519::{KeyPair, PublicKey};
use crate::crypto::xchacha20::{x_aead_decrypt, x_aead_encrypt};
use crate::error::SessionError;
use crate::identity::IdentityKey;
use crate::lock::SessionLocks;
use crate::protocol::{CiphertextMessage, PreKeyMessage, ProtocolVersion, RatchetMessage};
use crate::ratchet::{ChainKey, MessageKeys};
use crate::session_builder::SessionBuilder;
use crate::state::{SessionRecord, SessionState};
use crate::traits::ProtocolStore;

/// Encrypts messages for and decrypts messages from one device of another party.
#[derive(Clone, Debug)]
pub struct SessionCipher<S> {
    builder: SessionBuilder<S>,
}

impl<S> SessionCipher<S>
where
    S: ProtocolStore,
{
    pub fn new(store: S, locks: SessionLocks, address: ProtocolAddress) -> Self {
        Self::from_builder(SessionBuilder::new(store, locks, address))
    }

    pub fn from_config(
        store: S,
        locks: SessionLocks,
        address: ProtocolAddress,
        config: SessionConfig,
    ) -> Self {
        Self::from_builder(SessionBuilder::from_config(store, locks, address, config))
    }

    pub fn from_builder(builder: SessionBuilder<S>) -> Self {
        Self { builder }
    }

    pub fn builder(&self) -> &SessionBuilder<S> {
        &self.builder
    }

    pub fn address(&self) -> &ProtocolAddress {
        self.builder.address()
    }

    /// Encrypts a message for the other party.
    ///
    /// Returns a pre-key message as long as the other party did not acknowledge the session by
    /// replying, a ratchet message afterwards.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<CiphertextMessage, SessionError> {
        self.with_lock(|| {
            let mut record = self.load_session()?;
            let state = record.session_state_mut();
            if state.is_fresh() {
                return Err(SessionError::NoSession(*self.address()));
            }

            let version = session_version(state)?;
            let chain_key = match state.sender_chain_key().cloned() {
                Some(chain_key) => chain_key,
                None => initialize_sender_chain(state, version)?,
            };
            let message_keys = chain_key.message_keys(version)?;

            let sender_ratchet_key = *state
                .sender_ratchet_key()
                .ok_or(SessionError::InvalidMessage("missing sender chain"))?;
            let (local_identity_key, remote_identity_key) = identity_keys(state)?;

            let aad = RatchetMessage::associated_data(
                version,
                &sender_ratchet_key,
                message_keys.counter(),
                state.previous_counter(),
                &local_identity_key,
                &remote_identity_key,
            );
            let ciphertext = x_aead_encrypt(
                message_keys.cipher_key(),
                plaintext,
                message_keys.nonce(),
                &aad,
            )?;
            let message = RatchetMessage::new(
                version,
                sender_ratchet_key,
                message_keys.counter(),
                state.previous_counter(),
                ciphertext,
            );

            let message = match state.unacknowledged_prekey_message() {
                Some(unacknowledged) => CiphertextMessage::PreKey(PreKeyMessage::new(
                    version,
                    state.local_registration_id(),
                    unacknowledged.prekey_id(),
                    unacknowledged.signed_prekey_id(),
                    *unacknowledged.base_key(),
                    local_identity_key,
                    message,
                )),
                None => CiphertextMessage::Ratchet(message),
            };

            state.set_sender_chain_key(chain_key.next()?);
            self.store_session(&record)?;

            trace!(
                address = %self.address(),
                counter = message_keys.counter(),
                "encrypted message"
            );
            Ok(message)
        })
    }

    /// Decrypts any kind of message the other party sent us.
    pub fn decrypt(
        &self,
        message: &CiphertextMessage,
        rng: &Rng,
    ) -> Result<Vec<u8>, SessionError> {
        match message {
            CiphertextMessage::PreKey(message) => self.decrypt_prekey_message(message, rng),
            CiphertextMessage::Ratchet(message) => self.decrypt_message(message, rng),
        }
    }

    /// Builds a session from the pre-key message if we do not know it yet and decrypts it.
    ///
    /// The one-time pre-key the message consumed is removed from the store once the message was
    /// decrypted successfully.
    pub fn decrypt_prekey_message(
        &self,
        message: &PreKeyMessage,
        rng: &Rng,
    ) -> Result<Vec<u8>, SessionError> {
        self.with_lock(|| {
            let store = self.builder.store();
            let mut record = self.load_session()?;

            let prekey_id = self
                .builder
                .build_from_prekey_message(&mut record, message)?;
            let plaintext = self.decrypt_with_record(&mut record, message.message(), rng)?;

            self.store_session(&record)?;
            store
                .save_identity(self.address().recipient_id(), message.identity_key())
                .map_err(SessionError::store)?;

            if let Some(prekey_id) = prekey_id {
                store.remove_prekey(prekey_id).map_err(SessionError::store)?;
                debug!(address = %self.address(), prekey_id, "removed consumed pre-key");
            }

            Ok(plaintext)
        })
    }

    /// Decrypts a message of an established session.
    pub fn decrypt_message(
        &self,
        message: &RatchetMessage,
        rng: &Rng,
    ) -> Result<Vec<u8>, SessionError> {
        self.with_lock(|| {
            let mut record = self.load_session()?;
            if record.is_fresh() {
                return Err(SessionError::NoSession(*self.address()));
            }

            let plaintext = self.decrypt_with_record(&mut record, message, rng)?;
            self.store_session(&record)?;
            Ok(plaintext)
        })
    }

    /// Registration id of the other party's device, taken from the current session.
    pub fn remote_registration_id(&self) -> Result<u32, SessionError> {
        self.with_lock(|| {
            let record = self.load_session()?;
            let state = record.session_state();
            if state.is_fresh() {
                return Err(SessionError::NoSession(*self.address()));
            }
            Ok(state.remote_registration_id())
        })
    }

    /// Protocol version of the current session.
    pub fn session_version(&self) -> Result<ProtocolVersion, SessionError> {
        self.with_lock(|| {
            let record = self.load_session()?;
            record
                .session_state()
                .session_version()
                .ok_or(SessionError::NoSession(*self.address()))
        })
    }

    fn decrypt_with_record(
        &self,
        record: &mut SessionRecord,
        message: &RatchetMessage,
        rng: &Rng,
    ) -> Result<Vec<u8>, SessionError> {
        // Work on copies so failed attempts leave no trace in the record.
        let mut state = record.session_state().clone();
        match self.decrypt_with_state(&mut state, message, rng) {
            Ok(plaintext) => {
                *record.session_state_mut() = state;
                return Ok(plaintext);
            }
            Err(err @ SessionError::DuplicateMessage(_)) => return Err(err),
            Err(err) => {
                trace!(address = %self.address(), %err, "current session state failed");
            }
        }

        let mut decrypted = None;
        for (index, archived) in record.archived_states().enumerate() {
            let mut state = archived.clone();
            match self.decrypt_with_state(&mut state, message, rng) {
                Ok(plaintext) => {
                    decrypted = Some((index, state, plaintext));
                    break;
                }
                Err(err @ SessionError::DuplicateMessage(_)) => return Err(err),
                Err(_) => continue,
            }
        }

        match decrypted {
            Some((index, state, plaintext)) => {
                debug!(
                    address = %self.address(),
                    index,
                    "decrypted with archived session state"
                );
                record.promote_archived_state(
                    index,
                    state,
                    self.builder.config().archived_states_max,
                );
                Ok(plaintext)
            }
            None => Err(SessionError::NoValidSessions),
        }
    }

    fn decrypt_with_state(
        &self,
        state: &mut SessionState,
        message: &RatchetMessage,
        rng: &Rng,
    ) -> Result<Vec<u8>, SessionError> {
        if state.is_fresh() {
            return Err(SessionError::InvalidMessage("uninitialized session state"));
        }

        let version = session_version(state)?;
        if message.message_version() != version {
            return Err(SessionError::InvalidMessage(
                "message version does not match session version",
            ));
        }

        let their_ratchet_key = message.sender_ratchet_key();
        let chain_key = self.receiver_chain_key(state, version, their_ratchet_key, rng)?;
        let message_keys = self.message_keys(
            state,
            version,
            their_ratchet_key,
            chain_key,
            message.counter(),
        )?;

        let (local_identity_key, remote_identity_key) = identity_keys(state)?;
        let aad = RatchetMessage::associated_data(
            version,
            their_ratchet_key,
            message.counter(),
            message.previous_counter(),
            &remote_identity_key,
            &local_identity_key,
        );
        let plaintext = x_aead_decrypt(
            message_keys.cipher_key(),
            message.ciphertext(),
            message_keys.nonce(),
            &aad,
        )?;

        // The other party replied, no need to send pre-key messages anymore.
        state.clear_unacknowledged_prekey_message();

        Ok(plaintext)
    }

    /// Returns the chain key for their ratchet key, performs a ratchet step if the key is new.
    fn receiver_chain_key(
        &self,
        state: &mut SessionState,
        version: ProtocolVersion,
        their_ratchet_key: &PublicKey,
        rng: &Rng,
    ) -> Result<ChainKey, SessionError> {
        if let Some(chain_key) = state.receiver_chain_key(their_ratchet_key) {
            return Ok(chain_key.clone());
        }

        let root_key = state
            .root_key()
            .ok_or(SessionError::InvalidMessage("missing root key"))?;
        let our_ratchet_key = state
            .sender_ratchet_key_pair()
            .ok_or(SessionError::InvalidMessage("missing sender chain"))?;
        let (root_key, receiver_chain_key) =
            root_key.create_chain(version, their_ratchet_key, our_ratchet_key)?;

        let our_new_ratchet_key = KeyPair::generate(rng)?;
        let (root_key, sender_chain_key) =
            root_key.create_chain(version, their_ratchet_key, &our_new_ratchet_key)?;

        let previous_counter = state
            .sender_chain_key()
            .map(|chain_key| chain_key.index().saturating_sub(1))
            .unwrap_or_default();

        state.set_root_key(root_key);
        state.add_receiver_chain(
            *their_ratchet_key,
            receiver_chain_key.clone(),
            self.builder.config().receiver_chains_max,
        );
        state.set_previous_counter(previous_counter);
        state.set_sender_chain(our_new_ratchet_key, Some(sender_chain_key));

        trace!(address = %self.address(), "ratchet step");
        Ok(receiver_chain_key)
    }

    /// Returns the message keys for `counter`, either kept from a skipped message or derived by
    /// advancing the chain.
    fn message_keys(
        &self,
        state: &mut SessionState,
        version: ProtocolVersion,
        their_ratchet_key: &PublicKey,
        chain_key: ChainKey,
        counter: u32,
    ) -> Result<MessageKeys, SessionError> {
        if chain_key.index() > counter {
            return state
                .remove_message_keys(their_ratchet_key, counter)
                .ok_or(SessionError::DuplicateMessage(counter));
        }

        let config = self.builder.config();
        if counter - chain_key.index() > config.future_messages_max {
            return Err(SessionError::InvalidMessage("message is too far in the future"));
        }

        let mut chain_key = chain_key;
        while chain_key.index() < counter {
            state.set_message_keys(
                their_ratchet_key,
                chain_key.message_keys(version)?,
                config.message_keys_max,
            );
            chain_key = chain_key.next()?;
        }

        let message_keys = chain_key.message_keys(version)?;
        state.set_receiver_chain_key(their_ratchet_key, chain_key.next()?);
        Ok(message_keys)
    }

    fn with_lock<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce() -> Result<T, SessionError>,
    {
        self.builder.locks().with_lock(self.address(), f)
    }

    fn load_session(&self) -> Result<SessionRecord, SessionError> {
        self.builder
            .store()
            .load_session(self.address())
            .map_err(SessionError::store)
    }

    fn store_session(&self, record: &SessionRecord) -> Result<(), SessionError> {
        self.builder
            .store()
            .store_session(self.address(), record)
            .map_err(SessionError::store)
    }
}

fn session_version(state: &SessionState) -> Result<ProtocolVersion, SessionError> {
    state
        .session_version()
        .ok_or(SessionError::InvalidMessage("missing session version"))
}

/// Returns our and their identity key of an established session.
fn identity_keys(state: &SessionState) -> Result<(IdentityKey, IdentityKey), SessionError> {
    let local = state
        .local_identity_key()
        .ok_or(SessionError::InvalidMessage("missing local identity key"))?;
    let remote = state
        .remote_identity_key()
        .ok_or(SessionError::InvalidMessage("missing remote identity key"))?;
    Ok((*local, *remote))
}

/// Derives our first sending chain from the root key, the initiator of a session does this when
/// sending its first message.
fn initialize_sender_chain(
    state: &mut SessionState,
    version: ProtocolVersion,
) -> Result<ChainKey, SessionError> {
    let their_ratchet_key = *state
        .latest_receiver_ratchet_key()
        .ok_or(SessionError::InvalidMessage("missing receiver chain"))?;
    let our_ratchet_key = state
        .sender_ratchet_key_pair()
        .ok_or(SessionError::InvalidMessage("missing sender chain"))?;
    let (root_key, chain_key) = state
        .root_key()
        .ok_or(SessionError::InvalidMessage("missing root key"))?
        .create_chain(version, &their_ratchet_key, our_ratchet_key)?;

    state.set_root_key(root_key);
    state.set_sender_chain_key(chain_key.clone());
    Ok(chain_key)
}
