// SPDX-License-Identifier: MIT OR Apache-2.0

//! Establishes sessions with a device of another party.
//!
//! Sessions can be built in three ways:
//!
//! 1. Asynchronously from a pre-key bundle the other party published. We take the role of the
//!    initiator ("Alice") and can encrypt messages right away.
//! 2. From a received pre-key message, the inverse of the former. We take the role of the
//!    responder ("Bob").
//! 3. Interactively by exchanging key exchange messages while both parties are online. Roles are
//!    assigned deterministically by comparing the base keys, so both parties arrive at the same
//!    session even if they initiated at the same time.
//!
//! All operations either commit a new session state together with the other party's identity or
//! leave the stores untouched.
use tracing::{debug, warn};

use crate::address::ProtocolAddress;
use crate::config::SessionConfig;
use crate::crypto::Rng;
use crate::crypto::x25519::KeyPair;
use crate::error::{KeyId, SessionError};
use crate::identity::IdentityKey;
use crate::key_bundle::{KeyBundleError, MAX_PREKEY_ID, PreKeyBundle, PreKeyId};
use crate::key_helper::generate_sequence;
use crate::lock::SessionLocks;
use crate::protocol::{KeyExchangeFlags, KeyExchangeMessage, PreKeyMessage, ProtocolVersion};
use crate::ratchet::{
    AliceParameters, BobParameters, SymmetricParameters, initialize_alice_session,
    initialize_bob_session, initialize_symmetric_session,
};
use crate::state::{PendingKeyExchange, SessionRecord};
use crate::traits::ProtocolStore;

/// Builds sessions with one device of another party.
#[derive(Clone, Debug)]
pub struct SessionBuilder<S> {
    store: S,
    locks: SessionLocks,
    address: ProtocolAddress,
    config: SessionConfig,
}

impl<S> SessionBuilder<S>
where
    S: ProtocolStore,
{
    pub fn new(store: S, locks: SessionLocks, address: ProtocolAddress) -> Self {
        Self::from_config(store, locks, address, SessionConfig::default())
    }

    pub fn from_config(
        store: S,
        locks: SessionLocks,
        address: ProtocolAddress,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            locks,
            address,
            config,
        }
    }

    pub fn address(&self) -> &ProtocolAddress {
        &self.address
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn locks(&self) -> &SessionLocks {
        &self.locks
    }

    /// Builds a new session from a pre-key bundle of the other party.
    ///
    /// Until the other party replies, all messages we encrypt for it are pre-key messages which
    /// allow it to build the same session on its end.
    pub fn process_prekey_bundle(
        &self,
        bundle: &PreKeyBundle,
        rng: &Rng,
    ) -> Result<(), SessionError> {
        self.locks.with_lock(&self.address, || {
            self.check_trust(bundle.identity_key())?;
            bundle.verify()?;

            // Version 2 bundles only carry an unsigned pre-key, it takes the place of the signed
            // one.
            let (version, their_signed_prekey, their_onetime_prekey) =
                match (bundle.signed_prekey(), bundle.prekey()) {
                    (Some(signed_prekey), prekey) => (
                        ProtocolVersion::V3,
                        signed_prekey.public_key,
                        prekey.map(|prekey| prekey.public_key),
                    ),
                    (None, Some(prekey)) => (ProtocolVersion::V2, prekey.public_key, None),
                    (None, None) => return Err(KeyBundleError::MissingPreKeys.into()),
                };

            let our_identity_key_pair = self
                .store
                .identity_key_pair()
                .map_err(SessionError::store)?;
            let local_registration_id = self
                .store
                .local_registration_id()
                .map_err(SessionError::store)?;
            let mut record = self
                .store
                .load_session(&self.address)
                .map_err(SessionError::store)?;

            let our_base_key = KeyPair::generate(rng)?;
            let our_ratchet_key = KeyPair::generate(rng)?;
            let base_key = *our_base_key.public_key();

            let parameters = AliceParameters::new(
                our_identity_key_pair,
                our_base_key,
                our_ratchet_key,
                *bundle.identity_key(),
                their_signed_prekey,
                their_signed_prekey,
                their_onetime_prekey,
            );
            let mut state = initialize_alice_session(version, &parameters)?;
            state.set_unacknowledged_prekey_message(
                bundle.prekey().map(|prekey| prekey.id),
                bundle.signed_prekey().map(|signed_prekey| signed_prekey.id),
                base_key,
            );
            state.set_registration_ids(local_registration_id, bundle.registration_id());
            state.set_alice_base_key(base_key);

            record.promote_state(state, self.config.archived_states_max);
            self.commit(&record, bundle.identity_key())?;

            debug!(address = %self.address, %version, "built session from pre-key bundle");
            Ok(())
        })
    }

    /// Builds a new session from a pre-key message the other party sent us.
    ///
    /// The stored record and the other party's identity are updated under the lock of this
    /// builder's address. Use [`SessionCipher::decrypt_prekey_message`] to also decrypt the
    /// embedded message in the same step.
    ///
    /// Returns the id of the one-time pre-key the message consumed, if any. Removing it from the
    /// pre-key store is left to the caller. The last-resort pre-key is never reported as it must
    /// not be removed. Messages for sessions we already know about do not change the record.
    ///
    /// [`SessionCipher::decrypt_prekey_message`]: crate::SessionCipher::decrypt_prekey_message
    pub fn process_prekey_message(
        &self,
        message: &PreKeyMessage,
    ) -> Result<Option<PreKeyId>, SessionError> {
        self.locks.with_lock(&self.address, || {
            let mut record = self
                .store
                .load_session(&self.address)
                .map_err(SessionError::store)?;
            let prekey_id = self.build_from_prekey_message(&mut record, message)?;
            self.commit(&record, message.identity_key())?;
            Ok(prekey_id)
        })
    }

    /// Installs the session of a pre-key message in `record` without storing it or the identity.
    ///
    /// Callers hold the lock of this builder's address.
    pub(crate) fn build_from_prekey_message(
        &self,
        record: &mut SessionRecord,
        message: &PreKeyMessage,
    ) -> Result<Option<PreKeyId>, SessionError> {
        self.check_trust(message.identity_key())?;

        match message.message_version() {
            ProtocolVersion::V3 => self.process_prekey_message_v3(record, message),
            ProtocolVersion::V2 => self.process_prekey_message_v2(record, message),
        }
    }

    fn process_prekey_message_v3(
        &self,
        record: &mut SessionRecord,
        message: &PreKeyMessage,
    ) -> Result<Option<PreKeyId>, SessionError> {
        if record.has_session_state(ProtocolVersion::V3, message.base_key()) {
            warn!(
                address = %self.address,
                base_key = %message.base_key(),
                "received pre-key message for known session"
            );
            return Ok(None);
        }

        let signed_prekey_id = message
            .signed_prekey_id()
            .ok_or(SessionError::InvalidKeyId(KeyId::Missing))?;
        let our_signed_prekey = self
            .store
            .load_signed_prekey(signed_prekey_id)
            .map_err(SessionError::store)?
            .ok_or(SessionError::InvalidKeyId(KeyId::SignedPreKey(
                signed_prekey_id,
            )))?;

        let our_onetime_prekey = match message.prekey_id() {
            Some(prekey_id) => {
                let prekey = self
                    .store
                    .load_prekey(prekey_id)
                    .map_err(SessionError::store)?
                    .ok_or(SessionError::InvalidKeyId(KeyId::PreKey(prekey_id)))?;
                Some(prekey.key_pair().clone())
            }
            None => None,
        };

        let parameters = BobParameters::new(
            self.store.identity_key_pair().map_err(SessionError::store)?,
            our_signed_prekey.key_pair().clone(),
            our_signed_prekey.key_pair().clone(),
            our_onetime_prekey,
            *message.identity_key(),
            *message.base_key(),
        );

        self.install_responder_session(ProtocolVersion::V3, record, message, &parameters)?;

        Ok(message.prekey_id().filter(|id| *id != MAX_PREKEY_ID))
    }

    fn process_prekey_message_v2(
        &self,
        record: &mut SessionRecord,
        message: &PreKeyMessage,
    ) -> Result<Option<PreKeyId>, SessionError> {
        let prekey_id = message
            .prekey_id()
            .ok_or(SessionError::InvalidKeyId(KeyId::Missing))?;

        // The pre-key is gone and we have a session already, this is a message of the session we
        // built when the pre-key was consumed.
        let contains_prekey = self
            .store
            .contains_prekey(prekey_id)
            .map_err(SessionError::store)?;
        let contains_session = self
            .store
            .contains_session(&self.address)
            .map_err(SessionError::store)?;
        if !contains_prekey && contains_session {
            warn!(
                address = %self.address,
                prekey_id,
                "received pre-key message for consumed pre-key"
            );
            return Ok(None);
        }

        let our_prekey = self
            .store
            .load_prekey(prekey_id)
            .map_err(SessionError::store)?
            .ok_or(SessionError::InvalidKeyId(KeyId::PreKey(prekey_id)))?;

        let parameters = BobParameters::new(
            self.store.identity_key_pair().map_err(SessionError::store)?,
            our_prekey.key_pair().clone(),
            our_prekey.key_pair().clone(),
            None,
            *message.identity_key(),
            *message.base_key(),
        );

        self.install_responder_session(ProtocolVersion::V2, record, message, &parameters)?;

        Ok((prekey_id != MAX_PREKEY_ID).then_some(prekey_id))
    }

    fn install_responder_session(
        &self,
        version: ProtocolVersion,
        record: &mut SessionRecord,
        message: &PreKeyMessage,
        parameters: &BobParameters,
    ) -> Result<(), SessionError> {
        let local_registration_id = self
            .store
            .local_registration_id()
            .map_err(SessionError::store)?;

        let mut state = initialize_bob_session(version, parameters)?;
        state.set_registration_ids(local_registration_id, message.registration_id());
        state.set_alice_base_key(*message.base_key());
        record.promote_state(state, self.config.archived_states_max);

        debug!(address = %self.address, %version, "built session from pre-key message");
        Ok(())
    }

    /// Starts an interactive key exchange with the other party.
    ///
    /// The key material is kept as pending key exchange in the current session state until the
    /// response arrives.
    pub fn initiate(&self, rng: &Rng) -> Result<KeyExchangeMessage, SessionError> {
        self.locks.with_lock(&self.address, || {
            let identity_key_pair = self
                .store
                .identity_key_pair()
                .map_err(SessionError::store)?;
            let sequence = generate_sequence(rng)?;
            let base_key = KeyPair::generate(rng)?;
            let ratchet_key = KeyPair::generate(rng)?;
            let base_key_signature =
                identity_key_pair.sign(base_key.public_key().as_bytes(), rng)?;

            let message = KeyExchangeMessage::new(
                ProtocolVersion::V2,
                sequence,
                KeyExchangeFlags::INITIATE,
                *base_key.public_key(),
                Some(base_key_signature),
                *ratchet_key.public_key(),
                *identity_key_pair.identity_key(),
            );

            let mut record = self
                .store
                .load_session(&self.address)
                .map_err(SessionError::store)?;
            record
                .session_state_mut()
                .set_pending_key_exchange(PendingKeyExchange::new(
                    sequence,
                    base_key,
                    ratchet_key,
                    identity_key_pair,
                ));
            self.store
                .store_session(&self.address, &record)
                .map_err(SessionError::store)?;

            debug!(address = %self.address, sequence, "initiated key exchange");
            Ok(message)
        })
    }

    /// Handles a message of the interactive key exchange.
    ///
    /// Returns the response to send back if the message initiated a key exchange. Responses
    /// complete our own pending key exchange and return nothing.
    pub fn process_key_exchange_message(
        &self,
        message: &KeyExchangeMessage,
        rng: &Rng,
    ) -> Result<Option<KeyExchangeMessage>, SessionError> {
        self.locks.with_lock(&self.address, || {
            self.check_trust(message.identity_key())?;

            if message.is_initiate() {
                self.process_initiate(message, rng).map(Some)
            } else {
                self.process_response(message)?;
                Ok(None)
            }
        })
    }

    fn process_initiate(
        &self,
        message: &KeyExchangeMessage,
        rng: &Rng,
    ) -> Result<KeyExchangeMessage, SessionError> {
        if message.version() >= ProtocolVersion::V3 {
            message.verify_base_key_signature()?;
        }

        let mut record = self
            .store
            .load_session(&self.address)
            .map_err(SessionError::store)?;

        // Both parties initiated at the same time. We answer with the key material we sent in our
        // own initiate message so both sides derive the same session.
        let pending = record.session_state().pending_key_exchange().cloned();
        let (flags, parameters) = match &pending {
            Some(pending) => (
                KeyExchangeFlags::RESPONSE | KeyExchangeFlags::SIMULTANEOUS_INITIATE,
                SymmetricParameters::new(
                    pending.identity_key_pair().clone(),
                    pending.base_key().clone(),
                    pending.ratchet_key().clone(),
                    *message.identity_key(),
                    *message.base_key(),
                    *message.ratchet_key(),
                )?,
            ),
            None => (
                KeyExchangeFlags::RESPONSE,
                SymmetricParameters::new(
                    self.store.identity_key_pair().map_err(SessionError::store)?,
                    KeyPair::generate(rng)?,
                    KeyPair::generate(rng)?,
                    *message.identity_key(),
                    *message.base_key(),
                    *message.ratchet_key(),
                )?,
            ),
        };

        let version = ProtocolVersion::negotiate(message.max_version())?;
        let our_base_key = *parameters.our_base_key().public_key();
        let our_ratchet_key = *parameters.our_ratchet_key().public_key();
        let our_identity_key = *parameters.our_identity_key_pair().identity_key();
        let base_key_signature = parameters
            .our_identity_key_pair()
            .sign(our_base_key.as_bytes(), rng)?;

        let mut state = initialize_symmetric_session(version, parameters)?;
        // Our own initiate is still unanswered. Its response completes the exchange with the
        // same key material, no matter in which order the messages arrive.
        if let Some(pending) = pending {
            state.set_pending_key_exchange(pending);
        }
        record.promote_state(state, self.config.archived_states_max);
        self.commit(&record, message.identity_key())?;

        debug!(
            address = %self.address,
            %version,
            sequence = message.sequence(),
            simultaneous = flags.contains(KeyExchangeFlags::SIMULTANEOUS_INITIATE),
            "built session from key exchange initiate"
        );

        Ok(KeyExchangeMessage::new(
            version,
            message.sequence(),
            flags,
            our_base_key,
            Some(base_key_signature),
            our_ratchet_key,
            our_identity_key,
        ))
    }

    fn process_response(&self, message: &KeyExchangeMessage) -> Result<(), SessionError> {
        let mut record = self
            .store
            .load_session(&self.address)
            .map_err(SessionError::store)?;

        let pending = match record.session_state().pending_key_exchange() {
            Some(pending) if pending.sequence() == message.sequence() => pending.clone(),
            _ => {
                warn!(
                    address = %self.address,
                    sequence = message.sequence(),
                    "received key exchange response without matching pending key exchange"
                );

                // Our own response to their simultaneous initiate already built the session.
                if message.is_response_for_simultaneous_initiate() {
                    return Ok(());
                }

                return Err(SessionError::StaleKeyExchange);
            }
        };

        let version = ProtocolVersion::negotiate(message.max_version())?;
        if version >= ProtocolVersion::V3 {
            message.verify_base_key_signature()?;
        }

        let parameters = SymmetricParameters::new(
            pending.identity_key_pair().clone(),
            pending.base_key().clone(),
            pending.ratchet_key().clone(),
            *message.identity_key(),
            *message.base_key(),
            *message.ratchet_key(),
        )?;
        let state = initialize_symmetric_session(version, parameters)?;
        record.promote_state(state, self.config.archived_states_max);
        self.commit(&record, message.identity_key())?;

        debug!(
            address = %self.address,
            %version,
            sequence = message.sequence(),
            "built session from key exchange response"
        );
        Ok(())
    }

    fn check_trust(&self, identity_key: &IdentityKey) -> Result<(), SessionError> {
        let trusted = self
            .store
            .is_trusted_identity(self.address.recipient_id(), identity_key)
            .map_err(SessionError::store)?;
        if !trusted {
            warn!(address = %self.address, %identity_key, "untrusted identity key");
            return Err(SessionError::UntrustedIdentity(self.address));
        }
        Ok(())
    }

    fn commit(
        &self,
        record: &SessionRecord,
        identity_key: &IdentityKey,
    ) -> Result<(), SessionError> {
        self.store
            .store_session(&self.address, record)
            .map_err(SessionError::store)?;
        self.store
            .save_identity(self.address.recipient_id(), identity_key)
            .map_err(SessionError::store)?;
        Ok(())
    }
}
