// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic derivation of the initial session state from the key material of both parties.
//!
//! Both parties concatenate the same Diffie-Hellman outputs in the same order (the "master
//! secret") and derive the first root key and chain key from it:
//!
//! ```text
//! master_secret = [0xFF; 32]                        (version 3 only)
//!              || DH(IK_A, SPK_B)
//!              || DH(EK_A, IK_B)
//!              || DH(EK_A, SPK_B)
//!              || DH(EK_A, OPK_B)                   (version 3 only, if present)
//!
//! root_key || chain_key = HKDF(salt = 0x00 * 32, master_secret, "WhisperText")
//! ```
//!
//! Both parties store the same root key. The chain key becomes the sending chain of the
//! responder, keyed by its ratchet key, and the receiving chain of the initiator. The initiator
//! derives its own sending chain from the root key when sending the first message.
mod keys;
mod parameters;

use tracing::trace;
use zeroize::Zeroizing;

pub use keys::{ChainKey, MessageKeys, RootKey};
pub(crate) use keys::derive_initial_keys;
pub use parameters::{AliceParameters, BobParameters, ParametersError, SymmetricParameters};

use crate::crypto::x25519::X25519Error;
use crate::error::SessionError;
use crate::protocol::ProtocolVersion;
use crate::state::SessionState;

const DISCONTINUITY_BYTES: [u8; 32] = [0xFF; 32];

/// Concatenated Diffie-Hellman outputs from the initiator's view.
pub(crate) fn alice_master_secret(
    version: ProtocolVersion,
    parameters: &AliceParameters,
) -> Result<Zeroizing<Vec<u8>>, X25519Error> {
    let mut secret = Zeroizing::new(Vec::with_capacity(32 * 5));

    if version >= ProtocolVersion::V3 {
        secret.extend_from_slice(&DISCONTINUITY_BYTES);
    }

    secret.extend_from_slice(
        &parameters
            .our_identity_key_pair
            .calculate_agreement(&parameters.their_signed_prekey)?,
    );
    secret.extend_from_slice(
        &parameters
            .our_base_key
            .calculate_agreement(parameters.their_identity_key.public_key())?,
    );
    secret.extend_from_slice(
        &parameters
            .our_base_key
            .calculate_agreement(&parameters.their_signed_prekey)?,
    );

    if version >= ProtocolVersion::V3 {
        if let Some(onetime_prekey) = &parameters.their_onetime_prekey {
            secret
                .extend_from_slice(&parameters.our_base_key.calculate_agreement(onetime_prekey)?);
        }
    }

    Ok(secret)
}

/// Concatenated Diffie-Hellman outputs from the responder's view.
pub(crate) fn bob_master_secret(
    version: ProtocolVersion,
    parameters: &BobParameters,
) -> Result<Zeroizing<Vec<u8>>, X25519Error> {
    let mut secret = Zeroizing::new(Vec::with_capacity(32 * 5));

    if version >= ProtocolVersion::V3 {
        secret.extend_from_slice(&DISCONTINUITY_BYTES);
    }

    secret.extend_from_slice(
        &parameters
            .our_signed_prekey
            .calculate_agreement(parameters.their_identity_key.public_key())?,
    );
    secret.extend_from_slice(
        &parameters
            .our_identity_key_pair
            .calculate_agreement(&parameters.their_base_key)?,
    );
    secret.extend_from_slice(
        &parameters
            .our_signed_prekey
            .calculate_agreement(&parameters.their_base_key)?,
    );

    if version >= ProtocolVersion::V3 {
        if let Some(onetime_prekey) = &parameters.our_onetime_prekey {
            secret.extend_from_slice(
                &onetime_prekey.calculate_agreement(&parameters.their_base_key)?,
            );
        }
    }

    Ok(secret)
}

/// Derives the session state of the initiator.
pub fn initialize_alice_session(
    version: ProtocolVersion,
    parameters: &AliceParameters,
) -> Result<SessionState, SessionError> {
    let master_secret = alice_master_secret(version, parameters)?;
    let (root_key, chain_key) = derive_initial_keys(version, &master_secret)?;

    let mut state = SessionState::initialized(
        version,
        *parameters.our_identity_key_pair.identity_key(),
        parameters.their_identity_key,
        root_key,
    );
    state.add_receiver_chain(parameters.their_ratchet_key, chain_key, 1);
    state.set_sender_chain(parameters.our_ratchet_key.clone(), None);

    trace!(%version, "initialized session as initiator");
    Ok(state)
}

/// Derives the session state of the responder.
pub fn initialize_bob_session(
    version: ProtocolVersion,
    parameters: &BobParameters,
) -> Result<SessionState, SessionError> {
    let master_secret = bob_master_secret(version, parameters)?;
    let (root_key, chain_key) = derive_initial_keys(version, &master_secret)?;

    let mut state = SessionState::initialized(
        version,
        *parameters.our_identity_key_pair.identity_key(),
        parameters.their_identity_key,
        root_key,
    );
    state.set_sender_chain(parameters.our_ratchet_key.clone(), Some(chain_key));

    trace!(%version, "initialized session as responder");
    Ok(state)
}

/// Derives the session state of either party of the interactive key exchange.
///
/// Both parties arrive at the same state no matter who initiated, roles are assigned by comparing
/// the base keys.
pub fn initialize_symmetric_session(
    version: ProtocolVersion,
    parameters: SymmetricParameters,
) -> Result<SessionState, SessionError> {
    if parameters.is_alice() {
        initialize_alice_session(version, &parameters.into())
    } else {
        initialize_bob_session(version, &parameters.into())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::crypto::Rng;
    use crate::crypto::x25519::KeyPair;
    use crate::identity::IdentityKeyPair;
    use crate::protocol::ProtocolVersion;

    use super::{
        AliceParameters, BobParameters, SymmetricParameters, alice_master_secret,
        bob_master_secret, initialize_alice_session, initialize_bob_session,
        initialize_symmetric_session,
    };

    fn parameters(rng: &Rng, with_onetime_prekey: bool) -> (AliceParameters, BobParameters) {
        let alice_identity = IdentityKeyPair::generate(rng).unwrap();
        let alice_base_key = KeyPair::generate(rng).unwrap();
        let alice_ratchet_key = KeyPair::generate(rng).unwrap();

        let bob_identity = IdentityKeyPair::generate(rng).unwrap();
        let bob_signed_prekey = KeyPair::generate(rng).unwrap();
        let bob_onetime_prekey = KeyPair::generate(rng).unwrap();

        let alice = AliceParameters::new(
            alice_identity.clone(),
            alice_base_key.clone(),
            alice_ratchet_key,
            *bob_identity.identity_key(),
            *bob_signed_prekey.public_key(),
            *bob_signed_prekey.public_key(),
            with_onetime_prekey.then(|| *bob_onetime_prekey.public_key()),
        );
        let bob = BobParameters::new(
            bob_identity,
            bob_signed_prekey.clone(),
            bob_signed_prekey,
            with_onetime_prekey.then_some(bob_onetime_prekey),
            *alice_identity.identity_key(),
            *alice_base_key.public_key(),
        );

        (alice, bob)
    }

    #[rstest]
    #[case(ProtocolVersion::V2, false)]
    #[case(ProtocolVersion::V3, false)]
    #[case(ProtocolVersion::V3, true)]
    fn cross_party_agreement(#[case] version: ProtocolVersion, #[case] with_onetime_prekey: bool) {
        let rng = Rng::from_seed([1; 32]);
        let (alice_parameters, bob_parameters) = parameters(&rng, with_onetime_prekey);

        let alice = initialize_alice_session(version, &alice_parameters).unwrap();
        let bob = initialize_bob_session(version, &bob_parameters).unwrap();

        assert_eq!(alice.session_version(), Some(version));
        assert_eq!(alice.root_key(), bob.root_key());
        assert_eq!(
            alice.receiver_chain_key(bob.sender_ratchet_key().unwrap()),
            bob.sender_chain_key()
        );
        assert!(alice.sender_chain_key().is_none());

        // Same input, same output.
        let alice_again = initialize_alice_session(version, &alice_parameters).unwrap();
        assert_eq!(alice, alice_again);
    }

    #[test]
    fn master_secret_terms() {
        let rng = Rng::from_seed([1; 32]);
        let (alice, bob) = parameters(&rng, true);

        let v3 = alice_master_secret(ProtocolVersion::V3, &alice).unwrap();
        assert_eq!(v3.len(), 32 * 5);
        assert_eq!(&v3[..32], &[0xFF; 32]);
        assert_eq!(
            &v3[..],
            &bob_master_secret(ProtocolVersion::V3, &bob).unwrap()[..]
        );

        // Version 2 has neither discontinuity bytes nor the one-time pre-key term.
        let v2 = alice_master_secret(ProtocolVersion::V2, &alice).unwrap();
        assert_eq!(v2.len(), 32 * 3);
        assert_eq!(&v2[..], &v3[32..32 * 4]);
        assert_eq!(
            &v2[..],
            &bob_master_secret(ProtocolVersion::V2, &bob).unwrap()[..]
        );
    }

    #[test]
    fn symmetric_roles() {
        let rng = Rng::from_seed([2; 32]);

        let identity_a = IdentityKeyPair::generate(&rng).unwrap();
        let base_a = KeyPair::generate(&rng).unwrap();
        let ratchet_a = KeyPair::generate(&rng).unwrap();
        let identity_b = IdentityKeyPair::generate(&rng).unwrap();
        let base_b = KeyPair::generate(&rng).unwrap();
        let ratchet_b = KeyPair::generate(&rng).unwrap();

        let parameters_a = SymmetricParameters::new(
            identity_a.clone(),
            base_a.clone(),
            ratchet_a.clone(),
            *identity_b.identity_key(),
            *base_b.public_key(),
            *ratchet_b.public_key(),
        )
        .unwrap();
        let parameters_b = SymmetricParameters::new(
            identity_b,
            base_b,
            ratchet_b,
            *identity_a.identity_key(),
            *base_a.public_key(),
            *ratchet_a.public_key(),
        )
        .unwrap();
        assert_ne!(parameters_a.is_alice(), parameters_b.is_alice());

        let state_a = initialize_symmetric_session(ProtocolVersion::V3, parameters_a).unwrap();
        let state_b = initialize_symmetric_session(ProtocolVersion::V3, parameters_b).unwrap();
        assert_eq!(state_a.root_key(), state_b.root_key());

        // Identical base keys can not be ordered.
        assert!(
            SymmetricParameters::new(
                identity_a.clone(),
                base_a.clone(),
                ratchet_a,
                *identity_a.identity_key(),
                *base_a.public_key(),
                *base_a.public_key(),
            )
            .is_err()
        );
    }
}
