// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_matches::assert_matches;

use crate::crypto::Rng;
use crate::error::SessionError;
use crate::protocol::{CiphertextMessage, KeyExchangeFlags, KeyExchangeMessage, ProtocolVersion};
use crate::test_utils::{Device, setup_logging};

fn assert_messages_flow(alice: &Device, bob: &Device, rng: &Rng) {
    let alice_cipher = alice.cipher(bob);
    let bob_cipher = bob.cipher(alice);

    let message = alice_cipher.encrypt(b"ping").unwrap();
    assert_matches!(message, CiphertextMessage::Ratchet(_));
    assert_eq!(bob_cipher.decrypt(&message, rng).unwrap(), b"ping");

    let message = bob_cipher.encrypt(b"pong").unwrap();
    assert_eq!(alice_cipher.decrypt(&message, rng).unwrap(), b"pong");

    let message = bob_cipher.encrypt(b"pong again").unwrap();
    assert_eq!(alice_cipher.decrypt(&message, rng).unwrap(), b"pong again");
}

#[test]
fn interactive_key_exchange() {
    setup_logging();
    let rng = Rng::from_seed([1; 32]);

    let alice = Device::new(1, &rng);
    let bob = Device::new(2, &rng);

    let initiate = alice.builder(&bob).initiate(&rng).unwrap();
    assert!(initiate.is_initiate());
    assert_eq!(initiate.version(), ProtocolVersion::V2);
    assert!(
        alice
            .session(&bob)
            .session_state()
            .has_pending_key_exchange()
    );

    // Messages travel encoded.
    let initiate = KeyExchangeMessage::from_bytes(&initiate.to_bytes().unwrap()).unwrap();
    let response = bob
        .builder(&alice)
        .process_key_exchange_message(&initiate, &rng)
        .unwrap()
        .unwrap();
    assert!(response.is_response());
    assert!(!response.is_response_for_simultaneous_initiate());
    assert_eq!(response.version(), ProtocolVersion::V3);
    assert_eq!(response.sequence(), initiate.sequence());

    let response = KeyExchangeMessage::from_bytes(&response.to_bytes().unwrap()).unwrap();
    assert!(
        alice
            .builder(&bob)
            .process_key_exchange_message(&response, &rng)
            .unwrap()
            .is_none()
    );

    let alice_state = alice.session(&bob).session_state().clone();
    let bob_state = bob.session(&alice).session_state().clone();
    assert_eq!(alice_state.session_version(), Some(ProtocolVersion::V3));
    assert_eq!(alice_state.root_key(), bob_state.root_key());
    assert!(!alice_state.has_pending_key_exchange());

    assert_messages_flow(&alice, &bob, &rng);
}

#[test]
fn simultaneous_initiate_converges() {
    let rng = Rng::from_seed([2; 32]);

    let alice = Device::new(1, &rng);
    let bob = Device::new(2, &rng);

    let alice_initiate = alice.builder(&bob).initiate(&rng).unwrap();
    let bob_initiate = bob.builder(&alice).initiate(&rng).unwrap();

    let alice_response = alice
        .builder(&bob)
        .process_key_exchange_message(&bob_initiate, &rng)
        .unwrap()
        .unwrap();
    let bob_response = bob
        .builder(&alice)
        .process_key_exchange_message(&alice_initiate, &rng)
        .unwrap()
        .unwrap();

    assert!(alice_response.is_response_for_simultaneous_initiate());
    assert!(bob_response.is_response_for_simultaneous_initiate());

    // Both already built the same session and kept their own pending key exchange.
    let alice_record = alice.session(&bob);
    let bob_record = bob.session(&alice);
    let root_key = alice_record.session_state().root_key().cloned();
    assert_eq!(bob_record.session_state().root_key().cloned(), root_key);
    assert!(alice_record.session_state().has_pending_key_exchange());
    assert!(bob_record.session_state().has_pending_key_exchange());

    // The responses complete the pending exchanges with the same key material.
    assert!(
        alice
            .builder(&bob)
            .process_key_exchange_message(&bob_response, &rng)
            .unwrap()
            .is_none()
    );
    assert!(
        bob.builder(&alice)
            .process_key_exchange_message(&alice_response, &rng)
            .unwrap()
            .is_none()
    );
    for record in [alice.session(&bob), bob.session(&alice)] {
        assert_eq!(record.session_state().root_key().cloned(), root_key);
        assert!(!record.session_state().has_pending_key_exchange());
    }

    // Repeated responses find no pending exchange anymore and are ignored.
    let alice_record = alice.session(&bob);
    assert!(
        alice
            .builder(&bob)
            .process_key_exchange_message(&bob_response, &rng)
            .unwrap()
            .is_none()
    );
    assert_eq!(alice.session(&bob), alice_record);

    assert_messages_flow(&alice, &bob, &rng);
}

#[test]
fn simultaneous_initiate_with_reordered_messages() {
    let rng = Rng::from_seed([6; 32]);

    let alice = Device::new(1, &rng);
    let bob = Device::new(2, &rng);

    let alice_initiate = alice.builder(&bob).initiate(&rng).unwrap();
    let bob_initiate = bob.builder(&alice).initiate(&rng).unwrap();

    let alice_response = alice
        .builder(&bob)
        .process_key_exchange_message(&bob_initiate, &rng)
        .unwrap()
        .unwrap();
    assert!(alice_response.is_response_for_simultaneous_initiate());

    // Alice's response overtakes her initiate and completes Bob's exchange.
    assert!(
        bob.builder(&alice)
            .process_key_exchange_message(&alice_response, &rng)
            .unwrap()
            .is_none()
    );

    // Bob has nothing pending anymore and answers Alice's initiate with new keys.
    let bob_response = bob
        .builder(&alice)
        .process_key_exchange_message(&alice_initiate, &rng)
        .unwrap()
        .unwrap();
    assert!(!bob_response.is_response_for_simultaneous_initiate());

    // Alice still holds her pending exchange and accepts the response.
    assert!(
        alice
            .builder(&bob)
            .process_key_exchange_message(&bob_response, &rng)
            .unwrap()
            .is_none()
    );

    let alice_state = alice.session(&bob).session_state().clone();
    let bob_state = bob.session(&alice).session_state().clone();
    assert_eq!(alice_state.root_key(), bob_state.root_key());
    assert!(!alice_state.has_pending_key_exchange());
    assert!(!bob_state.has_pending_key_exchange());

    assert_messages_flow(&alice, &bob, &rng);
}

#[test]
fn stale_response_is_rejected() {
    let rng = Rng::from_seed([3; 32]);

    let alice = Device::new(1, &rng);
    let bob = Device::new(2, &rng);

    let initiate = alice.builder(&bob).initiate(&rng).unwrap();
    let response = bob
        .builder(&alice)
        .process_key_exchange_message(&initiate, &rng)
        .unwrap()
        .unwrap();
    alice
        .builder(&bob)
        .process_key_exchange_message(&response, &rng)
        .unwrap();

    let record = alice.session(&bob);
    assert_matches!(
        alice
            .builder(&bob)
            .process_key_exchange_message(&response, &rng),
        Err(SessionError::StaleKeyExchange)
    );
    assert_eq!(alice.session(&bob), record);
}

#[test]
fn reject_forged_response() {
    let rng = Rng::from_seed([4; 32]);

    let alice = Device::new(1, &rng);
    let bob = Device::new(2, &rng);

    let initiate = alice.builder(&bob).initiate(&rng).unwrap();
    let response = bob
        .builder(&alice)
        .process_key_exchange_message(&initiate, &rng)
        .unwrap()
        .unwrap();

    let forged = KeyExchangeMessage::new(
        response.version(),
        response.sequence(),
        response.flags(),
        *response.base_key(),
        response.base_key_signature().map(|signature| signature.tampered(3)),
        *response.ratchet_key(),
        *response.identity_key(),
    );
    assert_eq!(forged.flags(), KeyExchangeFlags::RESPONSE);

    assert_matches!(
        alice
            .builder(&bob)
            .process_key_exchange_message(&forged, &rng),
        Err(SessionError::InvalidSignature(_))
    );

    // The pending key exchange survives and the genuine response still completes it.
    let state = alice.session(&bob).session_state().clone();
    assert!(state.is_fresh());
    assert!(state.has_pending_key_exchange());
    assert!(alice.store.read_store().unwrap().identity(2).is_none());

    alice
        .builder(&bob)
        .process_key_exchange_message(&response, &rng)
        .unwrap();
    assert_messages_flow(&alice, &bob, &rng);
}

#[test]
fn reject_forged_initiate() {
    let rng = Rng::from_seed([7; 32]);

    let alice = Device::new(1, &rng);
    let bob = Device::new(2, &rng);

    let initiate = alice.builder(&bob).initiate(&rng).unwrap();
    let with_signature = |signature| {
        KeyExchangeMessage::new(
            ProtocolVersion::V3,
            initiate.sequence(),
            initiate.flags(),
            *initiate.base_key(),
            signature,
            *initiate.ratchet_key(),
            *initiate.identity_key(),
        )
    };
    let signature = initiate.base_key_signature().copied();

    for bit in [0, 100, 300, 511] {
        let forged = with_signature(signature.map(|signature| signature.tampered(bit)));
        assert_matches!(
            bob.builder(&alice)
                .process_key_exchange_message(&forged, &rng),
            Err(SessionError::InvalidSignature(_))
        );
        assert!(bob.session(&alice).is_fresh());
        assert!(bob.store.read_store().unwrap().identity(1).is_none());
    }

    // Version 3 initiates without a signature are not accepted either.
    assert_matches!(
        bob.builder(&alice)
            .process_key_exchange_message(&with_signature(None), &rng),
        Err(SessionError::InvalidMessage(_))
    );
    assert!(bob.session(&alice).is_fresh());

    let response = bob
        .builder(&alice)
        .process_key_exchange_message(&with_signature(signature), &rng)
        .unwrap()
        .unwrap();
    alice
        .builder(&bob)
        .process_key_exchange_message(&response, &rng)
        .unwrap();
    assert_messages_flow(&alice, &bob, &rng);
}

#[test]
fn untrusted_key_exchange() {
    let rng = Rng::from_seed([5; 32]);

    let alice = Device::new(1, &rng);
    let bob = Device::new(2, &rng);
    let mallory = Device::new(2, &rng);

    let initiate = alice.builder(&bob).initiate(&rng).unwrap();
    let response = bob
        .builder(&alice)
        .process_key_exchange_message(&initiate, &rng)
        .unwrap()
        .unwrap();
    alice
        .builder(&bob)
        .process_key_exchange_message(&response, &rng)
        .unwrap();

    // Mallory poses as Bob.
    let record = alice.session(&bob);
    let initiate = mallory.builder(&alice).initiate(&rng).unwrap();
    assert_matches!(
        alice
            .builder(&bob)
            .process_key_exchange_message(&initiate, &rng),
        Err(SessionError::UntrustedIdentity(_))
    );
    assert_eq!(alice.session(&bob), record);
}
