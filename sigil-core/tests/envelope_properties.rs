//! Envelope encryption property tests across both KEM backends.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;

use sigil_core::{
    BackendPolicy, CoreConfig, CoreError, EncryptedEnvelope, HybridCipher,
    KeyEncapsulationProvider, Keypair,
};

fn cipher_and_keypair(policy: BackendPolicy) -> (HybridCipher, Keypair) {
    let provider =
        Arc::new(KeyEncapsulationProvider::new(&CoreConfig::new().with_backend_policy(policy)));
    let keypair = provider.generate_keypair().expect("keypair generation");
    (HybridCipher::new(provider), keypair)
}

fn policies() -> Vec<BackendPolicy> {
    let mut policies = vec![BackendPolicy::ClassicalOnly];
    if cfg!(feature = "ml-kem") {
        policies.push(BackendPolicy::PreferResistant);
    }
    policies
}

#[test]
fn round_trip_for_all_backends() {
    for policy in policies() {
        let (cipher, keypair) = cipher_and_keypair(policy);
        for plaintext in
            [&b""[..], &b"x"[..], &b"a recovery secret of moderate length"[..], &[0u8; 4096][..]]
        {
            let envelope =
                cipher.encrypt(plaintext, keypair.algorithm(), keypair.public_key()).unwrap();
            let decrypted = cipher.decrypt(&envelope, &keypair).unwrap();
            assert_eq!(
                decrypted.as_slice(),
                plaintext,
                "round-trip must be lossless under {policy:?}"
            );
        }
    }
}

#[test]
fn nonce_and_ciphertext_are_fresh_per_encryption() {
    for policy in policies() {
        let (cipher, keypair) = cipher_and_keypair(policy);
        let a = cipher.encrypt(b"same plaintext", keypair.algorithm(), keypair.public_key()).unwrap();
        let b = cipher.encrypt(b"same plaintext", keypair.algorithm(), keypair.public_key()).unwrap();
        assert_ne!(a.nonce, b.nonce, "nonces must be fresh per call under {policy:?}");
        assert_ne!(a.aead_ciphertext, b.aead_ciphertext);
        assert_ne!(a.kem_ciphertext, b.kem_ciphertext, "encapsulation must be randomized");
    }
}

#[test]
fn every_corrupted_ciphertext_byte_fails_authentication() {
    let (cipher, keypair) = cipher_and_keypair(BackendPolicy::ClassicalOnly);
    let envelope = cipher.encrypt(b"payload", keypair.algorithm(), keypair.public_key()).unwrap();

    for index in 0..envelope.aead_ciphertext.len() {
        let mut tampered = envelope.clone();
        tampered.aead_ciphertext[index] ^= 0x01;
        let err = cipher.decrypt(&tampered, &keypair).unwrap_err();
        assert_eq!(
            err,
            CoreError::Authentication,
            "bit flip at byte {index} must fail closed, never return wrong plaintext"
        );
    }
}

#[test]
fn corrupted_nonce_fails_authentication() {
    let (cipher, keypair) = cipher_and_keypair(BackendPolicy::ClassicalOnly);
    let mut envelope =
        cipher.encrypt(b"payload", keypair.algorithm(), keypair.public_key()).unwrap();
    envelope.nonce[0] ^= 0x01;
    assert_eq!(cipher.decrypt(&envelope, &keypair).unwrap_err(), CoreError::Authentication);
}

#[test]
fn envelope_survives_external_store_round_trip() {
    // The server-side store persists and returns the envelope verbatim;
    // serde is the wire. Decryption must work on the restored copy.
    for policy in policies() {
        let (cipher, keypair) = cipher_and_keypair(policy);
        let envelope =
            cipher.encrypt(b"wrapped secret", keypair.algorithm(), keypair.public_key()).unwrap();

        let json = serde_json::to_string(&envelope).unwrap();
        let restored: EncryptedEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, envelope);

        let decrypted = cipher.decrypt(&restored, &keypair).unwrap();
        assert_eq!(decrypted.as_slice(), b"wrapped secret");
    }
}

#[test]
fn kem_ciphertext_length_matches_algorithm_tag() {
    for policy in policies() {
        let (cipher, keypair) = cipher_and_keypair(policy);
        let envelope = cipher.encrypt(b"p", keypair.algorithm(), keypair.public_key()).unwrap();
        assert_eq!(envelope.kem_ciphertext.len(), keypair.algorithm().kem_ciphertext_len());
        assert_eq!(envelope.algorithm_id, keypair.algorithm().algorithm_id());
    }
}
