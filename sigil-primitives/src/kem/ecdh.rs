#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! X25519 ECDH classical KEM backend
//!
//! Drives X25519 Diffie-Hellman (RFC 7748) as a key encapsulation
//! mechanism: encapsulation generates an ephemeral keypair, performs DH
//! against the recipient's static public key, and ships the ephemeral
//! public key as the 32-byte "ciphertext". Decapsulation performs the same
//! DH from the other side. The shared secret is the raw DH output.
//!
//! Uses `x25519-dalek` with static secrets so a recipient key can be
//! rebuilt from stored bytes; key clamping happens inside the DH operation.
//! The DH output is checked for contributory behavior — an all-zero secret
//! (low-order peer point) is rejected.

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use tracing::instrument;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::SHARED_SECRET_LEN;

/// X25519 key length in bytes (public, secret, and ciphertext alike).
pub const X25519_KEY_LEN: usize = 32;

/// Error types for X25519 KEM operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EcdhError {
    /// The OS random source failed to produce key material.
    #[error("X25519 key generation failed: random source unavailable")]
    KeyGenerationFailed,
    /// A key or ciphertext had the wrong length.
    #[error("invalid X25519 {field} length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Which input was malformed ("public key", "secret key", or "ciphertext").
        field: &'static str,
        /// Expected length in bytes.
        expected: usize,
        /// Length actually provided.
        actual: usize,
    },
    /// The DH output was all zeros (non-contributory peer point).
    #[error("X25519 agreement produced a non-contributory shared secret")]
    NonContributory,
    /// The power-up self-test did not round-trip.
    #[error("X25519 self-test failed: {0}")]
    SelfTest(String),
}

fn secret_from_bytes(bytes: &[u8], field: &'static str) -> Result<StaticSecret, EcdhError> {
    let arr: [u8; X25519_KEY_LEN] = bytes.try_into().map_err(|_e| EcdhError::InvalidLength {
        field,
        expected: X25519_KEY_LEN,
        actual: bytes.len(),
    })?;
    Ok(StaticSecret::from(arr))
}

fn public_from_bytes(bytes: &[u8], field: &'static str) -> Result<PublicKey, EcdhError> {
    let arr: [u8; X25519_KEY_LEN] = bytes.try_into().map_err(|_e| EcdhError::InvalidLength {
        field,
        expected: X25519_KEY_LEN,
        actual: bytes.len(),
    })?;
    Ok(PublicKey::from(arr))
}

fn agree(secret: &StaticSecret, public: &PublicKey) -> Result<Zeroizing<[u8; SHARED_SECRET_LEN]>, EcdhError> {
    let shared = secret.diffie_hellman(public);
    if !shared.was_contributory() {
        return Err(EcdhError::NonContributory);
    }
    Ok(Zeroizing::new(*shared.as_bytes()))
}

/// Generate an X25519 keypair.
///
/// Returns `(public_key, secret_key)` as raw bytes; the secret key is
/// wrapped in [`Zeroizing`] and scrubbed on drop.
///
/// # Errors
///
/// Returns [`EcdhError::KeyGenerationFailed`] if the OS random source is
/// unavailable. There is no further fallback below this backend.
#[instrument(level = "debug")]
pub fn generate_keypair() -> Result<(Vec<u8>, Zeroizing<Vec<u8>>), EcdhError> {
    let mut seed = Zeroizing::new([0u8; X25519_KEY_LEN]);
    OsRng.try_fill_bytes(&mut *seed).map_err(|_e| EcdhError::KeyGenerationFailed)?;
    let secret = StaticSecret::from(*seed);
    let public = PublicKey::from(&secret);
    Ok((public.as_bytes().to_vec(), Zeroizing::new(secret.to_bytes().to_vec())))
}

/// Encapsulate against an X25519 public key.
///
/// Generates an ephemeral keypair, performs DH against `public_key`, and
/// returns `(ephemeral_public_key, shared_secret)` — the ephemeral public
/// key is the ciphertext the recipient needs for decapsulation.
///
/// # Errors
///
/// Returns [`EcdhError::InvalidLength`] if `public_key` is not 32 bytes,
/// [`EcdhError::KeyGenerationFailed`] if the random source fails, or
/// [`EcdhError::NonContributory`] for a degenerate peer point.
#[instrument(level = "debug", skip(public_key), fields(public_key_len = public_key.len()))]
pub fn encapsulate(
    public_key: &[u8],
) -> Result<(Vec<u8>, Zeroizing<[u8; SHARED_SECRET_LEN]>), EcdhError> {
    let recipient = public_from_bytes(public_key, "public key")?;

    let mut seed = Zeroizing::new([0u8; X25519_KEY_LEN]);
    OsRng.try_fill_bytes(&mut *seed).map_err(|_e| EcdhError::KeyGenerationFailed)?;
    let ephemeral = StaticSecret::from(*seed);
    let ephemeral_public = PublicKey::from(&ephemeral);

    let shared = agree(&ephemeral, &recipient)?;
    Ok((ephemeral_public.as_bytes().to_vec(), shared))
}

/// Decapsulate an X25519 "ciphertext" (the sender's ephemeral public key)
/// with a stored secret key.
///
/// # Errors
///
/// Returns [`EcdhError::InvalidLength`] on malformed inputs or
/// [`EcdhError::NonContributory`] for a degenerate ephemeral point.
#[instrument(level = "debug", skip(secret_key, ciphertext), fields(ciphertext_len = ciphertext.len()))]
pub fn decapsulate(
    secret_key: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<[u8; SHARED_SECRET_LEN]>, EcdhError> {
    let secret = secret_from_bytes(secret_key, "secret key")?;
    let ephemeral_public = public_from_bytes(ciphertext, "ciphertext")?;
    agree(&secret, &ephemeral_public)
}

/// Power-up self-test: keygen, encapsulate, decapsulate, compare secrets.
///
/// # Errors
///
/// Returns [`EcdhError::SelfTest`] if any step fails or the shared secrets
/// disagree.
#[instrument(level = "debug")]
pub fn self_test() -> Result<(), EcdhError> {
    let (pk, sk) = generate_keypair().map_err(|e| EcdhError::SelfTest(e.to_string()))?;
    let (ct, sender_ss) = encapsulate(&pk).map_err(|e| EcdhError::SelfTest(e.to_string()))?;
    let recipient_ss = decapsulate(&sk, &ct).map_err(|e| EcdhError::SelfTest(e.to_string()))?;

    if *sender_ss == *recipient_ss {
        Ok(())
    } else {
        Err(EcdhError::SelfTest("shared secret mismatch after round-trip".to_string()))
    }
}
