#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! ML-KEM-768 (FIPS 203) Post-Quantum Key Encapsulation Mechanism
//!
//! Backed by the pure-Rust `fips203` crate, which — unlike aws-lc-rs —
//! exposes byte serialization for decapsulation keys. The recovery core
//! stores private keys in its TTL cache and must be able to decapsulate
//! from those stored bytes, so serializable secret keys are a hard
//! requirement here.
//!
//! # Key Sizes (ML-KEM-768, NIST Security Category 3)
//!
//! | Component     | Size    |
//! |---------------|---------|
//! | Public key    | 1184 B  |
//! | Secret key    | 2400 B  |
//! | Ciphertext    | 1088 B  |
//! | Shared secret | 32 B    |
//!
//! All functions validate lengths before touching the underlying library,
//! so a truncated or padded key fails with a sized error rather than a
//! library-internal panic.

use fips203::ml_kem_768;
use fips203::traits::{Decaps, Encaps, KeyGen, SerDes};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::instrument;
use zeroize::Zeroizing;

use super::SHARED_SECRET_LEN;

/// ML-KEM-768 public (encapsulation) key length in bytes.
pub const ML_KEM_768_PUBLIC_KEY_LEN: usize = 1184;
/// ML-KEM-768 secret (decapsulation) key length in bytes.
pub const ML_KEM_768_SECRET_KEY_LEN: usize = 2400;
/// ML-KEM-768 ciphertext length in bytes.
pub const ML_KEM_768_CIPHERTEXT_LEN: usize = 1088;

/// Error types for ML-KEM operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MlKemError {
    /// Key generation failed (entropy source or library failure).
    #[error("ML-KEM key generation failed: {0}")]
    KeyGeneration(String),
    /// Encapsulation against the given public key failed.
    #[error("ML-KEM encapsulation failed: {0}")]
    Encapsulation(String),
    /// Decapsulation rejected the ciphertext or the secret key.
    #[error("ML-KEM decapsulation failed: {0}")]
    Decapsulation(String),
    /// A key had the wrong length for ML-KEM-768.
    #[error("invalid ML-KEM {key_type} key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Which key was malformed ("public" or "secret").
        key_type: &'static str,
        /// Expected length in bytes.
        expected: usize,
        /// Length actually provided.
        actual: usize,
    },
    /// The ciphertext had the wrong length for ML-KEM-768.
    #[error("invalid ML-KEM ciphertext length: expected {expected}, got {actual}")]
    InvalidCiphertextLength {
        /// Expected length in bytes.
        expected: usize,
        /// Length actually provided.
        actual: usize,
    },
    /// The power-up self-test did not round-trip.
    #[error("ML-KEM self-test failed: {0}")]
    SelfTest(String),
}

/// Generate an ML-KEM-768 keypair.
///
/// Returns `(public_key, secret_key)` as raw bytes; the secret key is
/// wrapped in [`Zeroizing`] and scrubbed on drop.
///
/// # Errors
///
/// Returns [`MlKemError::KeyGeneration`] if the underlying keygen fails,
/// which in practice means the OS random source is unavailable.
#[instrument(level = "debug")]
pub fn generate_keypair() -> Result<(Vec<u8>, Zeroizing<Vec<u8>>), MlKemError> {
    let (ek, dk) =
        ml_kem_768::KG::try_keygen().map_err(|e| MlKemError::KeyGeneration(e.to_string()))?;
    Ok((ek.into_bytes().to_vec(), Zeroizing::new(dk.into_bytes().to_vec())))
}

/// Encapsulate against an ML-KEM-768 public key.
///
/// Returns `(ciphertext, shared_secret)`.
///
/// # Errors
///
/// Returns [`MlKemError::InvalidKeyLength`] if `public_key` is not exactly
/// 1184 bytes, or [`MlKemError::Encapsulation`] if the library rejects the
/// key material.
#[instrument(level = "debug", skip(public_key), fields(public_key_len = public_key.len()))]
pub fn encapsulate(
    public_key: &[u8],
) -> Result<(Vec<u8>, Zeroizing<[u8; SHARED_SECRET_LEN]>), MlKemError> {
    let ek_bytes: [u8; ML_KEM_768_PUBLIC_KEY_LEN] =
        public_key.try_into().map_err(|_e| MlKemError::InvalidKeyLength {
            key_type: "public",
            expected: ML_KEM_768_PUBLIC_KEY_LEN,
            actual: public_key.len(),
        })?;
    let ek = ml_kem_768::EncapsKey::try_from_bytes(ek_bytes)
        .map_err(|e| MlKemError::Encapsulation(e.to_string()))?;
    let (ssk, ct) = ek.try_encaps().map_err(|e| MlKemError::Encapsulation(e.to_string()))?;
    Ok((ct.into_bytes().to_vec(), Zeroizing::new(ssk.into_bytes())))
}

/// Decapsulate an ML-KEM-768 ciphertext with a stored secret key.
///
/// # Errors
///
/// Returns [`MlKemError::InvalidKeyLength`] /
/// [`MlKemError::InvalidCiphertextLength`] on malformed inputs, or
/// [`MlKemError::Decapsulation`] if the underlying primitive rejects them.
#[instrument(
    level = "debug",
    skip(secret_key, ciphertext),
    fields(ciphertext_len = ciphertext.len())
)]
pub fn decapsulate(
    secret_key: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<[u8; SHARED_SECRET_LEN]>, MlKemError> {
    let dk_bytes: [u8; ML_KEM_768_SECRET_KEY_LEN] =
        secret_key.try_into().map_err(|_e| MlKemError::InvalidKeyLength {
            key_type: "secret",
            expected: ML_KEM_768_SECRET_KEY_LEN,
            actual: secret_key.len(),
        })?;
    let ct_bytes: [u8; ML_KEM_768_CIPHERTEXT_LEN] =
        ciphertext.try_into().map_err(|_e| MlKemError::InvalidCiphertextLength {
            expected: ML_KEM_768_CIPHERTEXT_LEN,
            actual: ciphertext.len(),
        })?;

    let dk = ml_kem_768::DecapsKey::try_from_bytes(dk_bytes)
        .map_err(|e| MlKemError::Decapsulation(e.to_string()))?;
    let ct = ml_kem_768::CipherText::try_from_bytes(ct_bytes)
        .map_err(|e| MlKemError::Decapsulation(e.to_string()))?;
    let ssk = dk.try_decaps(&ct).map_err(|e| MlKemError::Decapsulation(e.to_string()))?;
    Ok(Zeroizing::new(ssk.into_bytes()))
}

/// Power-up self-test: keygen, encapsulate, decapsulate, compare secrets.
///
/// The backend selector in `sigil-core` runs this once per provider before
/// committing to ML-KEM; a failure triggers the classical fallback.
///
/// # Errors
///
/// Returns [`MlKemError::SelfTest`] if any step fails or the shared secrets
/// disagree.
#[instrument(level = "debug")]
pub fn self_test() -> Result<(), MlKemError> {
    let (pk, sk) = generate_keypair().map_err(|e| MlKemError::SelfTest(e.to_string()))?;
    let (ct, sender_ss) = encapsulate(&pk).map_err(|e| MlKemError::SelfTest(e.to_string()))?;
    let recipient_ss = decapsulate(&sk, &ct).map_err(|e| MlKemError::SelfTest(e.to_string()))?;

    if sender_ss.as_slice().ct_eq(recipient_ss.as_slice()).into() {
        Ok(())
    } else {
        Err(MlKemError::SelfTest("shared secret mismatch after round-trip".to_string()))
    }
}
