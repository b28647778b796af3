//! Hybrid envelope encryption: KEM + HKDF-SHA256 + AES-256-GCM.
//!
//! ```text
//! encrypt:  public key ──► encapsulate ──► shared secret
//!                                             │
//!                    HKDF-SHA256 (zero salt, versioned info)
//!                                             │
//!           plaintext ──► AES-256-GCM ◄── 256-bit key + fresh nonce
//!                              │
//!                              ▼
//!           EncryptedEnvelope { kem_ct, aead_ct ‖ tag, nonce, algorithm }
//! ```
//!
//! Every encryption draws a fresh random 96-bit nonce; nonces are never
//! derived from content, so nonce reuse under one derived key cannot occur
//! by construction. The HKDF info string is versioned and includes the
//! algorithm identifier for domain separation between backends.
//!
//! Both operations are pure with respect to external state — no hidden
//! caching — so they are independently testable.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::sync::Arc;

use tracing::instrument;
use zeroize::Zeroizing;

use sigil_primitives::aead::aes_gcm::Aes256Gcm;
use sigil_primitives::aead::AeadError;
use sigil_primitives::kdf::hkdf;

use crate::error::{CoreError, Result};
use crate::provider::KeyEncapsulationProvider;
use crate::types::{EncryptedEnvelope, KemAlgorithm, Keypair};

/// Fixed all-zero extract salt; entropy normalization comes from the KEM
/// shared secret and domain separation from the info string.
const ENVELOPE_KEY_SALT: [u8; 32] = [0u8; 32];

const ENVELOPE_INFO_PREFIX: &[u8] = b"sigil.envelope.v1.";

fn envelope_info(algorithm: KemAlgorithm) -> Vec<u8> {
    let id = algorithm.algorithm_id().as_bytes();
    let mut info = Vec::with_capacity(ENVELOPE_INFO_PREFIX.len() + id.len());
    info.extend_from_slice(ENVELOPE_INFO_PREFIX);
    info.extend_from_slice(id);
    info
}

/// Authenticated hybrid encryption of arbitrary payloads under a KEM
/// public key.
#[derive(Debug, Clone)]
pub struct HybridCipher {
    provider: Arc<KeyEncapsulationProvider>,
}

impl HybridCipher {
    /// Create a cipher over the given provider.
    #[must_use]
    pub fn new(provider: Arc<KeyEncapsulationProvider>) -> Self {
        Self { provider }
    }

    /// Encrypt `plaintext` for the holder of `public_key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for a wrong-length public key,
    /// [`CoreError::Encryption`] if encapsulation or sealing fails, or
    /// [`CoreError::KeyDerivation`] if HKDF fails.
    #[instrument(level = "debug", skip(self, plaintext, public_key), fields(%algorithm, plaintext_len = plaintext.len()))]
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        algorithm: KemAlgorithm,
        public_key: &[u8],
    ) -> Result<EncryptedEnvelope> {
        let encapsulation = self.provider.encapsulate(algorithm, public_key)?;

        let key = hkdf::derive_key(
            &encapsulation.shared_secret,
            &ENVELOPE_KEY_SALT,
            &envelope_info(algorithm),
        )
        .map_err(|e| CoreError::KeyDerivation(e.to_string()))?;

        let cipher =
            Aes256Gcm::new(key.as_slice()).map_err(|e| CoreError::Encryption(e.to_string()))?;
        let nonce = Aes256Gcm::generate_nonce();
        let aead_ciphertext = cipher
            .seal(&nonce, plaintext, None)
            .map_err(|e| CoreError::Encryption(e.to_string()))?;

        Ok(EncryptedEnvelope {
            kem_ciphertext: encapsulation.ciphertext,
            aead_ciphertext,
            nonce,
            algorithm_id: algorithm.algorithm_id().to_string(),
        })
    }

    /// Decrypt an envelope with the matching keypair.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the envelope's algorithm is
    /// unknown or does not match the keypair, [`CoreError::Decapsulation`]
    /// if the KEM rejects the ciphertext, or [`CoreError::Authentication`]
    /// if the AEAD tag does not verify — tampering or a wrong key, never
    /// silently swallowed.
    #[instrument(level = "debug", skip(self, envelope, keypair), fields(algorithm_id = %envelope.algorithm_id))]
    pub fn decrypt(
        &self,
        envelope: &EncryptedEnvelope,
        keypair: &Keypair,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let algorithm = KemAlgorithm::from_algorithm_id(&envelope.algorithm_id).ok_or_else(|| {
            CoreError::InvalidInput(format!("unknown algorithm id {:?}", envelope.algorithm_id))
        })?;
        if algorithm != keypair.algorithm() {
            return Err(CoreError::InvalidInput(format!(
                "envelope algorithm {algorithm} does not match keypair algorithm {}",
                keypair.algorithm()
            )));
        }

        let shared_secret =
            self.provider.decapsulate(algorithm, &envelope.kem_ciphertext, keypair.private_key())?;

        let key = hkdf::derive_key(&shared_secret, &ENVELOPE_KEY_SALT, &envelope_info(algorithm))
            .map_err(|e| CoreError::KeyDerivation(e.to_string()))?;

        let cipher =
            Aes256Gcm::new(key.as_slice()).map_err(|e| CoreError::Encryption(e.to_string()))?;
        let plaintext =
            cipher.open(&envelope.nonce, &envelope.aead_ciphertext, None).map_err(|e| match e {
                AeadError::Authentication => CoreError::Authentication,
                other => CoreError::Encryption(other.to_string()),
            })?;

        Ok(Zeroizing::new(plaintext))
    }
}
