#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! AES-256-GCM authenticated encryption via aws-lc-rs.
//!
//! ## Security Notes
//!
//! - The nonce MUST be unique for each encryption under the same key;
//!   [`Aes256Gcm::generate_nonce`] draws 96 fresh random bits per call and
//!   callers must never derive a nonce from message content.
//! - Tag verification failure is reported as [`AeadError::Authentication`]
//!   with no distinction between tampering and a wrong key.

use aws_lc_rs::aead::{Aad, LessSafeKey, Nonce as AwsNonce, UnboundKey, AES_256_GCM};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::instrument;
use zeroize::ZeroizeOnDrop;

use super::{AeadError, Nonce, AES_256_GCM_KEY_LEN, NONCE_LEN, TAG_LEN};

/// AES-256-GCM cipher bound to a 256-bit key.
///
/// The key bytes are zeroized when the cipher is dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Aes256Gcm {
    key_bytes: [u8; AES_256_GCM_KEY_LEN],
}

impl std::fmt::Debug for Aes256Gcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aes256Gcm").field("key_bytes", &"[REDACTED]").finish()
    }
}

impl Aes256Gcm {
    /// Create a cipher from a 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`AeadError::InvalidKeyLength`] if `key` is not 32 bytes.
    #[instrument(level = "debug", skip(key), fields(key_len = key.len()))]
    pub fn new(key: &[u8]) -> Result<Self, AeadError> {
        let key_bytes: [u8; AES_256_GCM_KEY_LEN] =
            key.try_into().map_err(|_e| AeadError::InvalidKeyLength {
                expected: AES_256_GCM_KEY_LEN,
                actual: key.len(),
            })?;
        Ok(Self { key_bytes })
    }

    /// Generate a fresh random 96-bit nonce.
    #[must_use]
    pub fn generate_nonce() -> Nonce {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }

    fn bound_key(&self) -> Result<LessSafeKey, AeadError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &self.key_bytes)
            .map_err(|_e| AeadError::EncryptionFailed("failed to bind AES-256-GCM key".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Encrypt `plaintext`, returning `ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns [`AeadError::InvalidNonceLength`] or
    /// [`AeadError::EncryptionFailed`] if sealing fails.
    #[instrument(
        level = "debug",
        skip(self, nonce, plaintext, aad),
        fields(plaintext_len = plaintext.len(), has_aad = aad.is_some())
    )]
    pub fn seal(
        &self,
        nonce: &Nonce,
        plaintext: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>, AeadError> {
        let key = self.bound_key()?;
        let aws_nonce =
            AwsNonce::try_assume_unique_for_key(nonce).map_err(|_e| AeadError::InvalidNonceLength)?;
        let aad = Aad::from(aad.unwrap_or(&[]));

        let mut in_out = Vec::with_capacity(plaintext.len().saturating_add(TAG_LEN));
        in_out.extend_from_slice(plaintext);
        key.seal_in_place_append_tag(aws_nonce, aad, &mut in_out)
            .map_err(|e| AeadError::EncryptionFailed(e.to_string()))?;

        Ok(in_out)
    }

    /// Decrypt `ciphertext || tag`, verifying the tag.
    ///
    /// # Errors
    ///
    /// Returns [`AeadError::Authentication`] if the tag does not verify —
    /// the data was tampered with or the key is wrong. This is never
    /// downgraded to a silently wrong plaintext.
    #[instrument(
        level = "debug",
        skip(self, nonce, sealed, aad),
        fields(sealed_len = sealed.len(), has_aad = aad.is_some())
    )]
    pub fn open(
        &self,
        nonce: &Nonce,
        sealed: &[u8],
        aad: Option<&[u8]>,
    ) -> Result<Vec<u8>, AeadError> {
        if sealed.len() < TAG_LEN {
            return Err(AeadError::Authentication);
        }

        let key = self.bound_key()?;
        let aws_nonce =
            AwsNonce::try_assume_unique_for_key(nonce).map_err(|_e| AeadError::InvalidNonceLength)?;
        let aad = Aad::from(aad.unwrap_or(&[]));

        let mut in_out = sealed.to_vec();
        let plaintext =
            key.open_in_place(aws_nonce, aad, &mut in_out).map_err(|_e| AeadError::Authentication)?;

        Ok(plaintext.to_vec())
    }
}
