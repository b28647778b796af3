#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Authenticated encryption primitives.
//!
//! A single AEAD is exposed: AES-256-GCM (NIST SP 800-38D) via aws-lc-rs.
//! The ciphertext layout everywhere in this workspace is `ct || tag` — the
//! 16-byte authentication tag is appended, matching the native aws-lc-rs
//! sealed buffer.

use thiserror::Error;

/// AES-256-GCM cipher.
pub mod aes_gcm;

/// AES-256-GCM key length in bytes.
pub const AES_256_GCM_KEY_LEN: usize = 32;
/// AEAD nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;
/// AEAD authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// A 96-bit AEAD nonce.
pub type Nonce = [u8; NONCE_LEN];

/// Error types for AEAD operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AeadError {
    /// The key had the wrong length.
    #[error("invalid AEAD key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Length actually provided.
        actual: usize,
    },
    /// The nonce was not exactly 12 bytes.
    #[error("invalid AEAD nonce length")]
    InvalidNonceLength,
    /// Tag verification failed: the ciphertext was tampered with or the key
    /// is wrong. Deliberately carries no further detail.
    #[error("AEAD authentication failed")]
    Authentication,
    /// The seal operation itself failed.
    #[error("AEAD encryption failed: {0}")]
    EncryptionFailed(String),
}
