//! Error types for Sigil Core operations.
//!
//! The taxonomy separates four kinds of failure that callers must never
//! conflate:
//!
//! - **Fatal environment faults** ([`CoreError::BackendUnavailable`]): no
//!   KEM backend passed its self-test. Cached per provider; retried only on
//!   explicit re-initialization.
//! - **Caller contract violations** ([`CoreError::DimensionMismatch`],
//!   [`CoreError::InvalidInput`], [`CoreError::Configuration`]): bugs at the
//!   integration boundary, not retried.
//! - **Cryptographic integrity failures** ([`CoreError::Authentication`],
//!   [`CoreError::Decapsulation`]): the ciphertext is malformed, tampered
//!   with, or the key is wrong. Always surfaced, never retried, never
//!   treated as "no match".
//! - **Normal negatives**: a similarity score below threshold is a regular
//!   return value, and a cache miss is `None`. Neither appears here.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use thiserror::Error;

/// Errors that can occur during Sigil Core operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// No key encapsulation backend passed its self-test. Fatal: there is
    /// no further fallback. The failure is cached until the provider is
    /// re-initialized.
    #[error("no key encapsulation backend available: {0}")]
    BackendUnavailable(String),

    /// An embedding did not have the deployment's fixed dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension required by the configuration.
        expected: usize,
        /// Dimension actually supplied.
        actual: usize,
    },

    /// KEM decapsulation rejected the ciphertext or the private key.
    #[error("decapsulation failed: {0}")]
    Decapsulation(String),

    /// AEAD tag verification failed: tampering or a wrong key. Deliberately
    /// carries no further detail.
    #[error("ciphertext authentication failed")]
    Authentication,

    /// Encryption (encapsulation or AEAD seal) failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Deriving the symmetric key from the shared secret failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Invalid input provided to an operation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration validation failed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No commitment is stored for the subject.
    #[error("no commitment on record for subject {0}")]
    CommitmentNotFound(String),

    /// No private key is available to decrypt the subject's commitment.
    #[error("no usable keypair for subject {0}: cannot decrypt commitment")]
    KeyUnavailable(String),

    /// The commitment store backend failed.
    #[error("commitment store error: {0}")]
    Store(String),
}

/// A specialized Result type for Sigil Core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
