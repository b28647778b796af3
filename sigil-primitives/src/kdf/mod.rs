#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Key derivation primitives.

use thiserror::Error;

/// HKDF-SHA256 extract-and-expand.
pub mod hkdf;

/// Error types for key derivation operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KdfError {
    /// The requested output length is zero or exceeds the HKDF maximum.
    #[error("invalid KDF output length: {0}")]
    InvalidOutputLength(usize),
    /// The expand step failed in the underlying library.
    #[error("key derivation failed: {0}")]
    Derivation(String),
}
