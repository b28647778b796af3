//! # Sigil Primitives
//!
//! Low-level cryptographic building blocks for the Sigil recovery core:
//!
//! - **KEM backends**: ML-KEM-768 (FIPS 203, feature `ml-kem`) and X25519
//!   ECDH used as a KEM (ephemeral public key as ciphertext)
//! - **AEAD**: AES-256-GCM authenticated encryption via aws-lc-rs
//! - **KDF**: HKDF-SHA256 for deriving symmetric keys from shared secrets
//!
//! Each primitive validates input lengths before calling into the underlying
//! library and reports failures through its own error enum. Secret key
//! material and shared secrets are wrapped in [`zeroize::Zeroizing`] so they
//! are scrubbed from memory on drop.
//!
//! Higher-level concerns — backend selection, envelope formats, caching,
//! similarity decisions — live in `sigil-core`. Nothing in this crate holds
//! state between calls.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

/// Authenticated encryption (AES-256-GCM).
pub mod aead;
/// Key derivation (HKDF-SHA256).
pub mod kdf;
/// Key encapsulation backends (ML-KEM-768, X25519).
pub mod kem;
