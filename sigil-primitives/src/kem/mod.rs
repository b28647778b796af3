#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Key Encapsulation Mechanism backends.
//!
//! Two interchangeable backends with the same call shape:
//!
//! - [`ml_kem`] — ML-KEM-768 (FIPS 203), quantum-resistant. A true KEM:
//!   encapsulation produces a lattice ciphertext and a 32-byte shared secret.
//! - [`ecdh`] — X25519 Diffie-Hellman driven as a KEM: encapsulation
//!   generates an ephemeral keypair, performs DH against the recipient key,
//!   and returns the ephemeral public key as the "ciphertext".
//!
//! Both expose `generate_keypair` / `encapsulate` / `decapsulate` /
//! `self_test` free functions over byte slices, so the provider in
//! `sigil-core` can dispatch on an explicit algorithm tag without the
//! backends knowing about each other.

/// X25519 ECDH classical backend.
pub mod ecdh;
/// ML-KEM-768 quantum-resistant backend.
#[cfg(feature = "ml-kem")]
pub mod ml_kem;

/// Shared secret length in bytes, identical for both backends.
pub const SHARED_SECRET_LEN: usize = 32;
