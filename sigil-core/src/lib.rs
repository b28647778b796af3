//! # Sigil Core
//!
//! The cryptographic and decision core for behavior-gated secret recovery.
//! A subject's recovery secret (or behavioral reference embedding) is
//! sealed into an encrypted commitment; reconstituting it later requires
//! both the decryption capability and a sufficiently similar behavioral
//! signature.
//!
//! ## Components
//!
//! - [`provider::KeyEncapsulationProvider`] — keypairs and KEM
//!   encapsulation; quantum-resistant ML-KEM-768 when available, with a
//!   transparent, explicitly tagged X25519 fallback
//! - [`cipher::HybridCipher`] — KEM + HKDF-SHA256 + AES-256-GCM envelope
//!   encryption
//! - [`cache::TtlCache`] / [`cache::CacheStore`] — expiring storage for
//!   keypairs, wrapped secrets, and sessions
//! - [`similarity::SimilarityEngine`] — multi-metric embedding comparison
//!   with temporal-consistency variants
//! - [`commitment::CommitmentManager`] — commitment lifecycle
//! - [`recovery::RecoveryGate`] — the authorize/deny decision point
//!
//! ## Data Flow
//!
//! ```text
//! enrollment:  embedding ──► CommitmentManager ──► HybridCipher.encrypt
//!                                │                        │
//!                        keypair cached in          EncryptedEnvelope
//!                        PersistentTTLCache         persisted externally
//!
//! recovery:    fresh embedding ──► RecoveryGate ──► HybridCipher.decrypt
//!                                       │                   │
//!                                SimilarityEngine ◄── reference embedding
//!                                       │
//!                              verdict + confidence
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sigil_core::{
//!     CacheStore, CommitmentManager, CommitmentPayload, CoreConfig,
//!     KeyEncapsulationProvider, MemoryCommitmentStore, RecoveryAttempt, RecoveryGate,
//! };
//!
//! let config = CoreConfig::default();
//! let provider = Arc::new(KeyEncapsulationProvider::new(&config));
//! let cache = Arc::new(CacheStore::new(&config.cache));
//! let store = Arc::new(MemoryCommitmentStore::new());
//!
//! let manager = CommitmentManager::new(provider.clone(), cache.clone(), store.clone(), &config);
//! let gate = RecoveryGate::new(provider, store, cache, &config);
//!
//! // Enrollment: seal the subject's reference embedding.
//! manager.create_commitment("subject-1", &CommitmentPayload::Embedding(reference)).await?;
//!
//! // Recovery: compare a freshly captured embedding.
//! let verdict = gate.authorize("subject-1", &RecoveryAttempt::Single(current)).await?;
//! if verdict.authorized {
//!     // hand off to the guardian/quorum orchestration
//! }
//! ```
//!
//! ## Scope
//!
//! This core performs no network I/O and renders no UI. The embedding
//! encoder, the server-side ciphertext store, WebAuthn ceremonies, attempt
//! limiting, and guardian-quorum logic are external collaborators specified
//! only at their boundary.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

/// Expiring key-value storage.
pub mod cache;
/// Hybrid envelope encryption.
pub mod cipher;
/// Commitment lifecycle management.
pub mod commitment;
/// Core configuration.
pub mod config;
/// Error types and result alias.
pub mod error;
/// Logging initialization and sanitization.
pub mod logging;
/// KEM backend selection and key operations.
pub mod provider;
/// Recovery authorization.
pub mod recovery;
/// Embedding similarity decisions.
pub mod similarity;
/// Fundamental data types.
pub mod types;

pub use cache::{CacheRecord, CacheStore, TtlCache};
pub use cipher::HybridCipher;
pub use commitment::{CommitmentManager, CommitmentStore, MemoryCommitmentStore};
pub use config::{BackendPolicy, CacheConfig, CoreConfig, SimilarityConfig};
pub use error::{CoreError, Result};
pub use logging::{init_tracing, sanitize_bytes};
pub use provider::{Encapsulation, KeyEncapsulationProvider};
pub use recovery::{RecoveryAttempt, RecoveryGate};
pub use similarity::SimilarityEngine;
pub use types::{
    BatchMatch, Commitment, CommitmentPayload, CommitmentStatus, Embedding, EncryptedEnvelope,
    KemAlgorithm, Keypair, RecoveryVerdict, SessionRecord, SimilarityResult, TemporalSimilarity,
};
