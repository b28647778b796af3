//! Fundamental types for Sigil Core.
//!
//! Keys, envelopes, commitments, similarity results, and the behavioral
//! payload codec. The KEM algorithm tag is carried explicitly on every
//! derived structure so "quantum protected" status is never inferred — a
//! classical-fallback keypair stays visibly classical all the way into the
//! commitment metadata.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use sigil_primitives::aead::Nonce;

use crate::error::{CoreError, Result};

/// A behavioral embedding: a fixed-length float vector produced by the
/// external encoder. The core validates only its dimension, never its
/// semantic quality.
pub type Embedding = Vec<f32>;

// ============================================================================
// KEM algorithm tag
// ============================================================================

/// The key encapsulation algorithm backing a keypair or envelope.
///
/// Selected once per provider and carried explicitly through every derived
/// structure; downstream code dispatches on this tag and never guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KemAlgorithm {
    /// ML-KEM-768 (FIPS 203), quantum-resistant.
    MlKem768,
    /// X25519 ECDH driven as a KEM — the classical fallback.
    X25519,
}

impl KemAlgorithm {
    /// Stable identifier persisted in envelopes and handed to the external
    /// ciphertext store.
    #[must_use]
    pub const fn algorithm_id(self) -> &'static str {
        match self {
            Self::MlKem768 => "ml-kem-768-aes-256-gcm",
            Self::X25519 => "x25519-aes-256-gcm",
        }
    }

    /// Parse an identifier produced by [`Self::algorithm_id`].
    #[must_use]
    pub fn from_algorithm_id(id: &str) -> Option<Self> {
        match id {
            "ml-kem-768-aes-256-gcm" => Some(Self::MlKem768),
            "x25519-aes-256-gcm" => Some(Self::X25519),
            _ => None,
        }
    }

    /// Whether this algorithm resists quantum attacks.
    #[must_use]
    pub const fn is_quantum_resistant(self) -> bool {
        matches!(self, Self::MlKem768)
    }

    /// Public key length in bytes.
    #[must_use]
    pub const fn public_key_len(self) -> usize {
        match self {
            Self::MlKem768 => 1184,
            Self::X25519 => 32,
        }
    }

    /// Private key length in bytes.
    #[must_use]
    pub const fn private_key_len(self) -> usize {
        match self {
            Self::MlKem768 => 2400,
            Self::X25519 => 32,
        }
    }

    /// KEM ciphertext length in bytes.
    #[must_use]
    pub const fn kem_ciphertext_len(self) -> usize {
        match self {
            Self::MlKem768 => 1088,
            Self::X25519 => 32,
        }
    }
}

impl fmt::Display for KemAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.algorithm_id())
    }
}

// ============================================================================
// Keypair
// ============================================================================

/// A KEM keypair bound to its algorithm tag and validity window.
///
/// `Clone` is implemented because the TTL cache owns copies of subject
/// keypairs; the private half stays wrapped in [`Zeroizing`] so every copy
/// scrubs its memory on drop. The private key never leaves this struct in
/// plaintext except through [`Self::private_key`].
#[derive(Clone)]
pub struct Keypair {
    public_key: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
    algorithm: KemAlgorithm,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Keypair {
    /// Assemble a keypair from raw parts.
    #[must_use]
    pub fn new(
        public_key: Vec<u8>,
        private_key: Zeroizing<Vec<u8>>,
        algorithm: KemAlgorithm,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self { public_key, private_key, algorithm, created_at, expires_at }
    }

    /// The public half.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// The private half. Owned exclusively by the holder; callers must not
    /// copy it out of the zeroizing wrapper.
    #[must_use]
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    /// The algorithm tag.
    #[must_use]
    pub const fn algorithm(&self) -> KemAlgorithm {
        self.algorithm
    }

    /// When the keypair was generated.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the keypair should be rotated.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the keypair has passed its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key_len", &self.public_key.len())
            .field("private_key", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ============================================================================
// Encrypted envelope
// ============================================================================

/// The sealed form of a commitment payload or wrapped secret.
///
/// Immutable once created — any change requires re-encryption. The
/// structure round-trips through serde verbatim so the external ciphertext
/// store can persist and return it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// KEM ciphertext (lattice ciphertext or ephemeral X25519 public key).
    pub kem_ciphertext: Vec<u8>,
    /// AES-256-GCM output, `ciphertext || tag`.
    pub aead_ciphertext: Vec<u8>,
    /// The 96-bit AEAD nonce, fresh per encryption.
    pub nonce: Nonce,
    /// Identifier from [`KemAlgorithm::algorithm_id`].
    pub algorithm_id: String,
}

// ============================================================================
// Commitment payload codec
// ============================================================================

/// What a commitment protects: a behavioral reference or an opaque secret.
#[derive(Clone)]
pub enum CommitmentPayload {
    /// A single reference embedding.
    Embedding(Embedding),
    /// An ordered sequence of embeddings, one per time window, used for
    /// temporal consistency checks at recovery.
    Sequence(Vec<Embedding>),
    /// An opaque recovery secret (passkey seed, vault key). Not usable as a
    /// behavioral reference.
    Secret(Zeroizing<Vec<u8>>),
}

const PAYLOAD_TAG_EMBEDDING: u8 = 0x01;
const PAYLOAD_TAG_SEQUENCE: u8 = 0x02;
const PAYLOAD_TAG_SECRET: u8 = 0x03;

fn push_embedding(out: &mut Vec<u8>, embedding: &[f32]) {
    out.extend_from_slice(&(embedding.len() as u32).to_le_bytes());
    for value in embedding {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

fn read_u32(bytes: &[u8], offset: &mut usize) -> Result<u32> {
    let end = offset
        .checked_add(4)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| CoreError::InvalidInput("truncated commitment payload".to_string()))?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*offset..end]);
    *offset = end;
    Ok(u32::from_le_bytes(buf))
}

fn read_embedding(bytes: &[u8], offset: &mut usize, dimension: usize) -> Result<Embedding> {
    let mut embedding = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let end = offset
            .checked_add(4)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| CoreError::InvalidInput("truncated commitment payload".to_string()))?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[*offset..end]);
        *offset = end;
        embedding.push(f32::from_le_bytes(buf));
    }
    Ok(embedding)
}

impl CommitmentPayload {
    /// Whether this payload is a behavioral reference (embedding or
    /// sequence) rather than an opaque secret.
    #[must_use]
    pub fn is_behavioral(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::Sequence(_))
    }

    /// Encode to the envelope plaintext wire format: a tag byte followed by
    /// little-endian dimensions and values.
    #[must_use]
    pub fn encode(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            Self::Embedding(embedding) => {
                out.push(PAYLOAD_TAG_EMBEDDING);
                push_embedding(&mut out, embedding);
            }
            Self::Sequence(sequence) => {
                out.push(PAYLOAD_TAG_SEQUENCE);
                out.extend_from_slice(&(sequence.len() as u32).to_le_bytes());
                for embedding in sequence {
                    push_embedding(&mut out, embedding);
                }
            }
            Self::Secret(secret) => {
                out.push(PAYLOAD_TAG_SECRET);
                out.extend_from_slice(secret);
            }
        }
        Zeroizing::new(out)
    }

    /// Decode an envelope plaintext produced by [`Self::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the buffer is empty, carries
    /// an unknown tag, or is truncated relative to its declared dimensions.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&tag, rest) = bytes
            .split_first()
            .ok_or_else(|| CoreError::InvalidInput("empty commitment payload".to_string()))?;
        let mut offset = 0usize;
        match tag {
            PAYLOAD_TAG_EMBEDDING => {
                let dimension = read_u32(rest, &mut offset)? as usize;
                let embedding = read_embedding(rest, &mut offset, dimension)?;
                if offset != rest.len() {
                    return Err(CoreError::InvalidInput(
                        "trailing bytes after commitment payload".to_string(),
                    ));
                }
                Ok(Self::Embedding(embedding))
            }
            PAYLOAD_TAG_SEQUENCE => {
                let count = read_u32(rest, &mut offset)? as usize;
                let mut sequence = Vec::with_capacity(count);
                for _ in 0..count {
                    let dimension = read_u32(rest, &mut offset)? as usize;
                    sequence.push(read_embedding(rest, &mut offset, dimension)?);
                }
                if offset != rest.len() {
                    return Err(CoreError::InvalidInput(
                        "trailing bytes after commitment payload".to_string(),
                    ));
                }
                Ok(Self::Sequence(sequence))
            }
            PAYLOAD_TAG_SECRET => Ok(Self::Secret(Zeroizing::new(rest.to_vec()))),
            other => {
                Err(CoreError::InvalidInput(format!("unknown commitment payload tag {other:#04x}")))
            }
        }
    }
}

impl PartialEq for CommitmentPayload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Embedding(a), Self::Embedding(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => a == b,
            (Self::Secret(a), Self::Secret(b)) => a.as_slice() == b.as_slice(),
            _ => false,
        }
    }
}

impl fmt::Debug for CommitmentPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedding(e) => f.debug_tuple("Embedding").field(&e.len()).finish(),
            Self::Sequence(s) => f.debug_tuple("Sequence").field(&s.len()).finish(),
            Self::Secret(_) => f.debug_tuple("Secret").field(&"[REDACTED]").finish(),
        }
    }
}

// ============================================================================
// Commitments
// ============================================================================

/// An encrypted, persisted binding between a subject and their recovery
/// reference. Superseded (never mutated) when the subject re-commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commitment {
    /// The subject (user or device) this commitment belongs to.
    pub subject_id: String,
    /// The sealed payload.
    pub envelope: EncryptedEnvelope,
    /// Whether the envelope's KEM is quantum-resistant. Derived from the
    /// keypair's algorithm tag at creation, never recomputed.
    pub quantum_protected: bool,
    /// Whether the payload is a behavioral reference (embedding or
    /// sequence) rather than an opaque secret.
    pub ml_enhanced: bool,
    /// When the commitment was created.
    pub created_at: DateTime<Utc>,
}

/// Metadata summary of a subject's latest commitment.
///
/// Absence of a commitment yields the all-false default — reading status is
/// never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentStatus {
    /// Whether any commitment exists for the subject.
    pub has_commitments: bool,
    /// Whether the stored payload can gate a recovery attempt (a behavioral
    /// reference exists).
    pub ready_for_recovery: bool,
    /// Whether the commitment is protected by a quantum-resistant KEM.
    pub quantum_protected: bool,
    /// Whether the commitment holds a behavioral reference.
    pub ml_enhanced: bool,
}

// ============================================================================
// Similarity results
// ============================================================================

/// Outcome of a multi-metric comparison between two embeddings.
///
/// Derived data: recomputed on every comparison, never persisted as a
/// source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Cosine similarity in `[-1, 1]`.
    pub cosine: f64,
    /// Euclidean distance normalized to a `[0, 1]` similarity.
    pub euclidean_sim: f64,
    /// Manhattan distance normalized to a `[0, 1]` similarity.
    pub manhattan_sim: f64,
    /// Weighted combination of the three metrics.
    pub combined: f64,
    /// Agreement across metrics: `1 / (1 + stddev)`, near 1 when the
    /// metrics agree.
    pub confidence: f64,
    /// Whether `combined` met the threshold.
    pub passed: bool,
    /// The threshold the decision was made against.
    pub threshold: f64,
}

/// Outcome of comparing two ordered embedding sequences window by window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalSimilarity {
    /// Mean per-window cosine similarity.
    pub average_similarity: f64,
    /// Stability across windows: `1 / (1 + sqrt(variance))`.
    pub consistency: f64,
    /// Whether both the average and the consistency floor were met — a
    /// single lucky window is not sufficient.
    pub passed: bool,
}

/// One entry of a ranked batch comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchMatch {
    /// Index of the stored embedding in the input list.
    pub index: usize,
    /// Cosine similarity against the probe embedding.
    pub cosine: f64,
}

// ============================================================================
// Recovery verdict
// ============================================================================

/// The recovery gate's decision for one attempt.
///
/// `authorized == false` is a normal negative result; cryptographic and
/// structural failures are reported as errors instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryVerdict {
    /// Whether the attempt passed the similarity policy.
    pub authorized: bool,
    /// Confidence in the decision, from metric agreement (single attempts)
    /// or sequence consistency (temporal attempts).
    pub confidence: f64,
    /// Human-readable explanation of the verdict.
    pub reason: String,
}

// ============================================================================
// Sessions
// ============================================================================

/// An ephemeral recovery session, cached under its id with a short TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session identifier.
    pub session_id: Uuid,
    /// The subject the session belongs to.
    pub subject_id: String,
    /// When the session was established.
    pub established_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Open a new session for `subject_id`.
    #[must_use]
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            established_at: Utc::now(),
        }
    }
}
