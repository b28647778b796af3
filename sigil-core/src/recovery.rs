//! The recovery decision point.
//!
//! [`RecoveryGate::authorize`] fetches the subject's commitment, decrypts
//! its envelope, compares the decrypted reference against the freshly
//! captured attempt, and returns a verdict with a confidence score.
//!
//! Error discipline: a similarity score below threshold is a **normal
//! negative verdict**, not an exception. Only cryptographic failures
//! ([`CoreError::Authentication`], [`CoreError::Decapsulation`] — recovery
//! denied: cannot decrypt) and structural failures (no commitment, shape
//! mismatch) are errors. Rate limiting, lockout, and guardian quorum are
//! external collaborators invoked around this gate, never inside it; the
//! gate only reads.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::cache::CacheStore;
use crate::cipher::HybridCipher;
use crate::commitment::CommitmentStore;
use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::provider::KeyEncapsulationProvider;
use crate::similarity::SimilarityEngine;
use crate::types::{CommitmentPayload, Embedding, Keypair, RecoveryVerdict};

/// A freshly captured recovery attempt.
#[derive(Debug, Clone)]
pub enum RecoveryAttempt {
    /// One embedding from the current capture session.
    Single(Embedding),
    /// An ordered sequence of embeddings, one per time window, matched
    /// against a sequence reference with a consistency requirement.
    Sequence(Vec<Embedding>),
}

/// Authorizes or denies recovery attempts.
pub struct RecoveryGate {
    cipher: HybridCipher,
    engine: SimilarityEngine,
    store: Arc<dyn CommitmentStore>,
    cache: Arc<CacheStore>,
}

impl RecoveryGate {
    /// Create a gate over the given provider, store, and cache.
    #[must_use]
    pub fn new(
        provider: Arc<KeyEncapsulationProvider>,
        store: Arc<dyn CommitmentStore>,
        cache: Arc<CacheStore>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            cipher: HybridCipher::new(provider),
            engine: SimilarityEngine::new(config.similarity),
            store,
            cache,
        }
    }

    /// Authorize a recovery attempt using the subject's cached keypair.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::KeyUnavailable`] if no cached keypair exists
    /// for the subject; otherwise as [`Self::authorize_with_keypair`].
    #[instrument(level = "debug", skip(self, attempt))]
    pub async fn authorize(
        &self,
        subject_id: &str,
        attempt: &RecoveryAttempt,
    ) -> Result<RecoveryVerdict> {
        let keypair = self
            .cache
            .keypairs()
            .get(subject_id)
            .await
            .ok_or_else(|| CoreError::KeyUnavailable(subject_id.to_string()))?;
        self.authorize_with_keypair(subject_id, &keypair, attempt)
    }

    /// Authorize a recovery attempt with an explicitly supplied keypair —
    /// for callers that hold the subject's key outside the cache.
    ///
    /// # Errors
    ///
    /// - [`CoreError::CommitmentNotFound`] if nothing is enrolled.
    /// - [`CoreError::Authentication`] / [`CoreError::Decapsulation`] if
    ///   the envelope cannot be decrypted — surfaced, never treated as a
    ///   mere "no match".
    /// - [`CoreError::InvalidInput`] if the attempt's shape does not match
    ///   the stored reference, or the commitment holds an opaque secret.
    #[instrument(level = "debug", skip(self, keypair, attempt))]
    pub fn authorize_with_keypair(
        &self,
        subject_id: &str,
        keypair: &Keypair,
        attempt: &RecoveryAttempt,
    ) -> Result<RecoveryVerdict> {
        let commitment = self
            .store
            .get(subject_id)?
            .ok_or_else(|| CoreError::CommitmentNotFound(subject_id.to_string()))?;

        let plaintext = self.cipher.decrypt(&commitment.envelope, keypair)?;
        let reference = CommitmentPayload::decode(&plaintext)?;

        let verdict = match (&reference, attempt) {
            (CommitmentPayload::Embedding(stored), RecoveryAttempt::Single(current)) => {
                let result = self.engine.analyze(stored, current)?;
                RecoveryVerdict {
                    authorized: result.passed,
                    confidence: result.confidence,
                    reason: if result.passed {
                        format!(
                            "combined similarity {:.4} met threshold {:.2}",
                            result.combined, result.threshold
                        )
                    } else {
                        format!(
                            "combined similarity {:.4} below threshold {:.2}",
                            result.combined, result.threshold
                        )
                    },
                }
            }
            (CommitmentPayload::Sequence(stored), RecoveryAttempt::Sequence(current)) => {
                let result = self.engine.temporal(stored, current)?;
                RecoveryVerdict {
                    authorized: result.passed,
                    confidence: result.consistency,
                    reason: if result.passed {
                        format!(
                            "sequence average {:.4} and consistency {:.4} met policy",
                            result.average_similarity, result.consistency
                        )
                    } else {
                        format!(
                            "sequence average {:.4} / consistency {:.4} did not meet policy",
                            result.average_similarity, result.consistency
                        )
                    },
                }
            }
            (CommitmentPayload::Secret(_), _) => {
                return Err(CoreError::InvalidInput(
                    "commitment holds an opaque secret; no behavioral reference to compare"
                        .to_string(),
                ));
            }
            _ => {
                return Err(CoreError::InvalidInput(
                    "recovery attempt shape does not match the stored reference".to_string(),
                ));
            }
        };

        debug!(
            subject_id,
            authorized = verdict.authorized,
            confidence = verdict.confidence,
            "recovery attempt evaluated"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commitment::{CommitmentManager, MemoryCommitmentStore};
    use crate::config::BackendPolicy;

    struct Fixture {
        manager: CommitmentManager,
        gate: RecoveryGate,
    }

    fn fixture(dimension: usize) -> Fixture {
        let config = CoreConfig::new()
            .with_backend_policy(BackendPolicy::ClassicalOnly)
            .with_embedding_dimension(dimension);
        let provider = Arc::new(KeyEncapsulationProvider::new(&config));
        let cache = Arc::new(CacheStore::new(&config.cache));
        let store: Arc<dyn CommitmentStore> = Arc::new(MemoryCommitmentStore::new());
        Fixture {
            manager: CommitmentManager::new(
                provider.clone(),
                cache.clone(),
                store.clone(),
                &config,
            ),
            gate: RecoveryGate::new(provider, store, cache, &config),
        }
    }

    fn unit_with_cosine(d: usize, cos: f32) -> Vec<f32> {
        let mut v = vec![0.0f32; d];
        v[0] = cos;
        v[1] = (1.0 - cos * cos).sqrt();
        v
    }

    fn e0(d: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; d];
        v[0] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_missing_commitment_is_an_error() {
        let f = fixture(8);
        // Seed a keypair so the gate reaches the store lookup.
        f.manager
            .create_commitment("other-subject", &CommitmentPayload::Embedding(e0(8)))
            .await
            .unwrap();
        let err = f
            .gate
            .authorize("other-subject-2", &RecoveryAttempt::Single(e0(8)))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::KeyUnavailable(_) | CoreError::CommitmentNotFound(_)));
    }

    #[tokio::test]
    async fn test_close_attempt_authorized() {
        let f = fixture(128);
        f.manager
            .create_commitment("subject-1", &CommitmentPayload::Embedding(e0(128)))
            .await
            .unwrap();

        let verdict = f
            .gate
            .authorize("subject-1", &RecoveryAttempt::Single(unit_with_cosine(128, 0.95)))
            .await
            .unwrap();
        assert!(verdict.authorized, "cosine 0.95 must authorize: {}", verdict.reason);
        assert!(verdict.confidence > 0.9);
    }

    #[tokio::test]
    async fn test_distant_attempt_denied_not_error() {
        let f = fixture(128);
        f.manager
            .create_commitment("subject-1", &CommitmentPayload::Embedding(e0(128)))
            .await
            .unwrap();

        let verdict = f
            .gate
            .authorize("subject-1", &RecoveryAttempt::Single(unit_with_cosine(128, 0.40)))
            .await
            .unwrap();
        assert!(!verdict.authorized, "cosine 0.40 must be denied");
        assert!(verdict.reason.contains("below threshold"));
    }

    #[tokio::test]
    async fn test_temporal_attempt_uses_sequence_policy() {
        let f = fixture(16);
        let stored = CommitmentPayload::Sequence((0..4).map(|_| e0(16)).collect());
        f.manager.create_commitment("subject-1", &stored).await.unwrap();

        let consistent: Vec<Embedding> =
            (0..4).map(|_| unit_with_cosine(16, 0.95)).collect();
        let verdict = f
            .gate
            .authorize("subject-1", &RecoveryAttempt::Sequence(consistent))
            .await
            .unwrap();
        assert!(verdict.authorized, "{}", verdict.reason);

        let erratic = vec![
            e0(16),
            unit_with_cosine(16, 0.1),
            unit_with_cosine(16, 0.9),
            unit_with_cosine(16, 0.2),
        ];
        let verdict =
            f.gate.authorize("subject-1", &RecoveryAttempt::Sequence(erratic)).await.unwrap();
        assert!(!verdict.authorized, "inconsistent behavior must be denied");
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_invalid_input() {
        let f = fixture(8);
        f.manager
            .create_commitment("subject-1", &CommitmentPayload::Embedding(e0(8)))
            .await
            .unwrap();
        let err = f
            .gate
            .authorize("subject-1", &RecoveryAttempt::Sequence(vec![e0(8)]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_secret_commitment_cannot_gate() {
        let f = fixture(8);
        let payload =
            CommitmentPayload::Secret(zeroize::Zeroizing::new(b"opaque-vault-key".to_vec()));
        f.manager.create_commitment("subject-1", &payload).await.unwrap();
        let err =
            f.gate.authorize("subject-1", &RecoveryAttempt::Single(e0(8))).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_corrupted_envelope_surfaces_authentication_error() {
        let f = fixture(8);
        let commitment = f
            .manager
            .create_commitment("subject-1", &CommitmentPayload::Embedding(e0(8)))
            .await
            .unwrap();

        // Corrupt the stored envelope in place (supersede with a tampered copy).
        let mut tampered = commitment;
        tampered.envelope.aead_ciphertext[0] ^= 0x01;
        f.gate.store.put(tampered).unwrap();

        let err =
            f.gate.authorize("subject-1", &RecoveryAttempt::Single(e0(8))).await.unwrap_err();
        assert_eq!(err, CoreError::Authentication, "tampering must never look like a mismatch");
    }
}
