//! Commitment lifecycle: building and storing encrypted bindings between a
//! subject and their recovery reference.
//!
//! A commitment is created once a subject's embedding or secret is ready,
//! superseded (never mutated) when the subject re-commits, and deleted only
//! on explicit request. Two concurrent creations for the same subject are
//! serialized through a per-subject critical section — last writer wins,
//! never a merged or partial state. Different subjects proceed without
//! coordination.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::cache::CacheStore;
use crate::cipher::HybridCipher;
use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::provider::KeyEncapsulationProvider;
use crate::types::{Commitment, CommitmentPayload, CommitmentStatus, Keypair};

/// Persistence boundary for commitments.
///
/// The in-memory implementation backs tests and single-process use; the
/// server-side ciphertext store implements the same trait externally and
/// receives envelopes verbatim.
pub trait CommitmentStore: Send + Sync {
    /// Store a commitment, superseding any previous one for the subject.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Store`] if the backend fails.
    fn put(&self, commitment: Commitment) -> Result<()>;

    /// Fetch the subject's latest commitment, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Store`] if the backend fails.
    fn get(&self, subject_id: &str) -> Result<Option<Commitment>>;

    /// Delete the subject's commitment. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Store`] if the backend fails.
    fn delete(&self, subject_id: &str) -> Result<()>;
}

/// In-memory [`CommitmentStore`].
#[derive(Debug, Default)]
pub struct MemoryCommitmentStore {
    records: std::sync::RwLock<HashMap<String, Commitment>>,
}

impl MemoryCommitmentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

const LOCK_POISONED: &str = "commitment store lock poisoned";

impl CommitmentStore for MemoryCommitmentStore {
    fn put(&self, commitment: Commitment) -> Result<()> {
        let mut records =
            self.records.write().map_err(|_e| CoreError::Store(LOCK_POISONED.to_string()))?;
        records.insert(commitment.subject_id.clone(), commitment);
        Ok(())
    }

    fn get(&self, subject_id: &str) -> Result<Option<Commitment>> {
        let records =
            self.records.read().map_err(|_e| CoreError::Store(LOCK_POISONED.to_string()))?;
        Ok(records.get(subject_id).cloned())
    }

    fn delete(&self, subject_id: &str) -> Result<()> {
        let mut records =
            self.records.write().map_err(|_e| CoreError::Store(LOCK_POISONED.to_string()))?;
        records.remove(subject_id);
        Ok(())
    }
}

/// Builds and stores encrypted commitments.
pub struct CommitmentManager {
    cipher: HybridCipher,
    provider: Arc<KeyEncapsulationProvider>,
    cache: Arc<CacheStore>,
    store: Arc<dyn CommitmentStore>,
    embedding_dimension: usize,
    subject_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CommitmentManager {
    /// Create a manager over the given provider, cache, and store.
    #[must_use]
    pub fn new(
        provider: Arc<KeyEncapsulationProvider>,
        cache: Arc<CacheStore>,
        store: Arc<dyn CommitmentStore>,
        config: &CoreConfig,
    ) -> Self {
        Self {
            cipher: HybridCipher::new(provider.clone()),
            provider,
            cache,
            store,
            embedding_dimension: config.embedding_dimension,
            subject_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn subject_lock(&self, subject_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.subject_locks.lock().await;
        locks.entry(subject_id.to_string()).or_default().clone()
    }

    fn validate_payload(&self, payload: &CommitmentPayload) -> Result<()> {
        let check_dimension = |embedding: &[f32]| -> Result<()> {
            if embedding.len() != self.embedding_dimension {
                return Err(CoreError::DimensionMismatch {
                    expected: self.embedding_dimension,
                    actual: embedding.len(),
                });
            }
            Ok(())
        };

        match payload {
            CommitmentPayload::Embedding(embedding) => check_dimension(embedding),
            CommitmentPayload::Sequence(sequence) => {
                if sequence.is_empty() {
                    return Err(CoreError::InvalidInput(
                        "commitment sequence must contain at least one embedding".to_string(),
                    ));
                }
                sequence.iter().try_for_each(|embedding| check_dimension(embedding))
            }
            CommitmentPayload::Secret(secret) => {
                if secret.is_empty() {
                    return Err(CoreError::InvalidInput(
                        "commitments are never created with empty payloads".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// The subject's current keypair: reused from the cache while live,
    /// freshly generated and cached otherwise.
    async fn subject_keypair(&self, subject_id: &str) -> Result<Keypair> {
        if let Some(keypair) = self.cache.keypairs().get(subject_id).await {
            if !keypair.is_expired(Utc::now()) {
                return Ok(keypair);
            }
        }
        let keypair = self.provider.generate_keypair()?;
        self.cache.keypairs().set(subject_id, keypair.clone()).await;
        Ok(keypair)
    }

    /// Encrypt `payload` under the subject's keypair and persist the
    /// resulting commitment, superseding any previous one.
    ///
    /// The payload is validated before any key material is touched — a
    /// commitment is never created with a placeholder or empty payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DimensionMismatch`] / [`CoreError::InvalidInput`]
    /// for malformed payloads, or propagates provider, cipher, and store
    /// failures.
    #[instrument(level = "debug", skip(self, payload))]
    pub async fn create_commitment(
        &self,
        subject_id: &str,
        payload: &CommitmentPayload,
    ) -> Result<Commitment> {
        self.validate_payload(payload)?;

        let lock = self.subject_lock(subject_id).await;
        let _guard = lock.lock().await;

        let keypair = self.subject_keypair(subject_id).await?;
        let plaintext = payload.encode();
        let envelope =
            self.cipher.encrypt(&plaintext, keypair.algorithm(), keypair.public_key())?;

        let commitment = Commitment {
            subject_id: subject_id.to_string(),
            envelope,
            quantum_protected: keypair.algorithm().is_quantum_resistant(),
            ml_enhanced: payload.is_behavioral(),
            created_at: Utc::now(),
        };
        self.store.put(commitment.clone())?;

        debug!(
            subject_id,
            quantum_protected = commitment.quantum_protected,
            ml_enhanced = commitment.ml_enhanced,
            "commitment stored"
        );
        Ok(commitment)
    }

    /// Metadata summary of the subject's latest commitment.
    ///
    /// A pure read: absence of a commitment yields the all-false default,
    /// never an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Store`] only if the backend itself fails.
    pub fn get_status(&self, subject_id: &str) -> Result<CommitmentStatus> {
        Ok(match self.store.get(subject_id)? {
            Some(commitment) => CommitmentStatus {
                has_commitments: true,
                ready_for_recovery: commitment.ml_enhanced,
                quantum_protected: commitment.quantum_protected,
                ml_enhanced: commitment.ml_enhanced,
            },
            None => CommitmentStatus::default(),
        })
    }

    /// Delete the subject's commitment and drop their cached keypair.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Store`] if the backend fails.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete_commitment(&self, subject_id: &str) -> Result<()> {
        let lock = self.subject_lock(subject_id).await;
        let _guard = lock.lock().await;

        self.store.delete(subject_id)?;
        self.cache.keypairs().invalidate(subject_id).await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::BackendPolicy;
    use zeroize::Zeroizing;

    fn manager(policy: BackendPolicy) -> CommitmentManager {
        let config = CoreConfig::new().with_backend_policy(policy).with_embedding_dimension(8);
        let provider = Arc::new(KeyEncapsulationProvider::new(&config));
        let cache = Arc::new(CacheStore::new(&config.cache));
        let store: Arc<dyn CommitmentStore> = Arc::new(MemoryCommitmentStore::new());
        CommitmentManager::new(provider, cache, store, &config)
    }

    fn embedding() -> CommitmentPayload {
        CommitmentPayload::Embedding(vec![0.5f32; 8])
    }

    #[tokio::test]
    async fn test_create_commitment_reports_backend_protection() {
        let manager = manager(BackendPolicy::ClassicalOnly);
        let commitment = manager.create_commitment("subject-1", &embedding()).await.unwrap();
        assert!(!commitment.quantum_protected, "classical fallback must not claim protection");
        assert!(commitment.ml_enhanced);

        let status = manager.get_status("subject-1").unwrap();
        assert!(status.has_commitments);
        assert!(!status.quantum_protected);
    }

    #[cfg(feature = "ml-kem")]
    #[tokio::test]
    async fn test_resistant_backend_marks_quantum_protected() {
        let manager = manager(BackendPolicy::PreferResistant);
        let commitment = manager.create_commitment("subject-1", &embedding()).await.unwrap();
        assert!(commitment.quantum_protected);
    }

    #[tokio::test]
    async fn test_wrong_dimension_payload_rejected() {
        let manager = manager(BackendPolicy::ClassicalOnly);
        let payload = CommitmentPayload::Embedding(vec![0.5f32; 4]);
        let err = manager.create_commitment("subject-1", &payload).await.unwrap_err();
        assert_eq!(err, CoreError::DimensionMismatch { expected: 8, actual: 4 });
        assert!(!manager.get_status("subject-1").unwrap().has_commitments);
    }

    #[tokio::test]
    async fn test_empty_secret_rejected() {
        let manager = manager(BackendPolicy::ClassicalOnly);
        let payload = CommitmentPayload::Secret(Zeroizing::new(Vec::new()));
        let err = manager.create_commitment("subject-1", &payload).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_secret_commitment_not_ready_for_recovery() {
        let manager = manager(BackendPolicy::ClassicalOnly);
        let payload = CommitmentPayload::Secret(Zeroizing::new(b"vault-key".to_vec()));
        manager.create_commitment("subject-1", &payload).await.unwrap();

        let status = manager.get_status("subject-1").unwrap();
        assert!(status.has_commitments);
        assert!(!status.ml_enhanced);
        assert!(!status.ready_for_recovery, "an opaque secret cannot gate similarity recovery");
    }

    #[tokio::test]
    async fn test_recommit_supersedes() {
        let manager = manager(BackendPolicy::ClassicalOnly);
        let first = manager.create_commitment("subject-1", &embedding()).await.unwrap();
        let second = manager.create_commitment("subject-1", &embedding()).await.unwrap();
        assert_ne!(
            first.envelope, second.envelope,
            "re-commitment must produce a fresh envelope"
        );

        let stored = manager.store.get("subject-1").unwrap().unwrap();
        assert_eq!(stored.envelope, second.envelope, "last writer wins");
    }

    #[tokio::test]
    async fn test_keypair_reused_across_commitments() {
        let manager = manager(BackendPolicy::ClassicalOnly);
        manager.create_commitment("subject-1", &embedding()).await.unwrap();
        let cached = manager.cache.keypairs().get("subject-1").await.unwrap();
        manager.create_commitment("subject-1", &embedding()).await.unwrap();
        let cached_again = manager.cache.keypairs().get("subject-1").await.unwrap();
        assert_eq!(
            cached.public_key(),
            cached_again.public_key(),
            "a live cached keypair must be reused"
        );
    }

    #[tokio::test]
    async fn test_delete_removes_commitment_and_keypair() {
        let manager = manager(BackendPolicy::ClassicalOnly);
        manager.create_commitment("subject-1", &embedding()).await.unwrap();
        manager.delete_commitment("subject-1").await.unwrap();

        assert!(!manager.get_status("subject-1").unwrap().has_commitments);
        assert!(manager.cache.keypairs().get("subject-1").await.is_none());

        // Idempotent.
        manager.delete_commitment("subject-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_creations_serialize_per_subject() {
        let manager = Arc::new(manager(BackendPolicy::ClassicalOnly));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager.create_commitment("subject-1", &embedding()).await.unwrap()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let stored = manager.store.get("subject-1").unwrap().unwrap();
        let plaintext_probe = manager.get_status("subject-1").unwrap();
        assert!(plaintext_probe.has_commitments, "exactly one coherent commitment must remain");
        assert_eq!(stored.subject_id, "subject-1");
    }
}
