//! Key encapsulation provider with backend selection and fallback.
//!
//! # Backend Selection
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  first call on this provider                 │
//! │                            │                                 │
//! │                            ▼                                 │
//! │        policy == PreferResistant AND `ml-kem` built in?      │
//! │              │ yes                          │ no             │
//! │              ▼                              │                │
//! │     ML-KEM-768 self-test ──── pass ──► MlKem768              │
//! │              │ fail                         │                │
//! │              ▼                              ▼                │
//! │      X25519 self-test ─────── pass ──► X25519 (fallback)     │
//! │              │ fail                                          │
//! │              ▼                                               │
//! │      BackendUnavailable (fatal, cached)                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Selection runs at most once per provider: concurrent first calls share
//! one in-flight probe, and the outcome — including a total failure — is
//! cached. A failed probe is retried only by constructing a new provider
//! (explicit re-initialization), so persistent faults are not masked behind
//! silent retries.
//!
//! The fallback is transparent to callers: the same [`Keypair`] shape comes
//! back either way, with the selected algorithm carried on its tag so that
//! quantum-protection status is never misreported downstream.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use sigil_primitives::kem::ecdh;
#[cfg(feature = "ml-kem")]
use sigil_primitives::kem::ml_kem;

use crate::config::{BackendPolicy, CoreConfig};
use crate::error::{CoreError, Result};
use crate::types::{KemAlgorithm, Keypair};

/// Result of a KEM encapsulation: the transportable ciphertext and the
/// locally held shared secret.
pub struct Encapsulation {
    /// Ciphertext for the holder of the matching private key.
    pub ciphertext: Vec<u8>,
    /// The shared secret, scrubbed on drop.
    pub shared_secret: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for Encapsulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encapsulation")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("shared_secret", &"[REDACTED]")
            .finish()
    }
}

/// Produces keypairs and performs encapsulation/decapsulation, selecting a
/// quantum-resistant backend when one passes its self-test and falling back
/// to classical X25519 otherwise.
pub struct KeyEncapsulationProvider {
    policy: BackendPolicy,
    keypair_lifetime: Duration,
    // `None` inside the cell records a probe that found no working backend;
    // that failure stays cached until the provider is rebuilt.
    backend: OnceLock<Option<KemAlgorithm>>,
}

impl fmt::Debug for KeyEncapsulationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEncapsulationProvider")
            .field("policy", &self.policy)
            .field("selected", &self.backend.get())
            .finish()
    }
}

impl KeyEncapsulationProvider {
    /// Create a provider. No backend is probed until the first operation.
    #[must_use]
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            policy: config.backend_policy,
            keypair_lifetime: config.cache.keypair_ttl,
            backend: OnceLock::new(),
        }
    }

    /// The backend this provider has selected, probing on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BackendUnavailable`] if no backend passed its
    /// self-test. The failure is cached; build a new provider to retry.
    pub fn selected_backend(&self) -> Result<KemAlgorithm> {
        self.backend.get_or_init(|| Self::probe(self.policy)).as_ref().copied().ok_or_else(|| {
            CoreError::BackendUnavailable(
                "no KEM backend passed its self-test; re-initialize the provider to retry"
                    .to_string(),
            )
        })
    }

    fn probe(policy: BackendPolicy) -> Option<KemAlgorithm> {
        #[cfg(feature = "ml-kem")]
        if policy == BackendPolicy::PreferResistant {
            match ml_kem::self_test() {
                Ok(()) => {
                    debug!(backend = %KemAlgorithm::MlKem768, "selected quantum-resistant KEM backend");
                    return Some(KemAlgorithm::MlKem768);
                }
                Err(error) => {
                    warn!(%error, "ML-KEM self-test failed, falling back to X25519");
                }
            }
        }
        #[cfg(not(feature = "ml-kem"))]
        if policy == BackendPolicy::PreferResistant {
            warn!("quantum-resistant backend not compiled in, falling back to X25519");
        }

        match ecdh::self_test() {
            Ok(()) => {
                debug!(backend = %KemAlgorithm::X25519, "selected classical KEM backend");
                Some(KemAlgorithm::X25519)
            }
            Err(error) => {
                warn!(%error, "X25519 self-test failed, no KEM backend available");
                None
            }
        }
    }

    /// Generate a keypair with the selected backend.
    ///
    /// The returned keypair carries the backend's algorithm tag and an
    /// expiry matching the keypair cache TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BackendUnavailable`] if no backend is usable,
    /// or [`CoreError::Encryption`] if key generation itself fails (the
    /// random source became unavailable after the probe).
    #[instrument(level = "debug", skip(self))]
    pub fn generate_keypair(&self) -> Result<Keypair> {
        let algorithm = self.selected_backend()?;
        let (public_key, private_key) = match algorithm {
            #[cfg(feature = "ml-kem")]
            KemAlgorithm::MlKem768 => ml_kem::generate_keypair()
                .map_err(|e| CoreError::Encryption(format!("ML-KEM key generation failed: {e}")))?,
            KemAlgorithm::X25519 => ecdh::generate_keypair()
                .map_err(|e| CoreError::Encryption(format!("X25519 key generation failed: {e}")))?,
            #[cfg(not(feature = "ml-kem"))]
            KemAlgorithm::MlKem768 => {
                return Err(CoreError::BackendUnavailable(
                    "quantum-resistant backend not compiled in".to_string(),
                ));
            }
        };

        let created_at = Utc::now();
        let lifetime = chrono::Duration::from_std(self.keypair_lifetime)
            .map_err(|e| CoreError::Configuration(format!("keypair lifetime out of range: {e}")))?;
        let expires_at =
            created_at.checked_add_signed(lifetime).unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);

        Ok(Keypair::new(public_key, private_key, algorithm, created_at, expires_at))
    }

    /// Encapsulate against `public_key` under the given algorithm.
    ///
    /// Dispatch is on the key's explicit algorithm tag, not the selected
    /// backend: a classical keypair is always encapsulated classically even
    /// when the resistant backend is available.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for a wrong-length public key or
    /// [`CoreError::Encryption`] if the primitive fails.
    #[instrument(level = "debug", skip(self, public_key), fields(%algorithm))]
    pub fn encapsulate(
        &self,
        algorithm: KemAlgorithm,
        public_key: &[u8],
    ) -> Result<Encapsulation> {
        if public_key.len() != algorithm.public_key_len() {
            return Err(CoreError::InvalidInput(format!(
                "{algorithm} public key must be {} bytes, got {}",
                algorithm.public_key_len(),
                public_key.len()
            )));
        }

        match algorithm {
            #[cfg(feature = "ml-kem")]
            KemAlgorithm::MlKem768 => {
                let (ciphertext, shared_secret) = ml_kem::encapsulate(public_key)
                    .map_err(|e| CoreError::Encryption(format!("ML-KEM encapsulation failed: {e}")))?;
                Ok(Encapsulation {
                    ciphertext,
                    shared_secret: Zeroizing::new(shared_secret.to_vec()),
                })
            }
            KemAlgorithm::X25519 => {
                let (ciphertext, shared_secret) = ecdh::encapsulate(public_key)
                    .map_err(|e| CoreError::Encryption(format!("X25519 encapsulation failed: {e}")))?;
                Ok(Encapsulation {
                    ciphertext,
                    shared_secret: Zeroizing::new(shared_secret.to_vec()),
                })
            }
            #[cfg(not(feature = "ml-kem"))]
            KemAlgorithm::MlKem768 => Err(CoreError::BackendUnavailable(
                "quantum-resistant backend not compiled in".to_string(),
            )),
        }
    }

    /// Decapsulate `ciphertext` with `private_key` under the given
    /// algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decapsulation`] if the ciphertext length does
    /// not match the algorithm's expected size or the underlying primitive
    /// rejects the inputs.
    #[instrument(
        level = "debug",
        skip(self, ciphertext, private_key),
        fields(%algorithm, ciphertext_len = ciphertext.len())
    )]
    pub fn decapsulate(
        &self,
        algorithm: KemAlgorithm,
        ciphertext: &[u8],
        private_key: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        if ciphertext.len() != algorithm.kem_ciphertext_len() {
            return Err(CoreError::Decapsulation(format!(
                "{algorithm} ciphertext must be {} bytes, got {}",
                algorithm.kem_ciphertext_len(),
                ciphertext.len()
            )));
        }

        match algorithm {
            #[cfg(feature = "ml-kem")]
            KemAlgorithm::MlKem768 => ml_kem::decapsulate(private_key, ciphertext)
                .map(|ss| Zeroizing::new(ss.to_vec()))
                .map_err(|e| CoreError::Decapsulation(e.to_string())),
            KemAlgorithm::X25519 => ecdh::decapsulate(private_key, ciphertext)
                .map(|ss| Zeroizing::new(ss.to_vec()))
                .map_err(|e| CoreError::Decapsulation(e.to_string())),
            #[cfg(not(feature = "ml-kem"))]
            KemAlgorithm::MlKem768 => Err(CoreError::BackendUnavailable(
                "quantum-resistant backend not compiled in".to_string(),
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn provider(policy: BackendPolicy) -> KeyEncapsulationProvider {
        KeyEncapsulationProvider::new(&CoreConfig::new().with_backend_policy(policy))
    }

    #[test]
    fn test_backend_selection_is_cached() {
        let provider = provider(BackendPolicy::PreferResistant);
        let first = provider.selected_backend().unwrap();
        let second = provider.selected_backend().unwrap();
        assert_eq!(first, second, "selection must be stable for a provider's lifetime");
    }

    #[cfg(feature = "ml-kem")]
    #[test]
    fn test_prefer_resistant_selects_ml_kem() {
        let provider = provider(BackendPolicy::PreferResistant);
        assert_eq!(provider.selected_backend().unwrap(), KemAlgorithm::MlKem768);
    }

    #[test]
    fn test_classical_only_selects_x25519() {
        let provider = provider(BackendPolicy::ClassicalOnly);
        assert_eq!(provider.selected_backend().unwrap(), KemAlgorithm::X25519);
        let keypair = provider.generate_keypair().unwrap();
        assert_eq!(keypair.algorithm(), KemAlgorithm::X25519);
        assert!(!keypair.algorithm().is_quantum_resistant());
    }

    #[test]
    fn test_keypair_carries_validity_window() {
        let provider = provider(BackendPolicy::ClassicalOnly);
        let keypair = provider.generate_keypair().unwrap();
        assert!(keypair.expires_at() > keypair.created_at());
        assert!(!keypair.is_expired(keypair.created_at()));
        assert!(keypair.is_expired(keypair.expires_at()));
    }

    #[test]
    fn test_encapsulate_decapsulate_round_trip() {
        for policy in [BackendPolicy::PreferResistant, BackendPolicy::ClassicalOnly] {
            let provider = provider(policy);
            let keypair = provider.generate_keypair().unwrap();

            let encapsulation =
                provider.encapsulate(keypair.algorithm(), keypair.public_key()).unwrap();
            assert_eq!(
                encapsulation.ciphertext.len(),
                keypair.algorithm().kem_ciphertext_len(),
                "ciphertext length must match the algorithm"
            );

            let shared_secret = provider
                .decapsulate(keypair.algorithm(), &encapsulation.ciphertext, keypair.private_key())
                .unwrap();
            assert_eq!(*shared_secret, *encapsulation.shared_secret);
        }
    }

    #[test]
    fn test_wrong_length_ciphertext_is_decapsulation_error() {
        let provider = provider(BackendPolicy::ClassicalOnly);
        let keypair = provider.generate_keypair().unwrap();
        let err = provider
            .decapsulate(keypair.algorithm(), &[0u8; 16], keypair.private_key())
            .unwrap_err();
        assert!(matches!(err, CoreError::Decapsulation(_)));
    }

    #[test]
    fn test_wrong_length_public_key_rejected() {
        let provider = provider(BackendPolicy::ClassicalOnly);
        let err = provider.encapsulate(KemAlgorithm::X25519, &[0u8; 16]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn test_concurrent_first_use_shares_one_probe() {
        let provider = std::sync::Arc::new(provider(BackendPolicy::ClassicalOnly));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = provider.clone();
                std::thread::spawn(move || provider.selected_backend().unwrap())
            })
            .collect();
        let backends: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(backends.windows(2).all(|w| w[0] == w[1]), "all callers must see one selection");
    }
}
