//! Configuration for Sigil Core.
//!
//! Everything the original system hard-coded — similarity weights, the pass
//! threshold, the temporal consistency floor, cache TTLs — is surfaced here
//! as explicit policy. The defaults reproduce the shipped behavior exactly;
//! none of them is derived from measurement, so product-level calibration
//! happens by overriding these fields, not by editing the engines.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::time::Duration;

use crate::error::{CoreError, Result};

/// How the provider chooses its KEM backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPolicy {
    /// Probe the quantum-resistant backend first and fall back to X25519 if
    /// its self-test fails or it is not compiled in.
    #[default]
    PreferResistant,
    /// Skip the resistant backend entirely and use X25519. Useful for
    /// interoperating with classical-only peers and for testing the
    /// fallback path.
    ClassicalOnly,
}

/// Similarity decision policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityConfig {
    /// Combined score required to pass.
    pub threshold: f64,
    /// Weight of cosine similarity in the combined score.
    pub cosine_weight: f64,
    /// Weight of normalized Euclidean similarity in the combined score.
    pub euclidean_weight: f64,
    /// Weight of normalized Manhattan similarity in the combined score.
    pub manhattan_weight: f64,
    /// Minimum consistency a temporal sequence must show in addition to
    /// meeting the threshold on average.
    pub temporal_consistency_min: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.87,
            cosine_weight: 0.6,
            euclidean_weight: 0.25,
            manhattan_weight: 0.15,
            temporal_consistency_min: 0.7,
        }
    }
}

/// Per-partition cache lifetimes.
///
/// TTLs are policy, not protocol: any value is acceptable as long as it is
/// explicit. The defaults reflect how quickly each record class goes stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of cached subject keypairs. Public keys rotate daily.
    pub keypair_ttl: Duration,
    /// Lifetime of cached wrapped secrets. These are re-fetchable from the
    /// external store, so a week bounds local staleness.
    pub wrapped_secret_ttl: Duration,
    /// Lifetime of ephemeral recovery sessions.
    pub session_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            keypair_ttl: Duration::from_secs(24 * 60 * 60),
            wrapped_secret_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            session_ttl: Duration::from_secs(60 * 60),
        }
    }
}

/// Top-level configuration for the recovery core.
///
/// # Examples
/// ```rust
/// use sigil_core::config::{BackendPolicy, CoreConfig};
///
/// let config = CoreConfig::new()
///     .with_embedding_dimension(256)
///     .with_backend_policy(BackendPolicy::PreferResistant);
/// config.validate().expect("valid configuration");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Embedding dimension D, constant per deployment. Every embedding
    /// entering the core must have exactly this length.
    pub embedding_dimension: usize,
    /// KEM backend selection policy.
    pub backend_policy: BackendPolicy,
    /// Similarity decision policy.
    pub similarity: SimilarityConfig,
    /// Cache partition lifetimes.
    pub cache: CacheConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: 128,
            backend_policy: BackendPolicy::default(),
            similarity: SimilarityConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

impl CoreConfig {
    /// Create a configuration with the shipped defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the embedding dimension and return self for chaining.
    #[must_use]
    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    /// Set the backend policy and return self for chaining.
    #[must_use]
    pub fn with_backend_policy(mut self, policy: BackendPolicy) -> Self {
        self.backend_policy = policy;
        self
    }

    /// Set the similarity policy and return self for chaining.
    #[must_use]
    pub fn with_similarity(mut self, similarity: SimilarityConfig) -> Self {
        self.similarity = similarity;
        self
    }

    /// Set the pass threshold and return self for chaining.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity.threshold = threshold;
        self
    }

    /// Set the cache lifetimes and return self for chaining.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if the dimension is zero, a
    /// threshold is outside `(0, 1]`, a weight is negative, or the weights
    /// do not sum to 1.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            return Err(CoreError::Configuration("embedding dimension must be non-zero".to_string()));
        }

        let s = &self.similarity;
        if !(s.threshold > 0.0 && s.threshold <= 1.0) {
            return Err(CoreError::Configuration(format!(
                "similarity threshold must be in (0, 1], got {}",
                s.threshold
            )));
        }
        if !(s.temporal_consistency_min > 0.0 && s.temporal_consistency_min <= 1.0) {
            return Err(CoreError::Configuration(format!(
                "temporal consistency minimum must be in (0, 1], got {}",
                s.temporal_consistency_min
            )));
        }
        for (name, weight) in [
            ("cosine", s.cosine_weight),
            ("euclidean", s.euclidean_weight),
            ("manhattan", s.manhattan_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(CoreError::Configuration(format!(
                    "{name} weight must be in [0, 1], got {weight}"
                )));
            }
        }
        let weight_sum = s.cosine_weight + s.euclidean_weight + s.manhattan_weight;
        if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(CoreError::Configuration(format!(
                "similarity weights must sum to 1, got {weight_sum}"
            )));
        }

        Ok(())
    }
}
