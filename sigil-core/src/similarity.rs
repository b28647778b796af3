//! Multi-metric similarity decisions over behavioral embeddings.
//!
//! Converts two embeddings into a pass/fail decision with a confidence
//! score. Three metrics are computed and combined:
//!
//! - **cosine** similarity, the dominant signal (weight 0.6 by default)
//! - **Euclidean** distance, normalized by `sqrt(2·D)` — the maximum
//!   distance between unit-scale vectors of dimension D (weight 0.25)
//! - **Manhattan** distance, normalized by `2·D` (weight 0.15)
//!
//! Confidence is `1 / (1 + stddev)` over the three per-metric similarities:
//! near 1 when the metrics agree, pulled toward 0 when they disagree. Both
//! the weights and the confidence formula are policy constants, exactly
//! reproducible from [`SimilarityConfig`]; they carry no empirical claim.
//!
//! Temporal variants operate on equal-length ordered sequences (one
//! embedding per time window) and additionally require consistency across
//! windows — a single lucky match is not sufficient.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::cmp::Ordering;

use tracing::instrument;

use crate::config::SimilarityConfig;
use crate::error::{CoreError, Result};
use crate::types::{BatchMatch, Embedding, SimilarityResult, TemporalSimilarity};

/// Computes and combines distance metrics between embeddings.
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    config: SimilarityConfig,
}

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(CoreError::DimensionMismatch { expected: a.len(), actual: b.len() });
    }
    if a.is_empty() {
        return Err(CoreError::InvalidInput("embeddings must be non-empty".to_string()));
    }
    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

impl SimilarityEngine {
    /// Create an engine with the given decision policy.
    #[must_use]
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config }
    }

    /// The decision policy in effect.
    #[must_use]
    pub const fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Cosine similarity in `[-1, 1]`.
    ///
    /// Returns `0.0` if either vector has zero magnitude — never divides by
    /// zero.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DimensionMismatch`] if the lengths differ.
    pub fn cosine_similarity(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        check_dimensions(a, b)?;

        let mut dot = 0.0f64;
        let mut mag_a = 0.0f64;
        let mut mag_b = 0.0f64;
        for (&x, &y) in a.iter().zip(b) {
            let (x, y) = (f64::from(x), f64::from(y));
            dot += x * y;
            mag_a += x * x;
            mag_b += y * y;
        }

        if mag_a == 0.0 || mag_b == 0.0 {
            return Ok(0.0);
        }
        Ok((dot / (mag_a.sqrt() * mag_b.sqrt())).clamp(-1.0, 1.0))
    }

    /// Euclidean (L2) distance.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DimensionMismatch`] if the lengths differ.
    pub fn euclidean_distance(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        check_dimensions(a, b)?;
        let sum: f64 = a
            .iter()
            .zip(b)
            .map(|(&x, &y)| {
                let d = f64::from(x) - f64::from(y);
                d * d
            })
            .sum();
        Ok(sum.sqrt())
    }

    /// Manhattan (L1) distance.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DimensionMismatch`] if the lengths differ.
    pub fn manhattan_distance(&self, a: &[f32], b: &[f32]) -> Result<f64> {
        check_dimensions(a, b)?;
        Ok(a.iter().zip(b).map(|(&x, &y)| (f64::from(x) - f64::from(y)).abs()).sum())
    }

    /// Full multi-metric analysis of a stored reference against a current
    /// probe.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DimensionMismatch`] if the lengths differ.
    #[instrument(level = "debug", skip_all, fields(dimension = stored.len()))]
    pub fn analyze(&self, stored: &[f32], current: &[f32]) -> Result<SimilarityResult> {
        let cosine = self.cosine_similarity(stored, current)?;

        let dimension = stored.len() as f64;
        let max_euclidean = (2.0 * dimension).sqrt();
        let max_manhattan = 2.0 * dimension;

        let euclidean_sim =
            (1.0 - self.euclidean_distance(stored, current)? / max_euclidean).clamp(0.0, 1.0);
        let manhattan_sim =
            (1.0 - self.manhattan_distance(stored, current)? / max_manhattan).clamp(0.0, 1.0);

        let combined = self.config.cosine_weight * cosine
            + self.config.euclidean_weight * euclidean_sim
            + self.config.manhattan_weight * manhattan_sim;

        let spread = population_variance(&[cosine, euclidean_sim, manhattan_sim]).sqrt();
        let confidence = 1.0 / (1.0 + spread);

        Ok(SimilarityResult {
            cosine,
            euclidean_sim,
            manhattan_sim,
            combined,
            confidence,
            passed: combined >= self.config.threshold,
            threshold: self.config.threshold,
        })
    }

    /// Compare two ordered embedding sequences window by window.
    ///
    /// Passing requires the mean per-window cosine similarity to meet the
    /// threshold AND the consistency floor to be met: behavior must be
    /// similar across the whole sequence, not in one window.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the sequences are empty or of
    /// different lengths, or [`CoreError::DimensionMismatch`] if any pair
    /// of embeddings disagrees on dimension.
    #[instrument(level = "debug", skip_all, fields(windows = stored_sequence.len()))]
    pub fn temporal(
        &self,
        stored_sequence: &[Embedding],
        current_sequence: &[Embedding],
    ) -> Result<TemporalSimilarity> {
        if stored_sequence.is_empty() || current_sequence.is_empty() {
            return Err(CoreError::InvalidInput(
                "temporal sequences must be non-empty".to_string(),
            ));
        }
        if stored_sequence.len() != current_sequence.len() {
            return Err(CoreError::InvalidInput(format!(
                "temporal sequences must have equal length: stored {}, current {}",
                stored_sequence.len(),
                current_sequence.len()
            )));
        }

        let mut similarities = Vec::with_capacity(stored_sequence.len());
        for (stored, current) in stored_sequence.iter().zip(current_sequence) {
            similarities.push(self.cosine_similarity(stored, current)?);
        }

        let average_similarity = mean(&similarities);
        let consistency = 1.0 / (1.0 + population_variance(&similarities).sqrt());
        let passed = average_similarity >= self.config.threshold
            && consistency >= self.config.temporal_consistency_min;

        Ok(TemporalSimilarity { average_similarity, consistency, passed })
    }

    /// Rank stored reference embeddings by cosine similarity against a
    /// probe, descending. No side effects.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DimensionMismatch`] if any stored embedding
    /// disagrees with the probe on dimension.
    pub fn batch_compare(
        &self,
        current: &[f32],
        stored_list: &[Embedding],
    ) -> Result<Vec<BatchMatch>> {
        let mut matches = Vec::with_capacity(stored_list.len());
        for (index, stored) in stored_list.iter().enumerate() {
            matches.push(BatchMatch { index, cosine: self.cosine_similarity(stored, current)? });
        }
        matches.sort_by(|a, b| b.cosine.partial_cmp(&a.cosine).unwrap_or(Ordering::Equal));
        Ok(matches)
    }
}
