//! Shared machinery for permutation tests.
//!
//! # Algorithm
//!
//! 1. Compute the observed statistic on the original sample order
//! 2. For replicate i in 0..N, draw a permutation of the samples from an RNG
//!    seeded with `seed + i` and recompute the statistic on it
//! 3. p = (#{permuted ≥ observed} + 1) / (N + 1)
//!
//! Seeding per replicate makes the drawn permutations independent of
//! scheduling, so the parallel and serial paths return identical results.
//! Each replicate works on its own index vector; the data it reads is shared
//! immutably.

use crate::error::{ReportError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Tolerance for ties between permuted and observed statistics.
pub const TIE_TOLERANCE: f64 = 1.490_116_119_384_765_6e-8;

/// Below this many samples a note about limited power is attached.
pub const LOW_POWER_SAMPLES: usize = 10;

/// Configuration for permutation testing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermutationConfig {
    /// Number of permutations to run.
    pub n_permutations: usize,
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Whether to use parallel computation.
    pub parallel: bool,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        Self {
            n_permutations: 999,
            seed: 1,
            parallel: true,
        }
    }
}

impl PermutationConfig {
    /// Create a quick configuration for testing (fewer permutations).
    pub fn quick() -> Self {
        Self {
            n_permutations: 99,
            ..Default::default()
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.n_permutations == 0 {
            return Err(ReportError::InvalidParameter(
                "n_permutations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The permutation of `0..n` used by replicate `replicate`.
pub fn permutation_indices(n: usize, seed: u64, replicate: usize) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(replicate as u64));
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);
    indices
}

/// Evaluate `statistic` on every replicate's permutation.
///
/// Results are returned in replicate order regardless of `config.parallel`.
pub fn run_replicates<T, F>(n: usize, config: &PermutationConfig, statistic: F) -> Vec<T>
where
    T: Send,
    F: Fn(&[usize]) -> T + Sync,
{
    if config.parallel {
        (0..config.n_permutations)
            .into_par_iter()
            .map(|i| statistic(&permutation_indices(n, config.seed, i)))
            .collect()
    } else {
        (0..config.n_permutations)
            .map(|i| statistic(&permutation_indices(n, config.seed, i)))
            .collect()
    }
}

/// Number of permuted statistics at least as large as the observed one.
///
/// NaN permuted values never count as extreme.
pub fn count_extreme(observed: f64, permuted: &[f64]) -> usize {
    permuted
        .iter()
        .filter(|&&s| s >= observed - TIE_TOLERANCE)
        .count()
}

/// Empirical p-value (n_extreme + 1) / (N + 1), always in [1/(N+1), 1].
pub fn empirical_p_value(n_extreme: usize, n_permutations: usize) -> f64 {
    (n_extreme.min(n_permutations) as f64 + 1.0) / (n_permutations as f64 + 1.0)
}

/// Informational notes on the power of a permutation test.
pub fn power_notes(n_samples: usize, n_permutations: usize) -> Vec<String> {
    let mut notes = Vec::new();
    if n_samples < LOW_POWER_SAMPLES {
        notes.push(format!(
            "Only {} samples; permutation test has limited power",
            n_samples
        ));
    }
    // n! distinct orderings; beyond 20 samples this always exceeds N
    if n_samples <= 20 {
        let distinct: u128 = (1..=n_samples as u128).product();
        if distinct < n_permutations as u128 + 1 {
            notes.push(format!(
                "{} permutations requested but only {} distinct orderings exist; replicates repeat",
                n_permutations, distinct
            ));
        }
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutation_is_deterministic() {
        assert_eq!(permutation_indices(10, 7, 3), permutation_indices(10, 7, 3));
        assert_ne!(permutation_indices(10, 7, 3), permutation_indices(10, 7, 4));

        let mut sorted = permutation_indices(10, 7, 3);
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let data: Vec<f64> = (0..12).map(|i| (i * i) as f64).collect();
        let stat = |perm: &[usize]| -> f64 {
            perm.iter().enumerate().map(|(i, &p)| i as f64 * data[p]).sum()
        };
        let serial = PermutationConfig { n_permutations: 200, seed: 5, parallel: false };
        let parallel = PermutationConfig { parallel: true, ..serial.clone() };

        assert_eq!(run_replicates(12, &serial, stat), run_replicates(12, &parallel, stat));
    }

    #[test]
    fn test_p_value_bounds() {
        assert_eq!(empirical_p_value(0, 999), 0.001);
        assert_eq!(empirical_p_value(999, 999), 1.0);
        assert_eq!(empirical_p_value(5000, 999), 1.0);
        for k in 0..=99 {
            let p = empirical_p_value(k, 99);
            assert!((0.01..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_count_extreme_ties_and_nan() {
        let permuted = [0.5, 1.0, 1.0 - 1e-12, 2.0, f64::NAN, 0.9];
        assert_eq!(count_extreme(1.0, &permuted), 3);
    }

    #[test]
    fn test_power_notes() {
        assert!(power_notes(30, 999).is_empty());
        assert_eq!(power_notes(8, 999).len(), 1);
        // 4! = 24 orderings
        assert_eq!(power_notes(4, 999).len(), 2);
    }

    #[test]
    fn test_zero_permutations_rejected() {
        let config = PermutationConfig { n_permutations: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
