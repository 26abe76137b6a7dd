//! Permutational multivariate analysis of variance on a distance matrix.
//!
//! # Algorithm
//!
//! With G the Gower-centred matrix -½ J D² J and H_k the hat matrix of the
//! design's leading columns up to and including term k:
//!
//! - SS_k = tr(H_k G) - tr(H_{k-1} G) (sequential, type I)
//! - SS_res = tr(G) - tr(H_K G), SS_total = tr(G)
//! - F_k = (SS_k / df_k) / (SS_res / df_res), R²_k = SS_k / SS_total
//!
//! Permuting observations is applied to G (rows and columns jointly) with
//! the hat matrices held fixed, which is equivalent to shuffling the
//! design's rows. Every term is evaluated on the same permutation.

use super::permutation::{count_extreme, empirical_p_value, power_notes, run_replicates, PermutationConfig};
use crate::data::{verify_alignment, AnovaRow, AnovaTable, DesignMatrix, DistanceMatrix, Formula, SampleTable};
use crate::error::{ReportError, Result};
use crate::ordination::gower_centered;
use log::{info, warn};
use nalgebra::DMatrix;

/// Hat matrix X (XᵀX)⁻¹ Xᵀ.
fn hat_matrix(x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let xtx_inv = (x.transpose() * x).try_inverse().ok_or_else(|| {
        ReportError::DegenerateInput("Design matrix is singular (X'X not invertible)".to_string())
    })?;
    Ok(x * xtx_inv * x.transpose())
}

/// tr(H P G Pᵀ) where P permutes rows by `perm`; both matrices symmetric.
fn permuted_trace(h: &DMatrix<f64>, g: &DMatrix<f64>, perm: &[usize]) -> f64 {
    let n = perm.len();
    let mut trace = 0.0;
    for j in 0..n {
        for i in 0..n {
            trace += h[(i, j)] * g[(perm[j], perm[i])];
        }
    }
    trace
}

/// Sequential sums of squares for each term, then the residual.
///
/// G is centred, so the intercept-only model explains nothing and the
/// first term starts from zero.
fn sequential_ss(hats: &[DMatrix<f64>], g: &DMatrix<f64>, perm: &[usize]) -> (Vec<f64>, f64) {
    let total = g.trace();
    let mut previous = 0.0;
    let mut ss = Vec::with_capacity(hats.len());
    for h in hats {
        let current = permuted_trace(h, g, perm);
        ss.push(current - previous);
        previous = current;
    }
    (ss, total - previous)
}

fn f_statistics(ss: &[f64], df: &[usize], ss_res: f64, df_res: usize) -> Vec<f64> {
    let ms_res = ss_res / df_res as f64;
    ss.iter()
        .zip(df)
        .map(|(s, &d)| (s / d as f64) / ms_res)
        .collect()
}

/// Permutation pseudo-ANOVA of `distances` against the model `formula`.
///
/// `distances` and `samples` must already be reconciled: their IDs are
/// checked element by element and a mismatch is an alignment error. Every
/// formula variable must be complete for the samples given.
pub fn permanova(
    distances: &DistanceMatrix,
    samples: &SampleTable,
    formula: &Formula,
    config: &PermutationConfig,
) -> Result<AnovaTable> {
    config.validate()?;
    verify_alignment(distances.ids(), samples.sample_ids())?;

    let n = distances.len();
    let design = DesignMatrix::from_formula(samples, formula)?;
    let n_coef = design.n_coefficients();
    if n <= n_coef {
        return Err(ReportError::DegenerateInput(format!(
            "Pseudo-ANOVA needs more samples ({}) than model coefficients ({})",
            n, n_coef
        )));
    }
    let df_res = n - n_coef;

    let terms: Vec<(String, usize, usize)> = design
        .term_columns()
        .iter()
        .map(|(name, cols)| (name.clone(), cols.end, cols.len()))
        .collect();
    let df: Vec<usize> = terms.iter().map(|t| t.2).collect();

    let g = gower_centered(distances);
    let hats: Vec<DMatrix<f64>> = terms
        .iter()
        .map(|(_, end, _)| hat_matrix(&design.leading_columns(*end)))
        .collect::<Result<_>>()?;
    let identity: Vec<usize> = (0..n).collect();
    let (ss, ss_res) = sequential_ss(&hats, &g, &identity);
    let ss_total = g.trace();

    let mut notes = power_notes(n, config.n_permutations);
    let mut rows: Vec<AnovaRow> = Vec::with_capacity(terms.len() + 2);

    if ss_total <= f64::EPSILON {
        let msg = "All distances are zero; no variation to partition".to_string();
        warn!("Pseudo-ANOVA: {}", msg);
        notes.push(msg);
        for ((name, _, _), &d) in terms.iter().zip(&df) {
            rows.push(AnovaRow {
                term: name.clone(),
                df: d,
                sum_of_squares: 0.0,
                r_squared: 0.0,
                f_statistic: None,
                p_value: Some(1.0),
            });
        }
    } else {
        let observed_f = f_statistics(&ss, &df, ss_res, df_res);
        let permuted: Vec<Vec<f64>> = run_replicates(n, config, |perm| {
            let (ss_p, ss_res_p) = sequential_ss(&hats, &g, perm);
            f_statistics(&ss_p, &df, ss_res_p, df_res)
        });

        for (k, (name, _, _)) in terms.iter().enumerate() {
            let column: Vec<f64> = permuted.iter().map(|f| f[k]).collect();
            let n_extreme = count_extreme(observed_f[k], &column);
            let p_value = empirical_p_value(n_extreme, config.n_permutations);
            rows.push(AnovaRow {
                term: name.clone(),
                df: df[k],
                sum_of_squares: ss[k],
                r_squared: ss[k] / ss_total,
                f_statistic: Some(observed_f[k]),
                p_value: Some(p_value),
            });
        }
    }

    let r_squared_res = if ss_total > f64::EPSILON { ss_res / ss_total } else { 0.0 };
    rows.push(AnovaRow {
        term: "Residual".to_string(),
        df: df_res,
        sum_of_squares: ss_res,
        r_squared: r_squared_res,
        f_statistic: None,
        p_value: None,
    });
    rows.push(AnovaRow {
        term: "Total".to_string(),
        df: n - 1,
        sum_of_squares: ss_total,
        r_squared: if ss_total > f64::EPSILON { 1.0 } else { 0.0 },
        f_statistic: None,
        p_value: None,
    });

    for note in &notes {
        warn!("Pseudo-ANOVA: {}", note);
    }
    info!(
        "Pseudo-ANOVA {} on {} samples, {} permutations",
        formula, n, config.n_permutations
    );

    Ok(AnovaTable {
        formula: formula.to_string(),
        rows,
        n_permutations: config.n_permutations,
        n_samples: n,
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diversity::euclidean;
    use approx::assert_relative_eq;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("S{:02}", i)).collect()
    }

    fn distances(points: &[Vec<f64>]) -> DistanceMatrix {
        let n = points.len();
        let data = DMatrix::from_fn(n, n, |i, j| euclidean(&points[i], &points[j]));
        DistanceMatrix::new(data, ids(n)).unwrap()
    }

    fn groups(n: usize) -> SampleTable {
        let labels: Vec<&str> = (0..n).map(|i| if i < n / 2 { "A" } else { "B" }).collect();
        SampleTable::new(ids(n)).unwrap().with_categorical("group", &labels).unwrap()
    }

    fn config() -> PermutationConfig {
        PermutationConfig { n_permutations: 199, seed: 1, parallel: true }
    }

    #[test]
    fn test_separated_groups_significant() {
        let points: Vec<Vec<f64>> = (0..12)
            .map(|i| {
                let shift = if i < 6 { 0.0 } else { 10.0 };
                vec![shift + (i % 3) as f64 * 0.3, (i % 2) as f64 * 0.2]
            })
            .collect();
        let table = permanova(&distances(&points), &groups(12), &Formula::parse("~ group").unwrap(), &config()).unwrap();

        let row = table.row("group").unwrap();
        assert_eq!(row.df, 1);
        assert!(row.r_squared > 0.9);
        assert!(row.p_value.unwrap() <= 0.05);
        assert!(row.p_value.unwrap() >= 1.0 / 200.0);
        assert_eq!(table.row("Residual").unwrap().df, 10);
        assert_eq!(table.row("Total").unwrap().df, 11);
    }

    #[test]
    fn test_ss_partition_adds_up() {
        let points: Vec<Vec<f64>> = (0..10)
            .map(|i| vec![(i as f64).sin() * 3.0, (i as f64 * 0.7).cos()])
            .collect();
        let samples = groups(10)
            .with_continuous("score", &[0.1, 2.0, 1.3, 0.7, 3.1, 2.2, 0.4, 1.9, 2.8, 1.0])
            .unwrap();
        let table = permanova(&distances(&points), &samples, &Formula::parse("~ group + score").unwrap(), &config()).unwrap();

        let total = table.row("Total").unwrap().sum_of_squares;
        let parts: f64 = ["group", "score", "Residual"]
            .iter()
            .map(|t| table.row(t).unwrap().sum_of_squares)
            .sum();
        assert_relative_eq!(parts, total, epsilon = 1e-9);

        // Total SS of a Euclidean configuration is the centred sum of squares
        let n = points.len() as f64;
        let mut expected = 0.0;
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                expected += euclidean(&points[i], &points[j]).powi(2);
            }
        }
        assert_relative_eq!(total, expected / n, epsilon = 1e-9);
    }

    #[test]
    fn test_all_zero_distances() {
        let dm = DistanceMatrix::new(DMatrix::zeros(6, 6), ids(6)).unwrap();
        let table = permanova(&dm, &groups(6), &Formula::parse("~ group").unwrap(), &config()).unwrap();
        let row = table.row("group").unwrap();
        assert_eq!(row.r_squared, 0.0);
        assert_eq!(row.p_value, Some(1.0));
        assert!(row.f_statistic.is_none());
        assert!(!table.notes.is_empty());
    }

    #[test]
    fn test_misaligned_input_fails() {
        let points: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let mut reversed = ids(6);
        reversed.reverse();
        let labels = ["A", "A", "A", "B", "B", "B"];
        let samples = SampleTable::new(reversed).unwrap().with_categorical("group", &labels).unwrap();

        let err = permanova(&distances(&points), &samples, &Formula::parse("~ group").unwrap(), &config()).unwrap_err();
        assert!(err.is_alignment());
    }

    #[test]
    fn test_reproducible_across_parallelism() {
        let points: Vec<Vec<f64>> = (0..10).map(|i| vec![(i * 7 % 5) as f64, (i % 3) as f64]).collect();
        let formula = Formula::parse("~ group").unwrap();
        let serial = PermutationConfig { parallel: false, ..config() };
        let a = permanova(&distances(&points), &groups(10), &formula, &config()).unwrap();
        let b = permanova(&distances(&points), &groups(10), &formula, &serial).unwrap();
        assert_eq!(a.row("group").unwrap().p_value, b.row("group").unwrap().p_value);
    }
}
