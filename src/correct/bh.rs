//! Benjamini-Hochberg false discovery rate correction.

use crate::data::AssociationTable;
use std::collections::BTreeMap;

/// Benjamini-Hochberg adjusted p-values.
///
/// q[i] = min over ranks r ≥ rank(i) of p(r) · m / r, capped at 1, where m is
/// the number of non-NaN p-values. NaN inputs stay NaN and are not counted
/// in m.
pub fn adjust_bh(p_values: &[f64]) -> Vec<f64> {
    let mut q_values = vec![f64::NAN; p_values.len()];

    let mut indices: Vec<usize> = (0..p_values.len())
        .filter(|&i| !p_values[i].is_nan())
        .collect();
    let m = indices.len();
    if m == 0 {
        return q_values;
    }
    indices.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    // Work backwards from the largest p-value
    let m_f64 = m as f64;
    let mut running_min = 1.0_f64;
    for (i, &orig_idx) in indices.iter().enumerate().rev() {
        let rank = i + 1;
        let adjusted = p_values[orig_idx] * m_f64 / rank as f64;
        running_min = running_min.min(adjusted);
        q_values[orig_idx] = running_min;
    }

    q_values
}

/// Fill in q-values for every row of a table, one family per term.
///
/// Must run on the complete table, before any significance filtering.
pub fn correct_bh_by_term(table: &AssociationTable) -> AssociationTable {
    let mut families: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, r) in table.results.iter().enumerate() {
        families.entry(r.term.as_str()).or_default().push(i);
    }

    let mut corrected = table.clone();
    for rows in families.values() {
        let p: Vec<f64> = rows.iter().map(|&i| table.results[i].p_value).collect();
        for (&i, q) in rows.iter().zip(adjust_bh(&p)) {
            corrected.results[i].q_value = Some(q);
        }
    }
    corrected
}
