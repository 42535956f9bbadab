//! Benjamini-Hochberg false discovery rate correction.

use serde::{Deserialize, Serialize};

/// Result of BH correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BhCorrected {
    /// Test labels in input order.
    pub labels: Vec<String>,
    /// Original p-values.
    pub p_values: Vec<f64>,
    /// Adjusted p-values; `NaN` where the p-value was `NaN`.
    pub q_values: Vec<f64>,
    /// Number of non-missing p-values.
    pub n_tests: usize,
}

/// Apply Benjamini-Hochberg FDR correction.
///
/// q[i] = min(p[i] * n / rank[i], q[i+1]), computed over the non-`NaN`
/// p-values only; `NaN` inputs stay `NaN`.
pub fn correct_bh(p_values: &[f64], labels: &[String]) -> BhCorrected {
    let mut q_values = vec![f64::NAN; p_values.len()];

    let mut indices: Vec<usize> = (0..p_values.len())
        .filter(|&i| !p_values[i].is_nan())
        .collect();
    let n = indices.len();
    if n > 0 {
        indices.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

        let n_f64 = n as f64;
        let mut running = f64::INFINITY;
        for (i, &orig) in indices.iter().enumerate().rev() {
            let adjusted = p_values[orig] * n_f64 / (i + 1) as f64;
            running = running.min(adjusted).min(1.0);
            q_values[orig] = running;
        }
    }

    BhCorrected {
        labels: labels.to_vec(),
        p_values: p_values.to_vec(),
        q_values,
        n_tests: n,
    }
}
