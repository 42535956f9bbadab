//! Scoring backend contract and the built-in summary backend.

use crate::error::Result;
use crate::geneset::{GeneSetDb, GeneSetKey};
use serde::{Deserialize, Deserializer, Serialize};

/// An active gene set unrolled to target row positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedGeneSet {
    pub key: GeneSetKey,
    /// Resolved rows of the target, ascending.
    pub rows: Vec<usize>,
}

/// Everything a backend gets to score one analysis.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    /// Conformed database the indexes were taken from.
    pub gsdb: &'a GeneSetDb,
    /// Active gene sets in table order.
    pub gene_sets: &'a [IndexedGeneSet],
    /// One statistic per target row.
    pub statistics: &'a [f64],
}

impl<'a> ScoringInput<'a> {
    /// Statistics of the rows belonging to `gene_set`.
    pub fn member_statistics(&self, gene_set: &IndexedGeneSet) -> Vec<f64> {
        gene_set
            .rows
            .iter()
            .filter_map(|&r| self.statistics.get(r).copied())
            .collect()
    }
}

/// One row of a per-method result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneSetScore {
    pub collection: String,
    pub name: String,
    /// Members found in the target.
    pub n: usize,
    /// Method specific effect/score. `NaN` is stored as JSON `null`.
    #[serde(deserialize_with = "nan_from_null")]
    pub statistic: f64,
    pub pval: Option<f64>,
    /// Filled in by the runner when p-value adjustment is on.
    pub padj: Option<f64>,
}

impl GeneSetScore {
    pub fn new(key: &GeneSetKey, n: usize, statistic: f64) -> Self {
        Self {
            collection: key.collection.clone(),
            name: key.name.clone(),
            n,
            statistic,
            pval: None,
            padj: None,
        }
    }

    /// Attach a raw p-value.
    pub fn with_pval(mut self, pval: f64) -> Self {
        self.pval = Some(pval);
        self
    }

    pub fn key(&self) -> GeneSetKey {
        GeneSetKey::new(self.collection.as_str(), self.name.as_str())
    }

    /// Significant after adjustment at `alpha`.
    pub fn is_significant_at(&self, alpha: f64) -> bool {
        self.padj.is_some_and(|q| q < alpha)
    }
}

fn nan_from_null<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// A gene set scoring method.
///
/// Backends receive only active gene sets and must return at most one score
/// per gene set they were given.
pub trait ScoringBackend: Send + Sync {
    /// Method name; keys the result table.
    fn name(&self) -> &str;

    fn score(&self, input: &ScoringInput<'_>) -> Result<Vec<GeneSetScore>>;
}

/// Mean of the member statistics. Reports no p-value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanStatistic;

impl ScoringBackend for MeanStatistic {
    fn name(&self) -> &str {
        "mean"
    }

    fn score(&self, input: &ScoringInput<'_>) -> Result<Vec<GeneSetScore>> {
        Ok(input
            .gene_sets
            .iter()
            .map(|gs| {
                let (sum, count) = input
                    .member_statistics(gs)
                    .into_iter()
                    .filter(|v| !v.is_nan())
                    .fold((0.0f64, 0usize), |(s, c), v| (s + v, c + 1));
                let mean = if count > 0 { sum / count as f64 } else { f64::NAN };
                GeneSetScore::new(&gs.key, gs.rows.len(), mean)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geneset::GeneSetDefinition;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_statistic() {
        let gsdb =
            GeneSetDb::new(vec![GeneSetDefinition::new("c", "A", ["g1", "g2", "g3"])]).unwrap();
        let gene_sets = vec![
            IndexedGeneSet {
                key: GeneSetKey::new("c", "A"),
                rows: vec![0, 2, 3],
            },
            IndexedGeneSet {
                key: GeneSetKey::new("c", "B"),
                rows: vec![1],
            },
        ];
        let statistics = [1.0, f64::NAN, 2.0, 6.0];
        let input = ScoringInput {
            gsdb: &gsdb,
            gene_sets: &gene_sets,
            statistics: &statistics,
        };

        let scores = MeanStatistic.score(&input).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].n, 3);
        assert_relative_eq!(scores[0].statistic, 3.0, epsilon = 1e-12);
        assert!(scores[0].pval.is_none());
        assert!(scores[1].statistic.is_nan());
    }

    #[test]
    fn test_score_significance_needs_padj() {
        let score = GeneSetScore::new(&GeneSetKey::new("c", "A"), 3, 1.0).with_pval(0.001);
        assert!(!score.is_significant_at(0.05));
        let adjusted = GeneSetScore {
            padj: Some(0.01),
            ..score
        };
        assert!(adjusted.is_significant_at(0.05));
    }
}
