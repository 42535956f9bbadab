//! Runs several scoring backends over one conformed GeneSetDb.

use super::backend::{GeneSetScore, IndexedGeneSet, ScoringBackend, ScoringInput};
use super::result::MultiGseaResult;
use crate::correct::correct_bh;
use crate::data::{validate_target, RowIdentifiers};
use crate::error::{GseaError, Result};
use crate::geneset::{ConformConfig, FeatureIdQuery, GeneSetDb, GeneSetKey};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Name of the analysis.
    pub name: String,
    /// Used when the GeneSetDb is not already conformed to the target.
    pub conform: ConformConfig,
    /// Benjamini-Hochberg adjust p-values within each method.
    pub p_adjust: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            name: "multiGSEA".to_string(),
            conform: ConformConfig::default(),
            p_adjust: true,
        }
    }
}

impl AnalysisConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(GseaError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(GseaError::from)
    }
}

/// Score every active gene set with each backend.
///
/// `statistics` holds one value per target row. The GeneSetDb is reused
/// as-is when it is already conformed to `target` and the result records no
/// conform settings; otherwise it is conformed with `config.conform`, and
/// those settings and the resulting warnings are kept on the result.
pub fn run_multi_gsea<T>(
    gsdb: &GeneSetDb,
    target: &T,
    statistics: &[f64],
    backends: &[Box<dyn ScoringBackend>],
    config: &AnalysisConfig,
) -> Result<MultiGseaResult>
where
    T: RowIdentifiers + ?Sized,
{
    validate_target(target)?;
    if statistics.len() != target.n_rows() {
        return Err(GseaError::DimensionMismatch {
            expected: target.n_rows(),
            actual: statistics.len(),
        });
    }
    if backends.is_empty() {
        return Err(GseaError::InvalidParameter(
            "at least one scoring backend is required".to_string(),
        ));
    }
    let mut names = HashSet::new();
    for backend in backends {
        if !names.insert(backend.name()) {
            return Err(GseaError::InvalidParameter(format!(
                "duplicate scoring backend '{}'",
                backend.name()
            )));
        }
    }

    let (conformed, warnings, conform) = if gsdb.is_conformed_to(target) {
        debug!("Reusing GeneSetDb already conformed to the target");
        (gsdb.clone(), Vec::new(), None)
    } else {
        let c = gsdb.conform(target, &config.conform)?;
        (c.gsdb, c.warnings, Some(config.conform.clone()))
    };

    let gene_sets = index_active(&conformed)?;
    if gene_sets.is_empty() {
        return Err(GseaError::EmptyData("no active gene sets to score".to_string()));
    }
    let input = ScoringInput {
        gsdb: &conformed,
        gene_sets: &gene_sets,
        statistics,
    };
    info!(
        "Running {} method(s) on {} gene sets ({})",
        backends.len(),
        gene_sets.len(),
        config.name
    );

    let scored: Vec<(String, Result<Vec<GeneSetScore>>)> = backends
        .par_iter()
        .map(|b| (b.name().to_string(), b.score(&input)))
        .collect();

    let active: HashSet<&GeneSetKey> = gene_sets.iter().map(|gs| &gs.key).collect();
    let mut methods = BTreeMap::new();
    for (method, scores) in scored {
        let mut scores = scores.map_err(|e| GseaError::Backend {
            method: method.clone(),
            reason: e.to_string(),
        })?;
        check_keys(&method, &scores, &active)?;
        if config.p_adjust {
            adjust(&mut scores);
        }
        debug!("{}: {} gene sets scored", method, scores.len());
        methods.insert(method, scores);
    }

    Ok(MultiGseaResult {
        name: config.name.clone(),
        conform,
        gene_sets: conformed.gene_sets(Some(true)).into_iter().cloned().collect(),
        methods,
        warnings,
    })
}

/// Active gene sets with their resolved target rows.
fn index_active(gsdb: &GeneSetDb) -> Result<Vec<IndexedGeneSet>> {
    let query = FeatureIdQuery::new().active_only(true);
    gsdb.gene_sets(Some(true))
        .into_iter()
        .map(|row| {
            let mut rows = gsdb.member_rows(&row.collection, &row.name, &query)?;
            rows.sort_unstable();
            Ok(IndexedGeneSet {
                key: GeneSetKey::new(row.collection.as_str(), row.name.as_str()),
                rows,
            })
        })
        .collect()
}

/// Every score must name a distinct gene set the backend was given.
fn check_keys(method: &str, scores: &[GeneSetScore], active: &HashSet<&GeneSetKey>) -> Result<()> {
    let mut seen = HashSet::new();
    for s in scores {
        let key = s.key();
        if !active.contains(&key) {
            return Err(GseaError::Backend {
                method: method.to_string(),
                reason: format!("scored unknown or inactive gene set {}", key.label()),
            });
        }
        if !seen.insert(key) {
            return Err(GseaError::Backend {
                method: method.to_string(),
                reason: format!("scored gene set {}/{} twice", s.collection, s.name),
            });
        }
    }
    Ok(())
}

/// BH adjust the p-values of one method table in place.
fn adjust(scores: &mut [GeneSetScore]) {
    if scores.iter().all(|s| s.pval.is_none()) {
        return;
    }
    let p_values: Vec<f64> = scores.iter().map(|s| s.pval.unwrap_or(f64::NAN)).collect();
    let labels: Vec<String> = scores.iter().map(|s| s.key().label()).collect();
    let corrected = correct_bh(&p_values, &labels);
    for (s, q) in scores.iter_mut().zip(corrected.q_values) {
        s.padj = if q.is_nan() { None } else { Some(q) };
    }
}
