//! Conforming a GeneSetDb to the row identifiers of an expression object.

use super::crosswalk::Crosswalk;
use super::db::{GeneSetDb, GeneSetMember};
use super::table::GeneSetTable;
use crate::data::{validate_target, RowIdentifiers};
use crate::error::{GseaError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Smallest gene set size an enrichment test is allowed to run on.
pub const MIN_GENE_SET_SIZE: usize = 3;

/// How to collapse several target rows sharing one identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniqueBy {
    #[default]
    None,
    Mean,
    Var,
}

impl UniqueBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UniqueBy::None => "none",
            UniqueBy::Mean => "mean",
            UniqueBy::Var => "var",
        }
    }
}

/// Parameters of [`GeneSetDb::conform`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConformConfig {
    pub unique_by: UniqueBy,
    /// Minimum number of matched members for a set to be active.
    pub min_gs_size: usize,
    /// Maximum number of matched members, unbounded when `None`.
    pub max_gs_size: Option<usize>,
    /// Match fractions at or below this emit a low-confidence warning.
    pub match_tolerance: f64,
}

impl Default for ConformConfig {
    fn default() -> Self {
        Self {
            unique_by: UniqueBy::None,
            min_gs_size: MIN_GENE_SET_SIZE,
            max_gs_size: None,
            match_tolerance: 0.25,
        }
    }
}

impl ConformConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_gs_size(mut self, size: usize) -> Self {
        self.min_gs_size = size;
        self
    }

    pub fn max_gs_size(mut self, size: usize) -> Self {
        self.max_gs_size = Some(size);
        self
    }

    pub fn match_tolerance(mut self, tolerance: f64) -> Self {
        self.match_tolerance = tolerance;
        self
    }

    pub fn unique_by(mut self, unique_by: UniqueBy) -> Self {
        self.unique_by = unique_by;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.unique_by != UniqueBy::None {
            return Err(GseaError::UnsupportedUniqueBy(self.unique_by.as_str().to_string()));
        }
        if self.min_gs_size < MIN_GENE_SET_SIZE {
            return Err(GseaError::InvalidParameter(format!(
                "min_gs_size must be at least {}, got {}",
                MIN_GENE_SET_SIZE, self.min_gs_size
            )));
        }
        if let Some(max) = self.max_gs_size {
            if max < self.min_gs_size {
                return Err(GseaError::InvalidParameter(format!(
                    "max_gs_size ({}) must not be smaller than min_gs_size ({})",
                    max, self.min_gs_size
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.match_tolerance) {
            return Err(GseaError::InvalidParameter(format!(
                "match_tolerance must be within [0, 1], got {}",
                self.match_tolerance
            )));
        }
        Ok(())
    }

    fn admits(&self, n: usize) -> bool {
        n >= self.min_gs_size && self.max_gs_size.map_or(true, |max| n <= max)
    }
}

/// Non-fatal advisories raised while conforming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConformWarning {
    /// Few crosswalk entries matched the target.
    LowConfidence { fraction_match: f64, tolerance: f64 },
    /// Gene sets left inactive by the size filter.
    Deactivated {
        n_inactive: usize,
        min_gs_size: usize,
        max_gs_size: Option<usize>,
    },
}

impl fmt::Display for ConformWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConformWarning::LowConfidence {
                fraction_match,
                tolerance,
            } => write!(
                f,
                "only {:.1}% of feature ids matched the target (tolerance {:.1}%)",
                fraction_match * 100.0,
                tolerance * 100.0
            ),
            ConformWarning::Deactivated {
                n_inactive,
                min_gs_size,
                max_gs_size,
            } => {
                let max = max_gs_size.map_or_else(|| "Inf".to_string(), |m| m.to_string());
                write!(
                    f,
                    "deactivating {} gene set(s) with fewer than {} or more than {} matches",
                    n_inactive, min_gs_size, max
                )
            }
        }
    }
}

/// Number of distinct members of each gene set in `table` with at least
/// one resolved crosswalk entry.
pub(crate) fn matched_sizes(
    db: &[GeneSetMember],
    table: &GeneSetTable,
    crosswalk: &Crosswalk,
) -> Vec<usize> {
    (0..table.len())
        .map(|pos| {
            db[table.members(pos)]
                .iter()
                .map(|m| m.feature_id.as_str())
                .filter(|f| crosswalk.is_feature_resolved(f))
                .collect::<HashSet<&str>>()
                .len()
        })
        .collect()
}

/// Outcome of a successful conform.
#[derive(Debug, Clone)]
pub struct Conformed {
    pub gsdb: GeneSetDb,
    /// Fraction of crosswalk entries that resolved.
    pub fraction_match: f64,
    pub warnings: Vec<ConformWarning>,
}

impl Conformed {
    pub fn into_inner(self) -> GeneSetDb {
        self.gsdb
    }
}

impl GeneSetDb {
    /// Resolve the crosswalk against `target`'s row identifiers and
    /// recompute which gene sets are active.
    ///
    /// Fails without touching `self` on invalid parameters or when no
    /// feature identifier matches the target.
    pub fn conform<T>(&self, target: &T, config: &ConformConfig) -> Result<Conformed>
    where
        T: RowIdentifiers + ?Sized,
    {
        config.validate()?;
        validate_target(target)?;

        let feature_id_map = self.feature_id_map.resolve(target.row_ids());
        let fraction_match = feature_id_map.fraction_resolved();
        if fraction_match == 0.0 {
            return Err(GseaError::EmptyMatch);
        }

        let mut warnings = Vec::new();
        if fraction_match <= config.match_tolerance {
            let warning = ConformWarning::LowConfidence {
                fraction_match,
                tolerance: config.match_tolerance,
            };
            warn!("{}", warning);
            warnings.push(warning);
        }

        let stats: Vec<(bool, usize)> = matched_sizes(&self.db, &self.table, &feature_id_map)
            .into_iter()
            .map(|n| (config.admits(n), n))
            .collect();
        let table = self.table.with_activation(&stats);

        let n_inactive = stats.iter().filter(|(active, _)| !active).count();
        if n_inactive > 0 {
            let warning = ConformWarning::Deactivated {
                n_inactive,
                min_gs_size: config.min_gs_size,
                max_gs_size: config.max_gs_size,
            };
            warn!("{}", warning);
            warnings.push(warning);
        }

        info!(
            "Conformed GeneSetDb: {:.1}% of feature ids matched, {}/{} gene sets active",
            fraction_match * 100.0,
            stats.len() - n_inactive,
            stats.len()
        );

        Ok(Conformed {
            gsdb: GeneSetDb {
                db: self.db.clone(),
                feature_id_map,
                table,
                collection_metadata: self.collection_metadata.clone(),
            },
            fraction_match,
            warnings,
        })
    }

    /// Clear all resolved rows and deactivate every gene set.
    pub fn unconform(&self) -> GeneSetDb {
        GeneSetDb {
            db: self.db.clone(),
            feature_id_map: self.feature_id_map.unresolve(),
            table: self.table.deactivated(),
            collection_metadata: self.collection_metadata.clone(),
        }
    }

    /// True when at least one crosswalk entry is resolved.
    pub fn is_conformed(&self) -> bool {
        self.feature_id_map.entries().iter().any(|e| e.x_idx.is_some())
    }

    /// True when conformed and every resolved entry still points at a row of
    /// `target` carrying the same identifier.
    pub fn is_conformed_to<T>(&self, target: &T) -> bool
    where
        T: RowIdentifiers + ?Sized,
    {
        let row_ids = target.row_ids();
        self.is_conformed()
            && self.feature_id_map.entries().iter().all(|e| match e.x_idx {
                Some(idx) => row_ids.get(idx) == Some(&e.x_id),
                None => true,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geneset::db::GeneSetDefinition;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn scenario() -> GeneSetDb {
        GeneSetDb::new(vec![
            GeneSetDefinition::new("c", "A", ["g1", "g2", "g3", "g4"]),
            GeneSetDefinition::new("c", "B", ["g1", "g2"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(ConformConfig::default().validate().is_ok());
        assert!(matches!(
            ConformConfig::new().unique_by(UniqueBy::Mean).validate(),
            Err(GseaError::UnsupportedUniqueBy(_))
        ));
        assert!(ConformConfig::new().min_gs_size(2).validate().is_err());
        assert!(ConformConfig::new().min_gs_size(5).max_gs_size(4).validate().is_err());
        assert!(ConformConfig::new().min_gs_size(5).max_gs_size(5).validate().is_ok());
        assert!(ConformConfig::new().match_tolerance(1.5).validate().is_err());
        assert!(ConformConfig::new().match_tolerance(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_activation() {
        let out = scenario()
            .conform(&ids(&["g1", "g2", "g3", "g9"]), &ConformConfig::default())
            .unwrap();
        let a = out.gsdb.table().get("c", "A").unwrap();
        let b = out.gsdb.table().get("c", "B").unwrap();
        assert_eq!((a.n, a.size, a.active), (3, 4, true));
        assert_eq!((b.n, b.size, b.active), (2, 2, false));
        assert_eq!(out.fraction_match, 0.75);
        assert_eq!(
            out.warnings,
            vec![ConformWarning::Deactivated {
                n_inactive: 1,
                min_gs_size: 3,
                max_gs_size: None
            }]
        );
    }

    #[test]
    fn test_max_size_filter() {
        let out = scenario()
            .conform(
                &ids(&["g1", "g2", "g3", "g4"]),
                &ConformConfig::new().max_gs_size(3),
            )
            .unwrap();
        assert!(!out.gsdb.table().get("c", "A").unwrap().active);
    }

    #[test]
    fn test_empty_match_leaves_input_untouched() {
        let gsdb = scenario();
        let before = gsdb.clone();
        let err = gsdb.conform(&ids(&["x", "y"]), &ConformConfig::default());
        assert!(matches!(err, Err(GseaError::EmptyMatch)));
        assert_eq!(gsdb, before);
    }

    #[test]
    fn test_tolerance_boundary_inclusive() {
        // 4 features, 1 matched -> fraction 0.25
        let gsdb = GeneSetDb::from_sets("c", vec![("A", vec!["g1", "g2", "g3", "g4"])]).unwrap();
        let at = gsdb
            .conform(&ids(&["g1"]), &ConformConfig::new().match_tolerance(0.25))
            .unwrap();
        assert!(at
            .warnings
            .iter()
            .any(|w| matches!(w, ConformWarning::LowConfidence { .. })));

        let above = gsdb
            .conform(&ids(&["g1"]), &ConformConfig::new().match_tolerance(0.2))
            .unwrap();
        assert!(!above
            .warnings
            .iter()
            .any(|w| matches!(w, ConformWarning::LowConfidence { .. })));
    }

    #[test]
    fn test_is_conformed_to() {
        let target = ids(&["g1", "g2", "g3", "g9"]);
        let gsdb = scenario();
        assert!(!gsdb.is_conformed());
        assert!(!gsdb.is_conformed_to(&target));

        let conformed = gsdb.conform(&target, &ConformConfig::default()).unwrap().into_inner();
        assert!(conformed.is_conformed());
        assert!(conformed.is_conformed_to(&target));

        let reordered = ids(&["g9", "g3", "g2", "g1"]);
        assert!(!conformed.is_conformed_to(&reordered));
        assert!(!conformed.is_conformed_to(&ids(&["g1"])));
    }

    #[test]
    fn test_unconform_resets() {
        let gsdb = scenario();
        let conformed = gsdb
            .conform(&ids(&["g1", "g2", "g3"]), &ConformConfig::default())
            .unwrap()
            .into_inner();
        let reset = conformed.unconform();
        assert!(!reset.is_conformed());
        assert_eq!(reset, gsdb);
    }

    #[test]
    fn test_fan_out_counts_features_once() {
        let gsdb = GeneSetDb::from_sets("c", vec![("A", vec!["g1", "g2", "g3"])])
            .unwrap()
            .with_feature_id_map(vec![
                ("g1".to_string(), "p1".to_string()),
                ("g1".to_string(), "p1b".to_string()),
                ("g2".to_string(), "p2".to_string()),
                ("g3".to_string(), "p3".to_string()),
            ])
            .unwrap();
        let out = gsdb
            .conform(&ids(&["p1", "p1b", "p2", "p3"]), &ConformConfig::default())
            .unwrap();
        let row = out.gsdb.table().get("c", "A").unwrap();
        assert_eq!(row.n, 3);
        assert!(row.active);
    }
}
