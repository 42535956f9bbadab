//! Gene set × feature incidence matrix.

use super::db::{GeneSetDb, GeneSetKey};
use super::query::{FeatureIdQuery, IdValue};
use crate::error::Result;
use sprs::{CsMat, TriMat};
use std::collections::{HashMap, HashSet};

/// Sparse 0/1 membership matrix, gene sets in rows.
#[derive(Debug, Clone)]
pub struct IncidenceMatrix {
    pub data: CsMat<u8>,
    pub gene_sets: Vec<GeneSetKey>,
    /// Column identifiers: target row ids when conformed, feature ids
    /// otherwise.
    pub features: Vec<String>,
}

impl IncidenceMatrix {
    /// Whether `feature` is a member of the gene set in row `row`.
    pub fn contains(&self, row: usize, feature: &str) -> bool {
        self.features
            .iter()
            .position(|f| f == feature)
            .and_then(|col| self.data.get(row, col))
            .is_some()
    }
}

impl GeneSetDb {
    /// Build the incidence matrix of (optionally only active) gene sets.
    ///
    /// When conformed, columns are the resolved target identifiers ordered
    /// by target row; otherwise they are the native feature identifiers in
    /// first-seen order.
    pub fn incidence_matrix(&self, active_only: bool) -> Result<IncidenceMatrix> {
        let conformed = self.is_conformed();
        let query = FeatureIdQuery::new()
            .value(if conformed { IdValue::XId } else { IdValue::FeatureId })
            .active_only(false);

        let mut gene_sets = Vec::new();
        let mut members = Vec::new();
        for row in self.gene_sets(Some(active_only)) {
            let ids = self.member_ids(&row.collection, &row.name, &query)?;
            gene_sets.push(GeneSetKey::new(row.collection.as_str(), row.name.as_str()));
            members.push(ids);
        }

        let features: Vec<String> = if conformed {
            let mut resolved: Vec<(usize, &str)> = self
                .feature_id_map
                .entries()
                .iter()
                .filter_map(|e| e.x_idx.map(|idx| (idx, e.x_id.as_str())))
                .collect();
            resolved.sort_unstable();
            resolved.dedup();
            resolved.into_iter().map(|(_, id)| id.to_string()).collect()
        } else {
            let mut seen = HashSet::new();
            self.db
                .iter()
                .filter(|m| seen.insert(m.feature_id.as_str()))
                .map(|m| m.feature_id.clone())
                .collect()
        };
        let column: HashMap<&str, usize> = features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.as_str(), i))
            .collect();

        let mut tri = TriMat::new((gene_sets.len(), features.len()));
        for (row, ids) in members.iter().enumerate() {
            for id in ids {
                if let Some(&col) = column.get(id.as_str()) {
                    tri.add_triplet(row, col, 1u8);
                }
            }
        }

        Ok(IncidenceMatrix {
            data: tri.to_csr(),
            gene_sets,
            features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geneset::conform::ConformConfig;
    use crate::geneset::db::GeneSetDefinition;

    fn gsdb() -> GeneSetDb {
        GeneSetDb::new(vec![
            GeneSetDefinition::new("c", "A", ["g1", "g2", "g3", "g4"]),
            GeneSetDefinition::new("c", "B", ["g1", "g2"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_unconformed_incidence() {
        let inc = gsdb().incidence_matrix(false).unwrap();
        assert_eq!(inc.data.shape(), (2, 4));
        assert_eq!(inc.features, vec!["g1", "g2", "g3", "g4"]);
        assert_eq!(inc.data.nnz(), 6);
        assert!(inc.contains(1, "g2"));
        assert!(!inc.contains(1, "g3"));
    }

    #[test]
    fn test_conformed_incidence_uses_target_order() {
        let target: Vec<String> = ["g3", "g2", "g1", "g9"].iter().map(|s| s.to_string()).collect();
        let conformed = gsdb()
            .conform(&target, &ConformConfig::default())
            .unwrap()
            .into_inner();
        let inc = conformed.incidence_matrix(true).unwrap();
        assert_eq!(inc.gene_sets, vec![GeneSetKey::new("c", "A")]);
        assert_eq!(inc.features, vec!["g3", "g2", "g1"]);
        assert_eq!(inc.data.nnz(), 3);
    }
}
