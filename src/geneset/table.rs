//! Per gene set summary table with a (collection, name) index.

use super::db::GeneSetMember;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

/// One row of the gene set table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSetRow {
    pub collection: String,
    pub name: String,
    /// Whether the set passed the size filter of the last conform.
    pub active: bool,
    /// Members matched to the target during the last conform.
    pub n: usize,
    /// Total members.
    #[serde(rename = "N")]
    pub size: usize,
}

impl GeneSetRow {
    /// `collection.name` label used to key expression indexes.
    pub fn label(&self) -> String {
        format!("{}.{}", self.collection, self.name)
    }
}

/// Gene set table.
///
/// Row `i` owns the member rows `members[i]` of the (grouped) definition
/// table it was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneSetTable {
    rows: Vec<GeneSetRow>,
    members: Vec<Range<usize>>,
    index: HashMap<String, HashMap<String, usize>>,
}

impl GeneSetTable {
    /// Build an inactive table from definition rows grouped by
    /// (collection, name).
    pub(crate) fn build(db: &[GeneSetMember]) -> Self {
        let mut rows: Vec<GeneSetRow> = Vec::new();
        let mut members: Vec<Range<usize>> = Vec::new();
        let mut start = 0;
        for i in 1..=db.len() {
            let boundary = i == db.len()
                || db[i].collection != db[start].collection
                || db[i].name != db[start].name;
            if boundary {
                rows.push(GeneSetRow {
                    collection: db[start].collection.clone(),
                    name: db[start].name.clone(),
                    active: false,
                    n: 0,
                    size: i - start,
                });
                members.push(start..i);
                start = i;
            }
        }
        Self::with_layout(rows, members)
    }

    fn with_layout(rows: Vec<GeneSetRow>, members: Vec<Range<usize>>) -> Self {
        let mut index: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            index
                .entry(row.collection.clone())
                .or_default()
                .insert(row.name.clone(), i);
        }
        Self {
            rows,
            members,
            index,
        }
    }

    /// Same layout with the activation columns replaced.
    ///
    /// `stats[i]` is `(active, n)` for row `i`.
    pub(crate) fn with_activation(&self, stats: &[(bool, usize)]) -> Self {
        let rows = self
            .rows
            .iter()
            .zip(stats)
            .map(|(row, &(active, n))| GeneSetRow {
                active,
                n,
                ..row.clone()
            })
            .collect();
        Self {
            rows,
            members: self.members.clone(),
            index: self.index.clone(),
        }
    }

    /// Same layout, everything inactive and unmatched.
    pub(crate) fn deactivated(&self) -> Self {
        let stats = vec![(false, 0); self.rows.len()];
        self.with_activation(&stats)
    }

    pub fn rows(&self) -> &[GeneSetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row position of a gene set.
    ///
    /// Internal callers go through this instead of `GeneSetDb::has_gene_set`
    /// to skip its argument handling.
    pub(crate) fn position(&self, collection: &str, name: &str) -> Option<usize> {
        self.index.get(collection)?.get(name).copied()
    }

    pub fn get(&self, collection: &str, name: &str) -> Option<&GeneSetRow> {
        self.position(collection, name).map(|i| &self.rows[i])
    }

    /// Definition rows belonging to the gene set at `position`.
    pub(crate) fn members(&self, position: usize) -> Range<usize> {
        self.members[position].clone()
    }

    /// Distinct collections in table order.
    pub fn collections(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for row in &self.rows {
            if out.last() != Some(&row.collection.as_str()) {
                out.push(&row.collection);
            }
        }
        out
    }

    /// Number of gene sets per collection.
    pub fn collection_counts(&self) -> HashMap<&str, usize> {
        self.index
            .iter()
            .map(|(c, names)| (c.as_str(), names.len()))
            .collect()
    }
}
