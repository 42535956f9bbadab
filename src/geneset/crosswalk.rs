//! Feature identifier crosswalk (the `featureIdMap`).
//!
//! Maps gene-set-native feature identifiers to the row identifiers of a
//! target expression object and, once conformed, to row positions.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One (featureId, x.id) pair and its resolved row position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrosswalkEntry {
    /// Identifier as it appears in the gene set definitions.
    pub feature_id: String,
    /// Identifier as it appears in the target's row labels.
    pub x_id: String,
    /// Row of `x_id` in the target, if resolved.
    pub x_idx: Option<usize>,
}

/// Crosswalk table, unique by (feature_id, x_id).
///
/// A feature may fan out to several `x_id`s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Crosswalk {
    entries: Vec<CrosswalkEntry>,
    by_feature: HashMap<String, Vec<usize>>,
}

impl Crosswalk {
    /// Identity mapping (featureId -> featureId), unresolved.
    pub(crate) fn identity<'a, I>(feature_ids: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::from_pairs(
            feature_ids
                .into_iter()
                .map(|fid| (fid.to_string(), fid.to_string())),
        )
    }

    /// Build from (feature_id, x_id) pairs, dropping repeated pairs.
    /// All entries start unresolved.
    pub(crate) fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::from_entries(pairs.into_iter().map(|(feature_id, x_id)| CrosswalkEntry {
            feature_id,
            x_id,
            x_idx: None,
        }))
    }

    /// Build from full entries, keeping the first entry for each pair.
    pub(crate) fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = CrosswalkEntry>,
    {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let entries: Vec<CrosswalkEntry> = entries
            .into_iter()
            .filter(|e| seen.insert((e.feature_id.clone(), e.x_id.clone())))
            .collect();
        Self::with_index(entries)
    }

    fn with_index(entries: Vec<CrosswalkEntry>) -> Self {
        let mut by_feature: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            by_feature.entry(entry.feature_id.clone()).or_default().push(i);
        }
        Self {
            entries,
            by_feature,
        }
    }

    pub fn entries(&self) -> &[CrosswalkEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries for one feature, in table order.
    pub fn lookup<'a>(&'a self, feature_id: &str) -> impl Iterator<Item = &'a CrosswalkEntry> + 'a {
        self.by_feature
            .get(feature_id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.entries[i])
    }

    /// Whether the feature has at least one crosswalk entry.
    pub fn contains_feature(&self, feature_id: &str) -> bool {
        self.by_feature.contains_key(feature_id)
    }

    /// Whether any entry of the feature resolved to a target row.
    pub fn is_feature_resolved(&self, feature_id: &str) -> bool {
        self.lookup(feature_id).any(|e| e.x_idx.is_some())
    }

    /// Number of entries with a resolved row.
    pub fn n_resolved(&self) -> usize {
        self.entries.iter().filter(|e| e.x_idx.is_some()).count()
    }

    /// Fraction of entries with a resolved row.
    pub fn fraction_resolved(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.n_resolved() as f64 / self.entries.len() as f64
    }

    /// New crosswalk with every `x_id` looked up in `row_ids`.
    ///
    /// Duplicated row identifiers resolve to their first occurrence.
    pub(crate) fn resolve(&self, row_ids: &[String]) -> Self {
        let mut positions: HashMap<&str, usize> = HashMap::with_capacity(row_ids.len());
        for (i, id) in row_ids.iter().enumerate() {
            positions.entry(id.as_str()).or_insert(i);
        }
        let entries = self
            .entries
            .iter()
            .map(|e| CrosswalkEntry {
                feature_id: e.feature_id.clone(),
                x_id: e.x_id.clone(),
                x_idx: positions.get(e.x_id.as_str()).copied(),
            })
            .collect();
        Self::with_index(entries)
    }

    /// New crosswalk with every row position cleared.
    pub(crate) fn unresolve(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|e| CrosswalkEntry {
                x_idx: None,
                ..e.clone()
            })
            .collect();
        Self::with_index(entries)
    }

    /// Union of two crosswalks, unresolved. Fan-out from both sides is kept.
    pub(crate) fn union(&self, other: &Crosswalk) -> Self {
        Self::from_entries(
            self.entries
                .iter()
                .chain(other.entries.iter())
                .map(|e| CrosswalkEntry {
                    x_idx: None,
                    ..e.clone()
                }),
        )
    }

    /// Keep only entries whose feature is in `features`. Resolution is kept.
    pub(crate) fn retain_features(&self, features: &HashSet<&str>) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|e| features.contains(e.feature_id.as_str()))
            .cloned()
            .collect();
        Self::with_index(entries)
    }
}
