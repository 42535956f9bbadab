//! The `GeneSetDb` container: construction, merging and removal.
//!
//! A `GeneSetDb` is a value. Every operation that changes it returns a new
//! instance, so the crosswalk and the gene set table are always replaced
//! together and never observed out of sync.

use super::crosswalk::Crosswalk;
use super::metadata::CollectionMetadata;
use super::table::{GeneSetRow, GeneSetTable};
use crate::error::{GseaError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// (collection, name) pair identifying a gene set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeneSetKey {
    pub collection: String,
    pub name: String,
}

impl GeneSetKey {
    pub fn new(collection: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            name: name.into(),
        }
    }

    /// `collection.name` label.
    pub fn label(&self) -> String {
        format!("{}.{}", self.collection, self.name)
    }
}

/// Input definition of a gene set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneSetDefinition {
    pub collection: String,
    pub name: String,
    pub feature_ids: Vec<String>,
}

impl GeneSetDefinition {
    pub fn new<I, S>(collection: impl Into<String>, name: impl Into<String>, feature_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collection: collection.into(),
            name: name.into(),
            feature_ids: feature_ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// One row of the definition table (`db`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeneSetMember {
    pub collection: String,
    pub name: String,
    pub feature_id: String,
}

/// A database of gene sets organised in collections.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneSetDb {
    pub(crate) db: Vec<GeneSetMember>,
    pub(crate) feature_id_map: Crosswalk,
    pub(crate) table: GeneSetTable,
    pub(crate) collection_metadata: CollectionMetadata,
}

impl GeneSetDb {
    /// Build a GeneSetDb from gene set definitions.
    ///
    /// Repeated (collection, name, feature_id) triples are collapsed and
    /// definitions sharing a (collection, name) are merged. The result is
    /// unconformed: all gene sets inactive and the crosswalk is the identity.
    pub fn new<I>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = GeneSetDefinition>,
    {
        let mut members = Vec::new();
        for def in definitions {
            if def.collection.is_empty() || def.name.is_empty() {
                return Err(GseaError::InvalidParameter(
                    "gene sets need a non-empty collection and name".to_string(),
                ));
            }
            if def.feature_ids.is_empty() {
                return Err(GseaError::InvalidParameter(format!(
                    "gene set {}/{} has no members",
                    def.collection, def.name
                )));
            }
            for feature_id in def.feature_ids {
                if feature_id.is_empty() {
                    return Err(GseaError::InvalidParameter(format!(
                        "gene set {}/{} contains an empty feature id",
                        def.collection, def.name
                    )));
                }
                members.push(GeneSetMember {
                    collection: def.collection.clone(),
                    name: def.name.clone(),
                    feature_id,
                });
            }
        }
        if members.is_empty() {
            return Err(GseaError::EmptyData("no gene sets provided".to_string()));
        }

        let db = normalize_members(members);
        let crosswalk = Crosswalk::identity(db.iter().map(|m| m.feature_id.as_str()));
        let gsdb = Self::from_parts(db, crosswalk, &CollectionMetadata::new());
        debug!(
            "Built GeneSetDb with {} gene sets over {} features",
            gsdb.table.len(),
            gsdb.feature_id_map.len()
        );
        Ok(gsdb)
    }

    /// Build from one collection of `(name, members)` pairs.
    pub fn from_sets<I, N, F, S>(collection: &str, sets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, F)>,
        N: Into<String>,
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            sets.into_iter()
                .map(|(name, features)| GeneSetDefinition::new(collection, name, features)),
        )
    }

    /// Assemble an unconformed instance around a grouped definition table.
    pub(crate) fn from_parts(
        db: Vec<GeneSetMember>,
        feature_id_map: Crosswalk,
        metadata: &CollectionMetadata,
    ) -> Self {
        let table = GeneSetTable::build(&db);
        let collection_metadata = metadata.refresh_counts(&table.collection_counts());
        Self {
            db,
            feature_id_map,
            table,
            collection_metadata,
        }
    }

    /// Merge two databases.
    ///
    /// Definitions and crosswalk entries are unioned, collection metadata is
    /// unioned with `self` winning on conflicts, and the table is rebuilt.
    /// Row resolutions from either side are discarded, so the result is
    /// always unconformed.
    pub fn append(&self, other: &GeneSetDb) -> GeneSetDb {
        let db = normalize_members(self.db.iter().chain(other.db.iter()).cloned().collect());
        let crosswalk = self.feature_id_map.union(&other.feature_id_map);
        let metadata = self.collection_metadata.union(&other.collection_metadata);
        let merged = Self::from_parts(db, crosswalk, &metadata);
        debug!(
            "Appended GeneSetDb ({} + {} gene sets -> {})",
            self.table.len(),
            other.table.len(),
            merged.table.len()
        );
        merged
    }

    /// Keep only the gene sets for which `keep` returns true.
    ///
    /// Activation and resolved rows of the kept sets are preserved.
    pub fn subset<F>(&self, keep: F) -> Result<GeneSetDb>
    where
        F: Fn(&GeneSetRow) -> bool,
    {
        let mut db = Vec::new();
        let mut activation = Vec::new();
        for (pos, row) in self.table.rows().iter().enumerate() {
            if keep(row) {
                db.extend_from_slice(&self.db[self.table.members(pos)]);
                activation.push((row.active, row.n));
            }
        }
        if db.is_empty() {
            return Err(GseaError::EmptyData(
                "subset would remove every gene set".to_string(),
            ));
        }

        let features: HashSet<&str> = db.iter().map(|m| m.feature_id.as_str()).collect();
        let crosswalk = self.feature_id_map.retain_features(&features);
        let mut out = Self::from_parts(db, crosswalk, &self.collection_metadata);
        out.table = out.table.with_activation(&activation);
        Ok(out)
    }

    /// Drop the listed gene sets. Every key must exist.
    pub fn remove_gene_sets(&self, keys: &[GeneSetKey]) -> Result<GeneSetDb> {
        for key in keys {
            self.has_gene_set(&key.collection, &key.name, true)?;
        }
        let drop: HashSet<(&str, &str)> = keys
            .iter()
            .map(|k| (k.collection.as_str(), k.name.as_str()))
            .collect();
        self.subset(|row| !drop.contains(&(row.collection.as_str(), row.name.as_str())))
    }

    /// Replace the crosswalk with new (feature_id, x_id) pairs.
    ///
    /// Every feature of the definition table must be mapped at least once.
    /// The result is unconformed.
    pub fn with_feature_id_map<I>(&self, pairs: I) -> Result<GeneSetDb>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let pairs: Vec<(String, String)> = pairs.into_iter().collect();
        if pairs.iter().any(|(f, x)| f.is_empty() || x.is_empty()) {
            return Err(GseaError::InvalidParameter(
                "feature id map cannot contain empty identifiers".to_string(),
            ));
        }
        let crosswalk = Crosswalk::from_pairs(pairs);
        let missing: Vec<&str> = self
            .db
            .iter()
            .map(|m| m.feature_id.as_str())
            .filter(|f| !crosswalk.contains_feature(f))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if !missing.is_empty() {
            return Err(GseaError::InvalidParameter(format!(
                "feature id map is missing {} feature(s) used by gene sets",
                missing.len()
            )));
        }
        Ok(Self::from_parts(
            self.db.clone(),
            crosswalk,
            &self.collection_metadata,
        ))
    }

    /// Definition table rows, grouped by (collection, name).
    pub fn members(&self) -> &[GeneSetMember] {
        &self.db
    }

    pub fn feature_id_map(&self) -> &Crosswalk {
        &self.feature_id_map
    }

    pub fn table(&self) -> &GeneSetTable {
        &self.table
    }

    /// Distinct collections.
    pub fn collections(&self) -> Vec<&str> {
        self.table.collections()
    }

    /// Number of gene sets.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Position of a gene set in the table, or an `UnknownGeneSet` error.
    pub(crate) fn position_of(&self, collection: &str, name: &str) -> Result<usize> {
        self.table
            .position(collection, name)
            .ok_or_else(|| GseaError::UnknownGeneSet {
                collection: collection.to_string(),
                name: name.to_string(),
            })
    }
}

/// Drop repeated triples (first occurrence kept) and group rows by
/// (collection, name), keeping member order within a set.
fn normalize_members(members: Vec<GeneSetMember>) -> Vec<GeneSetMember> {
    let mut seen: HashSet<GeneSetMember> = HashSet::with_capacity(members.len());
    let mut db: Vec<GeneSetMember> = members
        .into_iter()
        .filter(|m| seen.insert(m.clone()))
        .collect();
    db.sort_by(|a, b| {
        (a.collection.as_str(), a.name.as_str()).cmp(&(b.collection.as_str(), b.name.as_str()))
    });
    db
}
