//! Read-only queries and metadata accessors on a GeneSetDb.

use super::db::GeneSetDb;
use super::metadata::{MetaValue, MetadataEntry, UrlFunction, COUNT_KEY, URL_FUNCTION_KEY};
use super::table::GeneSetRow;
use crate::error::{GseaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Which representation of a gene set's members to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdValue {
    /// Native gene set identifiers.
    #[default]
    FeatureId,
    /// Target row identifiers.
    XId,
    /// Target row positions.
    XIdx,
}

/// Options for [`GeneSetDb::feature_ids`] and [`GeneSetDb::gene_set`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureIdQuery {
    pub value: IdValue,
    /// Include members that did not resolve against the target.
    pub fetch_all: bool,
    /// Refuse inactive gene sets. `None` means "only when conformed".
    pub active_only: Option<bool>,
}

impl FeatureIdQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: IdValue) -> Self {
        self.value = value;
        self
    }

    pub fn fetch_all(mut self, fetch_all: bool) -> Self {
        self.fetch_all = fetch_all;
        self
    }

    pub fn active_only(mut self, active_only: bool) -> Self {
        self.active_only = Some(active_only);
        self
    }
}

/// Member identifiers in one representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureValues {
    Ids(Vec<String>),
    Indices(Vec<usize>),
}

impl FeatureValues {
    pub fn len(&self) -> usize {
        match self {
            FeatureValues::Ids(v) => v.len(),
            FeatureValues::Indices(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_ids(&self) -> Option<&[String]> {
        match self {
            FeatureValues::Ids(v) => Some(v),
            FeatureValues::Indices(_) => None,
        }
    }

    pub fn as_indices(&self) -> Option<&[usize]> {
        match self {
            FeatureValues::Indices(v) => Some(v),
            FeatureValues::Ids(_) => None,
        }
    }
}

/// One member of a gene set joined with its crosswalk entry and the gene
/// set's table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSetMemberRecord {
    pub collection: String,
    pub name: String,
    pub active: bool,
    pub n: usize,
    #[serde(rename = "N")]
    pub size: usize,
    pub feature_id: String,
    pub x_id: Option<String>,
    pub x_idx: Option<usize>,
}

impl GeneSetDb {
    /// Check which of `collections` exist. With `as_error`, report every
    /// missing collection in one error instead.
    pub fn has_gene_set_collection(
        &self,
        collections: &[&str],
        as_error: bool,
    ) -> Result<Vec<bool>> {
        let found: Vec<bool> = collections
            .iter()
            .map(|c| self.collection_metadata.has_collection(c))
            .collect();
        if as_error && found.iter().any(|f| !f) {
            let missing = collections
                .iter()
                .zip(&found)
                .filter(|(_, f)| !**f)
                .map(|(c, _)| c.to_string())
                .collect();
            return Err(GseaError::MissingCollections(missing));
        }
        Ok(found)
    }

    /// Whether the gene set exists, regardless of its activation.
    ///
    /// Only the (collection, name) pair is checked; a missing collection is
    /// reported the same way as a missing name.
    pub fn has_gene_set(&self, collection: &str, name: &str, as_error: bool) -> Result<bool> {
        let found = self.table.position(collection, name).is_some();
        if as_error && !found {
            return Err(GseaError::UnknownGeneSet {
                collection: collection.to_string(),
                name: name.to_string(),
            });
        }
        Ok(found)
    }

    /// Gene set table rows. `active_only` defaults to [`Self::is_conformed`].
    pub fn gene_sets(&self, active_only: Option<bool>) -> Vec<&GeneSetRow> {
        let active_only = active_only.unwrap_or_else(|| self.is_conformed());
        self.table
            .rows()
            .iter()
            .filter(|r| !active_only || r.active)
            .collect()
    }

    /// Member records of one gene set, one per crosswalk entry.
    ///
    /// Members without any crosswalk entry yield one record with no `x_id`.
    pub fn gene_set(
        &self,
        collection: &str,
        name: &str,
        query: &FeatureIdQuery,
    ) -> Result<Vec<GeneSetMemberRecord>> {
        let pos = self.checked_position(collection, name, query.active_only)?;
        let row = &self.table.rows()[pos];
        let restrict = !query.fetch_all && self.is_conformed();

        let mut records = Vec::new();
        for member in &self.db[self.table.members(pos)] {
            let record = |x_id: Option<String>, x_idx: Option<usize>| GeneSetMemberRecord {
                collection: row.collection.clone(),
                name: row.name.clone(),
                active: row.active,
                n: row.n,
                size: row.size,
                feature_id: member.feature_id.clone(),
                x_id,
                x_idx,
            };
            let mut mapped = false;
            for entry in self.feature_id_map.lookup(&member.feature_id) {
                mapped = true;
                if !restrict || entry.x_idx.is_some() {
                    records.push(record(Some(entry.x_id.clone()), entry.x_idx));
                }
            }
            if !mapped && !restrict {
                records.push(record(None, None));
            }
        }
        Ok(records)
    }

    /// Members of one gene set in the representation asked for.
    ///
    /// Unless `fetch_all` is set, a conformed database only reports members
    /// that resolved against its target. Values are de-duplicated in member
    /// order. Unresolved members have no row position, so `XIdx` never
    /// reports them.
    pub fn feature_ids(
        &self,
        collection: &str,
        name: &str,
        query: &FeatureIdQuery,
    ) -> Result<FeatureValues> {
        let records = self.gene_set(collection, name, query)?;
        Ok(project(&records, query.value))
    }

    /// URL of a gene set from its collection's URL function.
    pub fn gene_set_url(&self, collection: &str, name: &str) -> Result<String> {
        self.has_gene_set(collection, name, true)?;
        let func = self.url_function(collection)?;
        Ok(func.url(collection, name))
    }

    fn url_function(&self, collection: &str) -> Result<&UrlFunction> {
        self.collection_metadata
            .get(collection, URL_FUNCTION_KEY)
            .and_then(MetaValue::as_url)
            .ok_or_else(|| GseaError::UnregisteredMetadata {
                collection: collection.to_string(),
                key: URL_FUNCTION_KEY.to_string(),
            })
    }

    /// The whole collection metadata table.
    pub fn collection_metadata(&self) -> &[MetadataEntry] {
        self.collection_metadata.entries()
    }

    /// Metadata entries of one collection.
    pub fn collection_metadata_for(&self, collection: &str) -> Result<Vec<&MetadataEntry>> {
        self.has_gene_set_collection(&[collection], true)?;
        Ok(self.collection_metadata.for_collection(collection))
    }

    /// One metadata value.
    pub fn collection_metadata_value(&self, collection: &str, key: &str) -> Result<&MetaValue> {
        self.has_gene_set_collection(&[collection], true)?;
        self.collection_metadata
            .get(collection, key)
            .ok_or_else(|| GseaError::UnregisteredMetadata {
                collection: collection.to_string(),
                key: key.to_string(),
            })
    }

    /// Copy with one metadata value set. The collection must exist.
    ///
    /// `url_function` entries must hold a valid [`UrlFunction`]; `count` is
    /// maintained by the database and cannot be written.
    pub fn with_collection_metadata(
        &self,
        collection: &str,
        key: &str,
        value: MetaValue,
    ) -> Result<GeneSetDb> {
        self.has_gene_set_collection(&[collection], true)?;
        if key.is_empty() {
            return Err(GseaError::InvalidParameter("metadata key cannot be empty".to_string()));
        }
        if key == COUNT_KEY {
            return Err(GseaError::InvalidParameter(format!(
                "'{}' metadata is maintained automatically",
                COUNT_KEY
            )));
        }
        if key == URL_FUNCTION_KEY {
            match &value {
                MetaValue::Url(func) => func.validate()?,
                _ => {
                    return Err(GseaError::InvalidParameter(format!(
                        "'{}' must hold a URL function",
                        URL_FUNCTION_KEY
                    )))
                }
            }
        }
        Ok(GeneSetDb {
            db: self.db.clone(),
            feature_id_map: self.feature_id_map.clone(),
            table: self.table.clone(),
            collection_metadata: self.collection_metadata.with_value(collection, key, value),
        })
    }

    /// Copy with the collection's URL function set.
    pub fn with_url_function(&self, collection: &str, func: UrlFunction) -> Result<GeneSetDb> {
        self.with_collection_metadata(collection, URL_FUNCTION_KEY, MetaValue::Url(func))
    }

    /// Unroll gene sets into `collection.name -> members` in the chosen target
    /// representation (`XIdx` or `XId`). Requires a conformed database.
    pub fn as_expression_indexes(
        &self,
        value: IdValue,
        active_only: bool,
    ) -> Result<BTreeMap<String, FeatureValues>> {
        if value == IdValue::FeatureId {
            return Err(GseaError::InvalidParameter(
                "expression indexes are reported as x_idx or x_id".to_string(),
            ));
        }
        self.ensure_conformed()?;
        let query = FeatureIdQuery::new().value(value).active_only(false);
        let mut out = BTreeMap::new();
        for row in self.gene_sets(Some(active_only)) {
            let values = self.feature_ids(&row.collection, &row.name, &query)?;
            out.insert(row.label(), values);
        }
        Ok(out)
    }

    /// Row positions of every (active) gene set, keyed by `collection.name`.
    pub fn expression_row_indexes(
        &self,
        active_only: bool,
    ) -> Result<BTreeMap<String, Vec<usize>>> {
        self.ensure_conformed()?;
        let query = FeatureIdQuery::new().active_only(false);
        let mut out = BTreeMap::new();
        for row in self.gene_sets(Some(active_only)) {
            let rows = self.member_rows(&row.collection, &row.name, &query)?;
            out.insert(row.label(), rows);
        }
        Ok(out)
    }

    /// Resolved target rows of one gene set, de-duplicated in member order.
    /// `query.value` is ignored.
    pub(crate) fn member_rows(
        &self,
        collection: &str,
        name: &str,
        query: &FeatureIdQuery,
    ) -> Result<Vec<usize>> {
        Ok(x_idx_values(&self.gene_set(collection, name, query)?))
    }

    /// Identifiers of one gene set as feature ids or target row ids.
    pub(crate) fn member_ids(
        &self,
        collection: &str,
        name: &str,
        query: &FeatureIdQuery,
    ) -> Result<Vec<String>> {
        let records = self.gene_set(collection, name, query)?;
        match query.value {
            IdValue::FeatureId => Ok(feature_id_values(&records)),
            IdValue::XId => Ok(x_id_values(&records)),
            IdValue::XIdx => Err(GseaError::InvalidParameter(
                "x_idx values are row positions, not identifiers".to_string(),
            )),
        }
    }

    fn ensure_conformed(&self) -> Result<()> {
        if !self.is_conformed() {
            return Err(GseaError::NotConformed(
                "conform the GeneSetDb before building expression indexes".to_string(),
            ));
        }
        Ok(())
    }

    /// Table position after the existence and activation checks shared by
    /// member queries.
    fn checked_position(
        &self,
        collection: &str,
        name: &str,
        active_only: Option<bool>,
    ) -> Result<usize> {
        let pos = self.position_of(collection, name)?;
        let active_only = active_only.unwrap_or_else(|| self.is_conformed());
        if active_only && !self.table.rows()[pos].active {
            return Err(GseaError::InactiveGeneSet {
                collection: collection.to_string(),
                name: name.to_string(),
            });
        }
        Ok(pos)
    }
}

fn project(records: &[GeneSetMemberRecord], value: IdValue) -> FeatureValues {
    match value {
        IdValue::FeatureId => FeatureValues::Ids(feature_id_values(records)),
        IdValue::XId => FeatureValues::Ids(x_id_values(records)),
        IdValue::XIdx => FeatureValues::Indices(x_idx_values(records)),
    }
}

fn feature_id_values(records: &[GeneSetMemberRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.feature_id.as_str()))
        .map(|r| r.feature_id.clone())
        .collect()
}

fn x_id_values(records: &[GeneSetMemberRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| r.x_id.as_deref())
        .filter(|x| seen.insert(*x))
        .map(String::from)
        .collect()
}

fn x_idx_values(records: &[GeneSetMemberRecord]) -> Vec<usize> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| r.x_idx)
        .filter(|i| seen.insert(*i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geneset::conform::ConformConfig;
    use crate::geneset::db::GeneSetDefinition;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn conformed() -> GeneSetDb {
        GeneSetDb::new(vec![
            GeneSetDefinition::new("c", "A", ["g1", "g2", "g3", "g4"]),
            GeneSetDefinition::new("c", "B", ["g1", "g2"]),
        ])
        .unwrap()
        .conform(&ids(&["g1", "g2", "g3", "g9"]), &ConformConfig::default())
        .unwrap()
        .into_inner()
    }

    #[test]
    fn test_has_gene_set() {
        let gsdb = conformed();
        assert!(gsdb.has_gene_set("c", "B", false).unwrap());
        assert!(!gsdb.has_gene_set("c", "Z", false).unwrap());
        assert!(matches!(
            gsdb.has_gene_set("nope", "A", true),
            Err(GseaError::UnknownGeneSet { .. })
        ));
    }

    #[test]
    fn test_has_collection_lists_all_missing() {
        let gsdb = conformed();
        assert_eq!(gsdb.has_gene_set_collection(&["c", "x"], false).unwrap(), vec![true, false]);
        match gsdb.has_gene_set_collection(&["x", "c", "y"], true) {
            Err(GseaError::MissingCollections(missing)) => assert_eq!(missing, vec!["x", "y"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_gene_sets_default_views() {
        let gsdb = conformed();
        assert_eq!(gsdb.gene_sets(None).len(), 1);
        assert_eq!(gsdb.gene_sets(Some(false)).len(), 2);
        assert_eq!(gsdb.unconform().gene_sets(None).len(), 2);
    }

    #[test]
    fn test_feature_ids_inactive_guard() {
        let gsdb = conformed();
        assert!(matches!(
            gsdb.feature_ids("c", "B", &FeatureIdQuery::new()),
            Err(GseaError::InactiveGeneSet { .. })
        ));
        let b = gsdb
            .feature_ids("c", "B", &FeatureIdQuery::new().active_only(false))
            .unwrap();
        assert_eq!(b, FeatureValues::Ids(ids(&["g1", "g2"])));
    }

    #[test]
    fn test_feature_ids_representations() {
        let gsdb = conformed();
        let matched = gsdb.feature_ids("c", "A", &FeatureIdQuery::new()).unwrap();
        assert_eq!(matched, FeatureValues::Ids(ids(&["g1", "g2", "g3"])));

        let all = gsdb
            .feature_ids("c", "A", &FeatureIdQuery::new().fetch_all(true))
            .unwrap();
        assert_eq!(all.len(), 4);

        let idx = gsdb
            .feature_ids("c", "A", &FeatureIdQuery::new().value(IdValue::XIdx))
            .unwrap();
        assert_eq!(idx, FeatureValues::Indices(vec![0, 1, 2]));

        assert!(matches!(
            gsdb.feature_ids("c", "Q", &FeatureIdQuery::new()),
            Err(GseaError::UnknownGeneSet { .. })
        ));
    }

    #[test]
    fn test_gene_set_records() {
        let gsdb = conformed();
        let all = gsdb
            .gene_set("c", "A", &FeatureIdQuery::new().fetch_all(true))
            .unwrap();
        assert_eq!(all.len(), 4);
        let g4 = all.iter().find(|r| r.feature_id == "g4").unwrap();
        assert_eq!(g4.x_idx, None);
        assert_eq!(g4.x_id.as_deref(), Some("g4"));
        assert!(all.iter().all(|r| r.active && r.n == 3 && r.size == 4));
    }

    #[test]
    fn test_url_functions() {
        let gsdb = conformed();
        assert!(matches!(
            gsdb.gene_set_url("c", "A"),
            Err(GseaError::UnregisteredMetadata { .. })
        ));

        let url = UrlFunction::template("https://db.org/{collection}/{name}").unwrap();
        let gsdb = gsdb.with_url_function("c", url).unwrap();
        assert_eq!(gsdb.gene_set_url("c", "A").unwrap(), "https://db.org/c/A");
        assert!(gsdb.gene_set_url("c", "missing").is_err());

        assert!(gsdb
            .with_url_function("c", UrlFunction::Template("https://db.org/".to_string()))
            .is_err());
        assert!(gsdb.with_url_function("other", UrlFunction::msigdb()).is_err());
        assert!(gsdb
            .with_collection_metadata("c", URL_FUNCTION_KEY, "not a function".into())
            .is_err());
    }

    #[test]
    fn test_metadata_accessors() {
        let gsdb = conformed()
            .with_collection_metadata("c", "organism", "Homo sapiens".into())
            .unwrap();
        assert!(gsdb.is_conformed());
        assert_eq!(gsdb.collection_metadata_for("c").unwrap().len(), 2);
        assert_eq!(
            gsdb.collection_metadata_value("c", "organism").unwrap().as_text(),
            Some("Homo sapiens")
        );
        assert!(matches!(
            gsdb.collection_metadata_value("c", "id_type"),
            Err(GseaError::UnregisteredMetadata { .. })
        ));
        assert!(gsdb.collection_metadata_for("x").is_err());
        assert!(gsdb.with_collection_metadata("c", COUNT_KEY, MetaValue::Count(9)).is_err());
        assert_eq!(gsdb.collection_metadata().len(), 2);
    }

    #[test]
    fn test_expression_indexes() {
        let gsdb = conformed();
        let idx = gsdb.expression_row_indexes(true).unwrap();
        assert_eq!(idx.len(), 1);
        assert_eq!(idx["c.A"], vec![0, 1, 2]);

        let all = gsdb.as_expression_indexes(IdValue::XId, false).unwrap();
        assert_eq!(all["c.B"], FeatureValues::Ids(ids(&["g1", "g2"])));

        assert!(gsdb.as_expression_indexes(IdValue::FeatureId, true).is_err());
        assert!(matches!(
            gsdb.unconform().expression_row_indexes(true),
            Err(GseaError::NotConformed(_))
        ));
    }

    #[test]
    fn test_member_rows_and_ids() {
        let gsdb = conformed();
        let query = FeatureIdQuery::new().active_only(false).fetch_all(true);

        // unresolved g4 has no row
        assert_eq!(gsdb.member_rows("c", "A", &query).unwrap(), vec![0, 1, 2]);
        assert_eq!(
            gsdb.member_ids("c", "A", &query).unwrap(),
            ids(&["g1", "g2", "g3", "g4"])
        );
        let x_ids = gsdb
            .member_ids("c", "A", &query.clone().value(IdValue::XId))
            .unwrap();
        assert_eq!(x_ids, ids(&["g1", "g2", "g3", "g4"]));
        assert!(gsdb
            .member_ids("c", "A", &query.value(IdValue::XIdx))
            .is_err());
    }
}
