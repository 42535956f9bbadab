//! Reading and writing gene set databases.
//!
//! - GMT: one gene set per line, `name<TAB>description<TAB>feature...`
//! - long TSV: `collection<TAB>name<TAB>feature_id` with a header row
//! - JSON: the complete database, including conformation state

use super::conform::{matched_sizes, MIN_GENE_SET_SIZE};
use super::crosswalk::{Crosswalk, CrosswalkEntry};
use super::db::{GeneSetDb, GeneSetDefinition, GeneSetMember};
use super::metadata::{CollectionMetadata, MetadataEntry};
use super::table::{GeneSetRow, GeneSetTable};
use crate::error::{GseaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Serialized form of a [`GeneSetDb`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeneSetDbRecord {
    db: Vec<GeneSetMember>,
    feature_id_map: Vec<CrosswalkEntry>,
    table: Vec<GeneSetRow>,
    collection_metadata: Vec<MetadataEntry>,
}

impl GeneSetDb {
    /// Load one collection from a GMT file.
    pub fn from_gmt<P: AsRef<Path>>(path: P, collection: &str) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut definitions = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 3 {
                return Err(GseaError::Parse {
                    line: i + 1,
                    reason: "expected name, description and at least one feature".to_string(),
                });
            }
            let features = fields[2..].iter().map(|f| f.trim()).filter(|f| !f.is_empty());
            definitions.push(GeneSetDefinition::new(collection, fields[0].trim(), features));
        }
        Self::new(definitions)
    }

    /// Write gene sets as GMT. The collection goes into the description
    /// column.
    pub fn to_gmt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for (pos, row) in self.table.rows().iter().enumerate() {
            write!(writer, "{}\t{}", row.name, row.collection)?;
            for member in &self.db[self.table.members(pos)] {
                write!(writer, "\t{}", member.feature_id)?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load a long-format TSV with a `collection`, `name`, `feature_id`
    /// header.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header = lines
            .next()
            .ok_or_else(|| GseaError::EmptyData("empty gene set file".to_string()))??;
        let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
        let column = |name: &str| {
            columns.iter().position(|c| *c == name).ok_or_else(|| GseaError::Parse {
                line: 1,
                reason: format!("missing '{}' column", name),
            })
        };
        let (ci, ni, fi) = (column("collection")?, column("name")?, column("feature_id")?);

        let mut definitions = Vec::new();
        for (i, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let field = |idx: usize| {
                fields.get(idx).copied().ok_or_else(|| GseaError::Parse {
                    line: i + 2,
                    reason: format!("expected at least {} columns", idx + 1),
                })
            };
            definitions.push(GeneSetDefinition::new(field(ci)?, field(ni)?, [field(fi)?]));
        }
        Self::new(definitions)
    }

    /// Write the definition table as long-format TSV.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "collection\tname\tfeature_id")?;
        for m in &self.db {
            writeln!(writer, "{}\t{}\t{}", m.collection, m.name, m.feature_id)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Serialize the whole database to JSON.
    ///
    /// Collections with a custom URL callback cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        if let Some(entry) = self
            .collection_metadata
            .entries()
            .iter()
            .find(|e| e.value.as_url().is_some_and(|u| !u.is_serializable()))
        {
            return Err(GseaError::InvalidParameter(format!(
                "collection '{}' uses a custom URL function that cannot be serialized",
                entry.collection
            )));
        }
        let record = GeneSetDbRecord {
            db: self.db.clone(),
            feature_id_map: self.feature_id_map.entries().to_vec(),
            table: self.table.rows().to_vec(),
            collection_metadata: self.collection_metadata.entries().to_vec(),
        };
        Ok(serde_json::to_string_pretty(&record)?)
    }

    /// Restore a database saved with [`GeneSetDb::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        let record: GeneSetDbRecord = serde_json::from_str(json)?;

        let table = GeneSetTable::build(&record.db);
        let same_layout = table.len() == record.table.len()
            && table
                .rows()
                .iter()
                .zip(&record.table)
                .all(|(a, b)| a.collection == b.collection && a.name == b.name && a.size == b.size);
        let seen: HashSet<GeneSetMember> = record.db.iter().cloned().collect();
        if !same_layout || seen.len() != record.db.len() {
            return Err(GseaError::InvalidParameter(
                "serialized gene set table does not match its definitions".to_string(),
            ));
        }

        let feature_id_map = Crosswalk::from_entries(record.feature_id_map);
        if record.db.iter().any(|m| !feature_id_map.contains_feature(&m.feature_id)) {
            return Err(GseaError::InvalidParameter(
                "serialized feature id map does not cover every feature".to_string(),
            ));
        }

        let conformed = feature_id_map.n_resolved() > 0;
        let matched = matched_sizes(&record.db, &table, &feature_id_map);
        for (row, &n) in record.table.iter().zip(&matched) {
            if row.n != n {
                return Err(GseaError::InvalidParameter(format!(
                    "serialized gene set {}/{} has n = {} but {} members resolve",
                    row.collection, row.name, row.n, n
                )));
            }
            if row.active && (!conformed || n < MIN_GENE_SET_SIZE) {
                return Err(GseaError::InvalidParameter(format!(
                    "serialized gene set {}/{} is active without enough resolved members",
                    row.collection, row.name
                )));
            }
        }

        let activation: Vec<(bool, usize)> = record.table.iter().map(|r| (r.active, r.n)).collect();
        let collection_metadata = CollectionMetadata::from_entries(record.collection_metadata)
            .refresh_counts(&table.collection_counts());
        Ok(GeneSetDb {
            table: table.with_activation(&activation),
            db: record.db,
            feature_id_map,
            collection_metadata,
        })
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geneset::conform::ConformConfig;
    use crate::geneset::metadata::{UrlFunction, COUNT_KEY};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample() -> GeneSetDb {
        GeneSetDb::new(vec![
            GeneSetDefinition::new("H", "APOPTOSIS", ["CASP3", "CASP8", "BAX", "TP53"]),
            GeneSetDefinition::new("H", "HYPOXIA", ["HIF1A", "VEGFA", "LDHA"]),
            GeneSetDefinition::new("C2", "KEGG_P53", ["TP53", "MDM2", "CDKN1A"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_read_gmt() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SET_A\thttp://x\tg1\tg2\tg3").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "SET_B\tna\tg2\tg4\t").unwrap();
        file.flush().unwrap();

        let gsdb = GeneSetDb::from_gmt(file.path(), "custom").unwrap();
        assert_eq!(gsdb.len(), 2);
        assert_eq!(gsdb.table().get("custom", "SET_B").unwrap().size, 2);
    }

    #[test]
    fn test_read_gmt_short_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SET_A\tdescription").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            GeneSetDb::from_gmt(file.path(), "custom"),
            Err(GseaError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_gmt_roundtrip_single_collection() {
        let gsdb =
            GeneSetDb::from_sets("H", vec![("A", vec!["g1", "g2"]), ("B", vec!["g3"])]).unwrap();
        let file = NamedTempFile::new().unwrap();
        gsdb.to_gmt(file.path()).unwrap();
        let loaded = GeneSetDb::from_gmt(file.path(), "H").unwrap();
        assert_eq!(loaded.members(), gsdb.members());
    }

    #[test]
    fn test_tsv_roundtrip() {
        let gsdb = sample();
        let file = NamedTempFile::new().unwrap();
        gsdb.to_tsv(file.path()).unwrap();
        let loaded = GeneSetDb::from_tsv(file.path()).unwrap();
        assert_eq!(loaded, gsdb);
    }

    #[test]
    fn test_tsv_missing_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "collection\tgene_set\tfeature_id").unwrap();
        writeln!(file, "c\tA\tg1").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            GeneSetDb::from_tsv(file.path()),
            Err(GseaError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_json_keeps_conformation() {
        let target: Vec<String> = ["TP53", "CASP3", "BAX", "MDM2", "CDKN1A", "CASP8"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let gsdb = sample()
            .with_url_function("H", UrlFunction::msigdb())
            .unwrap()
            .conform(&target, &ConformConfig::default())
            .unwrap()
            .into_inner();

        let file = NamedTempFile::new().unwrap();
        gsdb.save_json(file.path()).unwrap();
        let loaded = GeneSetDb::load_json(file.path()).unwrap();
        assert_eq!(loaded, gsdb);
        assert!(loaded.is_conformed_to(&target));
    }

    #[test]
    fn test_json_rejects_custom_url() {
        let gsdb = sample()
            .with_url_function("H", UrlFunction::custom(|_: &str, n: &str| n.to_string()))
            .unwrap();
        assert!(gsdb.to_json().is_err());
    }

    #[test]
    fn test_json_rejects_stale_activation() {
        let json = sample().to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        value["table"][0]["active"] = serde_json::Value::Bool(true);
        value["table"][0]["n"] = serde_json::json!(99);
        assert!(matches!(
            GeneSetDb::from_json(&value.to_string()),
            Err(GseaError::InvalidParameter(_))
        ));

        // active on an unconformed db, with a consistent n of 0
        value["table"][0]["n"] = serde_json::json!(0);
        assert!(matches!(
            GeneSetDb::from_json(&value.to_string()),
            Err(GseaError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_json_refreshes_counts() {
        let gsdb = sample();
        let json = gsdb.to_json().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let entries = value["collection_metadata"].as_array_mut().unwrap();
        for entry in entries.iter_mut() {
            if entry["key"] == COUNT_KEY {
                entry["value"] = serde_json::json!({ "Count": 42 });
            }
        }
        entries.push(serde_json::json!({
            "collection": "GHOST",
            "key": "organism",
            "value": { "Text": "human" }
        }));

        let loaded = GeneSetDb::from_json(&value.to_string()).unwrap();
        assert_eq!(loaded, gsdb);
        assert!(!loaded.has_gene_set_collection(&["GHOST"], false).unwrap()[0]);
    }
}
