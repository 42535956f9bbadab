//! Multi-method result container.

use super::backend::GeneSetScore;
use crate::error::{GseaError, Result};
use crate::geneset::{ConformConfig, ConformWarning, GeneSetRow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Per-method result tables of one analysis, keyed by (collection, name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiGseaResult {
    pub name: String,
    /// Conform settings used for the run; `None` when the GeneSetDb was
    /// already conformed to the target and used as-is.
    pub conform: Option<ConformConfig>,
    /// Table rows of the gene sets that were scored.
    pub gene_sets: Vec<GeneSetRow>,
    /// Method name -> one score per scored gene set.
    pub methods: BTreeMap<String, Vec<GeneSetScore>>,
    /// Advisories raised while conforming.
    pub warnings: Vec<ConformWarning>,
}

impl MultiGseaResult {
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(String::as_str).collect()
    }

    /// Result table of one method.
    pub fn method(&self, method: &str) -> Result<&[GeneSetScore]> {
        self.methods
            .get(method)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                GseaError::InvalidParameter(format!(
                    "no results for method '{}' (available: {})",
                    method,
                    self.method_names().join(", ")
                ))
            })
    }

    /// Score of a single gene set under `method`.
    pub fn score(&self, method: &str, collection: &str, name: &str) -> Option<&GeneSetScore> {
        self.methods
            .get(method)?
            .iter()
            .find(|s| s.collection == collection && s.name == name)
    }

    /// Scores sorted by adjusted p-value, falling back to the raw p-value.
    /// Scores with neither come last.
    pub fn sorted_by_pvalue(&self, method: &str) -> Result<Vec<&GeneSetScore>> {
        let mut sorted: Vec<_> = self.method(method)?.iter().collect();
        let key = |s: &GeneSetScore| s.padj.or(s.pval).unwrap_or(f64::INFINITY);
        sorted.sort_by(|a, b| key(a).total_cmp(&key(b)));
        Ok(sorted)
    }

    /// Gene sets with adjusted p-value below `alpha`.
    pub fn significant_at(&self, method: &str, alpha: f64) -> Result<Vec<&GeneSetScore>> {
        Ok(self
            .method(method)?
            .iter()
            .filter(|s| s.is_significant_at(alpha))
            .collect())
    }

    /// Write one method's table to TSV. Missing p-values are written as `NA`.
    pub fn to_tsv<P: AsRef<Path>>(&self, method: &str, path: P) -> Result<()> {
        let scores = self.method(method)?;
        let mut writer = BufWriter::new(File::create(path)?);

        writeln!(writer, "collection\tname\tn\tstatistic\tpval\tpadj")?;
        let fmt_p = |p: Option<f64>| p.map_or_else(|| "NA".to_string(), |v| format!("{:.2e}", v));
        for s in scores {
            writeln!(
                writer,
                "{}\t{}\t{}\t{:.6}\t{}\t{}",
                s.collection,
                s.name,
                s.n,
                s.statistic,
                fmt_p(s.pval),
                fmt_p(s.padj)
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Save everything to a single JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geneset::GeneSetKey;
    use tempfile::NamedTempFile;

    fn result() -> MultiGseaResult {
        let a = GeneSetKey::new("H", "A");
        let b = GeneSetKey::new("H", "B");
        let mut methods = BTreeMap::new();
        methods.insert(
            "mean".to_string(),
            vec![GeneSetScore::new(&a, 3, 0.5), GeneSetScore::new(&b, 4, -1.0)],
        );
        methods.insert(
            "test".to_string(),
            vec![
                GeneSetScore {
                    padj: Some(0.2),
                    ..GeneSetScore::new(&a, 3, 1.0).with_pval(0.1)
                },
                GeneSetScore {
                    padj: Some(0.02),
                    ..GeneSetScore::new(&b, 4, 2.0).with_pval(0.01)
                },
            ],
        );
        MultiGseaResult {
            name: "run".to_string(),
            conform: Some(ConformConfig::default()),
            gene_sets: Vec::new(),
            methods,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_lookup() {
        let res = result();
        assert_eq!(res.method_names(), vec!["mean", "test"]);
        assert_eq!(res.score("test", "H", "B").unwrap().n, 4);
        assert!(res.score("test", "H", "C").is_none());
        assert!(matches!(res.method("camera"), Err(GseaError::InvalidParameter(_))));
    }

    #[test]
    fn test_sorted_and_significant() {
        let res = result();
        let sorted = res.sorted_by_pvalue("test").unwrap();
        assert_eq!(sorted[0].name, "B");
        assert_eq!(res.significant_at("test", 0.05).unwrap().len(), 1);
        assert!(res.significant_at("mean", 0.05).unwrap().is_empty());
    }

    #[test]
    fn test_tsv_writes_na() {
        let res = result();
        let file = NamedTempFile::new().unwrap();
        res.to_tsv("mean", file.path()).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("\tNA\tNA"));
    }

    #[test]
    fn test_json_roundtrip() {
        let res = result();
        let file = NamedTempFile::new().unwrap();
        res.save_json(file.path()).unwrap();
        assert_eq!(MultiGseaResult::load_json(file.path()).unwrap(), res);
    }
}
