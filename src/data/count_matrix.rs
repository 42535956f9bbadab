//! Sparse count matrix (RNA-seq style) usable as a conformation target.

use crate::data::target::RowIdentifiers;
use crate::error::{GseaError, Result};
use sprs::{CsMat, TriMat};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Raw counts with features in rows and samples in columns.
///
/// Stored in CSR format since gene sets index rows.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    data: CsMat<u64>,
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a new CountMatrix from a sparse matrix and identifiers.
    pub fn new(
        data: CsMat<u64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(GseaError::DimensionMismatch {
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(GseaError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        let data = if data.is_csr() { data } else { data.to_csr() };
        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Load counts from a TSV file whose header row names the samples and
    /// whose first column holds feature identifiers.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| GseaError::EmptyData("empty count file".to_string()))??;
        let sample_ids: Vec<String> = header_line
            .split('\t')
            .skip(1)
            .map(|s| s.to_string())
            .collect();
        if sample_ids.is_empty() {
            return Err(GseaError::EmptyData(
                "count file must have at least one sample column".to_string(),
            ));
        }

        let mut feature_ids = Vec::new();
        let mut triplets = Vec::new();
        for (offset, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != sample_ids.len() + 1 {
                return Err(GseaError::Parse {
                    line: offset + 2,
                    reason: format!(
                        "expected {} columns, found {}",
                        sample_ids.len() + 1,
                        fields.len()
                    ),
                });
            }
            let row = feature_ids.len();
            let feature_id = fields[0].to_string();
            for (col, raw) in fields[1..].iter().enumerate() {
                let value: u64 = raw.trim().parse().map_err(|_| GseaError::Parse {
                    line: offset + 2,
                    reason: format!("invalid count '{}'", raw),
                })?;
                if value > 0 {
                    triplets.push((row, col, value));
                }
            }
            feature_ids.push(feature_id);
        }

        if feature_ids.is_empty() {
            return Err(GseaError::EmptyData("no features in count file".to_string()));
        }

        let mut tri = TriMat::new((feature_ids.len(), sample_ids.len()));
        for (row, col, value) in triplets {
            tri.add_triplet(row, col, value);
        }
        Self::new(tri.to_csr(), feature_ids, sample_ids)
    }

    /// Value at (row, col), zero when not stored.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.data.get(row, col).copied().unwrap_or(0)
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.rows()
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Dense row (feature) vector.
    pub fn row_dense(&self, row: usize) -> Vec<u64> {
        let mut dense = vec![0u64; self.n_samples()];
        if let Some(view) = self.data.outer_view(row) {
            for (col, &val) in view.iter() {
                dense[col] = val;
            }
        }
        dense
    }
}

impl RowIdentifiers for CountMatrix {
    fn row_ids(&self) -> &[String] {
        &self.feature_ids
    }

    fn n_rows(&self) -> usize {
        self.n_features()
    }
}
