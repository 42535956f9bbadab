//! Dense log-expression matrix (microarray / voom style).

use crate::data::target::RowIdentifiers;
use crate::error::{GseaError, Result};
use nalgebra::DMatrix;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dense expression values, features × samples.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    data: DMatrix<f64>,
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl ExpressionMatrix {
    pub fn new(
        data: DMatrix<f64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        if data.nrows() != feature_ids.len() {
            return Err(GseaError::DimensionMismatch {
                expected: data.nrows(),
                actual: feature_ids.len(),
            });
        }
        if data.ncols() != sample_ids.len() {
            return Err(GseaError::DimensionMismatch {
                expected: data.ncols(),
                actual: sample_ids.len(),
            });
        }
        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Load a dense matrix from TSV. Empty cells and `NA` become `NaN`.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| GseaError::EmptyData("empty expression file".to_string()))??;
        let sample_ids: Vec<String> = header_line
            .split('\t')
            .skip(1)
            .map(|s| s.to_string())
            .collect();
        let n_samples = sample_ids.len();
        if n_samples == 0 {
            return Err(GseaError::EmptyData(
                "expression file must have at least one sample column".to_string(),
            ));
        }

        let mut feature_ids = Vec::new();
        let mut values = Vec::new();
        for (offset, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != n_samples + 1 {
                return Err(GseaError::Parse {
                    line: offset + 2,
                    reason: format!("expected {} columns, found {}", n_samples + 1, fields.len()),
                });
            }
            feature_ids.push(fields[0].to_string());
            for raw in &fields[1..] {
                let raw = raw.trim();
                let value = if raw.is_empty() || raw == "NA" {
                    f64::NAN
                } else {
                    raw.parse::<f64>().map_err(|_| GseaError::Parse {
                        line: offset + 2,
                        reason: format!("invalid value '{}'", raw),
                    })?
                };
                values.push(value);
            }
        }

        if feature_ids.is_empty() {
            return Err(GseaError::EmptyData("no features in expression file".to_string()));
        }

        let data = DMatrix::from_row_slice(feature_ids.len(), n_samples, &values);
        Self::new(data, feature_ids, sample_ids)
    }

    #[inline]
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Per-feature mean across samples, ignoring `NaN`.
    pub fn row_means(&self) -> Vec<f64> {
        self.data
            .row_iter()
            .map(|row| {
                let (sum, n) = row
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold((0.0f64, 0usize), |(s, n), v| (s + *v, n + 1));
                if n == 0 {
                    f64::NAN
                } else {
                    sum / n as f64
                }
            })
            .collect()
    }
}

impl RowIdentifiers for ExpressionMatrix {
    fn row_ids(&self) -> &[String] {
        &self.feature_ids
    }

    fn n_rows(&self) -> usize {
        self.n_features()
    }
}
