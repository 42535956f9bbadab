//! Gene set collections for multi-method enrichment analysis.
//!
//! The core is [`GeneSetDb`](geneset::GeneSetDb): collections of gene sets
//! over native feature identifiers that can be conformed to the rows of any
//! expression object, after which every gene set knows which target rows it
//! covers and whether it is large enough to be analysed.
//!
//! # Overview
//!
//! - **data**: expression objects a GeneSetDb can be conformed against
//! - **geneset**: the GeneSetDb, its conform lifecycle, queries and file formats
//! - **analysis**: pluggable scoring backends and the multi-method runner
//! - **correct**: multiple testing correction (Benjamini-Hochberg)
//!
//! # Example
//!
//! ```no_run
//! use multigsea::prelude::*;
//!
//! let gsdb = GeneSetDb::from_gmt("h.all.v7.symbols.gmt", "H").unwrap();
//! let exprs = ExpressionMatrix::from_tsv("logcpm.tsv").unwrap();
//!
//! let conformed = gsdb.conform(&exprs, &ConformConfig::default()).unwrap();
//! for warning in &conformed.warnings {
//!     eprintln!("{}", warning);
//! }
//! let index = conformed.gsdb.expression_row_indexes(true).unwrap();
//! println!("{} active gene sets", index.len());
//! ```

pub mod analysis;
pub mod correct;
pub mod data;
pub mod error;
pub mod geneset;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::analysis::{
        run_multi_gsea, AnalysisConfig, GeneSetScore, IndexedGeneSet, MeanStatistic,
        MultiGseaResult, ScoringBackend, ScoringInput,
    };
    pub use crate::correct::{correct_bh, BhCorrected};
    pub use crate::data::{validate_target, CountMatrix, ExpressionMatrix, RowIdentifiers};
    pub use crate::error::{GseaError, Result};
    pub use crate::geneset::{
        CollectionMetadata, ConformConfig, ConformWarning, Conformed, Crosswalk, CrosswalkEntry,
        FeatureIdQuery, FeatureValues, GeneSetDb, GeneSetDefinition, GeneSetKey, GeneSetMember,
        GeneSetMemberRecord, GeneSetRow, GeneSetTable, IdValue, IncidenceMatrix, MetaValue,
        MetadataEntry, UniqueBy, UrlFunction, UrlStrategy, COUNT_KEY, MIN_GENE_SET_SIZE,
        URL_FUNCTION_KEY,
    };
}
