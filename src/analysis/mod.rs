//! Multi-method gene set analysis on top of a conformed GeneSetDb.
//!
//! Statistical tests are pluggable [`ScoringBackend`]s; the runner feeds
//! them the expression indexes of every active gene set and collects their
//! tables into one [`MultiGseaResult`].

pub mod backend;
pub mod result;
pub mod runner;

pub use backend::{GeneSetScore, IndexedGeneSet, MeanStatistic, ScoringBackend, ScoringInput};
pub use result::MultiGseaResult;
pub use runner::{run_multi_gsea, AnalysisConfig};
