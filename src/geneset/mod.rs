//! Gene set databases and their conformation to expression objects.
//!
//! A [`GeneSetDb`] links three tables:
//!
//! - the definition table: (collection, name, feature_id) triples
//! - the [`Crosswalk`]: feature_id -> target row id -> target row position
//! - the [`GeneSetTable`]: one row per gene set with its activation state
//!
//! plus free-form [`CollectionMetadata`]. [`GeneSetDb::conform`] resolves the
//! crosswalk against a target and decides which gene sets are active.

mod conform;
mod crosswalk;
mod db;
mod incidence;
mod io;
mod metadata;
mod query;
mod table;

pub use conform::{ConformConfig, ConformWarning, Conformed, UniqueBy, MIN_GENE_SET_SIZE};
pub use crosswalk::{Crosswalk, CrosswalkEntry};
pub use db::{GeneSetDb, GeneSetDefinition, GeneSetKey, GeneSetMember};
pub use incidence::IncidenceMatrix;
pub use metadata::{
    CollectionMetadata, MetaValue, MetadataEntry, UrlFunction, UrlStrategy, COUNT_KEY,
    URL_FUNCTION_KEY,
};
pub use query::{FeatureIdQuery, FeatureValues, GeneSetMemberRecord, IdValue};
pub use table::{GeneSetRow, GeneSetTable};
