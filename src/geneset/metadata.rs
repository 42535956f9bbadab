//! Collection-level metadata, including per-collection URL functions.

use crate::error::{GseaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Metadata key holding a collection's URL function.
pub const URL_FUNCTION_KEY: &str = "url_function";
/// Metadata key holding the number of gene sets in a collection.
pub const COUNT_KEY: &str = "count";

/// Callback producing a URL for a gene set.
pub trait UrlStrategy: Send + Sync {
    fn url(&self, collection: &str, name: &str) -> String;
}

impl<F> UrlStrategy for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn url(&self, collection: &str, name: &str) -> String {
        self(collection, name)
    }
}

/// How a collection turns a gene set name into a URL.
#[derive(Clone, Serialize, Deserialize)]
pub enum UrlFunction {
    /// URL template with `{collection}` and `{name}` placeholders.
    Template(String),
    /// Arbitrary callback. Not serializable.
    #[serde(skip)]
    Custom(Arc<dyn UrlStrategy>),
}

impl UrlFunction {
    /// Validated URL template. It must reference `{name}` and may reference
    /// `{collection}`; no other placeholders are allowed.
    pub fn template(template: impl Into<String>) -> Result<Self> {
        let func = UrlFunction::Template(template.into());
        func.validate()?;
        Ok(func)
    }

    pub fn custom<S: UrlStrategy + 'static>(strategy: S) -> Self {
        UrlFunction::Custom(Arc::new(strategy))
    }

    /// MSigDB gene set cards.
    pub fn msigdb() -> Self {
        let template = "https://www.gsea-msigdb.org/gsea/msigdb/cards/{name}.html";
        UrlFunction::Template(template.to_string())
    }

    /// AmiGO term pages, for collections named by GO identifiers.
    pub fn gene_ontology() -> Self {
        UrlFunction::Template("http://amigo.geneontology.org/amigo/term/{name}".to_string())
    }

    pub fn validate(&self) -> Result<()> {
        let template = match self {
            UrlFunction::Template(t) => t,
            UrlFunction::Custom(_) => return Ok(()),
        };
        let mut rest = template.as_str();
        let mut has_name = false;
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                GseaError::InvalidParameter(format!(
                    "unclosed placeholder in URL template '{}'",
                    template
                ))
            })?;
            match &after[..close] {
                "name" => has_name = true,
                "collection" => {}
                other => {
                    return Err(GseaError::InvalidParameter(format!(
                        "unknown placeholder '{{{}}}' in URL template '{}'",
                        other, template
                    )))
                }
            }
            rest = &after[close + 1..];
        }
        if !has_name {
            return Err(GseaError::InvalidParameter(format!(
                "URL template '{}' must contain a {{name}} placeholder",
                template
            )));
        }
        Ok(())
    }

    pub fn url(&self, collection: &str, name: &str) -> String {
        match self {
            UrlFunction::Template(t) => fill_template(t, collection, name),
            UrlFunction::Custom(s) => s.url(collection, name),
        }
    }

    pub fn is_serializable(&self) -> bool {
        matches!(self, UrlFunction::Template(_))
    }
}

/// Substitute `{collection}` and `{name}` in one left-to-right pass, so
/// substituted text is never rescanned.
fn fill_template(template: &str, collection: &str, name: &str) -> String {
    let mut out = String::with_capacity(template.len() + collection.len() + name.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{collection}") {
            out.push_str(collection);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{name}") {
            out.push_str(name);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

impl fmt::Debug for UrlFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlFunction::Template(t) => f.debug_tuple("Template").field(t).finish(),
            UrlFunction::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl PartialEq for UrlFunction {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (UrlFunction::Template(a), UrlFunction::Template(b)) => a == b,
            (UrlFunction::Custom(a), UrlFunction::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Text(String),
    Number(f64),
    Count(usize),
    Flag(bool),
    Url(UrlFunction),
}

impl MetaValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetaValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<usize> {
        match self {
            MetaValue::Count(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            MetaValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_url(&self) -> Option<&UrlFunction> {
        match self {
            MetaValue::Url(u) => Some(u),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Number(v)
    }
}

impl From<UrlFunction> for MetaValue {
    fn from(u: UrlFunction) -> Self {
        MetaValue::Url(u)
    }
}

/// One (collection, key) -> value entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub collection: String,
    pub key: String,
    pub value: MetaValue,
}

/// Metadata table keyed by (collection, key).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionMetadata {
    entries: Vec<MetadataEntry>,
    index: HashMap<String, HashMap<String, usize>>,
}

impl CollectionMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from entries; on a repeated (collection, key) the first wins.
    pub(crate) fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = MetadataEntry>,
    {
        let mut out = Self::new();
        for entry in entries {
            if out.get(&entry.collection, &entry.key).is_none() {
                out.push(entry);
            }
        }
        out
    }

    fn push(&mut self, entry: MetadataEntry) {
        self.index
            .entry(entry.collection.clone())
            .or_default()
            .insert(entry.key.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[MetadataEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct collections, in first-seen order.
    pub fn collections(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|e| e.collection.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    pub fn has_collection(&self, collection: &str) -> bool {
        self.index.contains_key(collection)
    }

    pub fn get(&self, collection: &str, key: &str) -> Option<&MetaValue> {
        let i = self.index.get(collection)?.get(key)?;
        Some(&self.entries[*i].value)
    }

    /// All entries of one collection.
    pub fn for_collection(&self, collection: &str) -> Vec<&MetadataEntry> {
        self.entries
            .iter()
            .filter(|e| e.collection == collection)
            .collect()
    }

    /// Copy with (collection, key) set to `value`, replacing any old value.
    pub(crate) fn with_value(&self, collection: &str, key: &str, value: MetaValue) -> Self {
        let mut out = self.clone();
        match out.index.get(collection).and_then(|keys| keys.get(key)).copied() {
            Some(i) => out.entries[i].value = value,
            None => out.push(MetadataEntry {
                collection: collection.to_string(),
                key: key.to_string(),
                value,
            }),
        }
        out
    }

    /// Union with `other`; entries of `self` win on conflict.
    pub(crate) fn union(&self, other: &CollectionMetadata) -> Self {
        Self::from_entries(self.entries.iter().chain(other.entries.iter()).cloned())
    }

    /// Keep only the given collections and reset their `count` entries.
    pub(crate) fn refresh_counts(&self, counts: &HashMap<&str, usize>) -> Self {
        let mut out = Self::from_entries(
            self.entries
                .iter()
                .filter(|e| counts.contains_key(e.collection.as_str()))
                .cloned(),
        );
        let mut collections: Vec<&&str> = counts.keys().collect();
        collections.sort();
        for collection in collections {
            out = out.with_value(collection, COUNT_KEY, MetaValue::Count(counts[*collection]));
        }
        out
    }
}
