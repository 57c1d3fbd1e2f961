use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use mongodb::bson::{Bson, Document};
use mongodb::options::IndexOptions;
use mongodb::IndexModel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }

    /// Reads a key direction the way the server reports it. Numeric kinds vary
    /// with the client that declared the index.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        let numeric = match value {
            Bson::Int32(v) => *v as f64,
            Bson::Int64(v) => *v as f64,
            Bson::Double(v) => *v,
            Bson::String(s) => return s.parse().ok(),
            _ => return None,
        };
        if numeric == 1.0 {
            Some(Self::Ascending)
        } else if numeric == -1.0 {
            Some(Self::Descending)
        } else {
            None
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        };
        write!(f, "{display}")
    }
}

impl FromStr for SortOrder {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(Self::Ascending),
            "desc" | "descending" | "-1" => Ok(Self::Descending),
            other => Err(SchemaError::UnsupportedKey(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("collection declared more than once: {0}")]
    DuplicateCollection(String),
    #[error("index on {0} declares no keys")]
    EmptyIndex(String),
    #[error("index {index} on {collection} repeats field {field}")]
    DuplicateKeyField {
        collection: String,
        index: String,
        field: String,
    },
    #[error("unsupported index key direction: {0}")]
    UnsupportedKey(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexKey {
    pub field: String,
    pub order: SortOrder,
}

impl IndexKey {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            order: SortOrder::Descending,
        }
    }
}

impl Display for IndexKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.order)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSpec {
    pub keys: Vec<IndexKey>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    pub fn new(keys: Vec<IndexKey>) -> Self {
        Self {
            keys,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Server default naming: `<field>_<direction>` pairs joined by `_`.
    pub fn name(&self) -> String {
        default_index_name(&self.keys)
    }

    pub fn keys_document(&self) -> Document {
        let mut doc = Document::new();
        for key in &self.keys {
            doc.insert(key.field.clone(), key.order.as_i32());
        }
        doc
    }

    pub fn to_model(&self) -> IndexModel {
        let mut options = IndexOptions::builder().name(self.name()).build();
        if self.unique {
            options.unique = Some(true);
        }
        IndexModel::builder()
            .keys(self.keys_document())
            .options(options)
            .build()
    }

    /// Declared indexes cover every document, so a sparse, partial or
    /// collated index never satisfies one.
    pub fn matches(&self, existing: &ExistingIndex) -> bool {
        self.same_keys(existing) && self.unique == existing.unique && !existing.is_restricted()
    }

    pub fn same_keys(&self, existing: &ExistingIndex) -> bool {
        !existing.unsupported && self.keys == existing.keys
    }

    pub fn describe_keys(&self) -> String {
        self.keys
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn default_index_name(keys: &[IndexKey]) -> String {
    keys.iter()
        .map(|k| format!("{}_{}", k.field, k.order.as_i32()))
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            indexes: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaPlan {
    pub collections: Vec<CollectionSpec>,
}

impl SchemaPlan {
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = BTreeSet::new();
        for collection in &self.collections {
            if !seen.insert(collection.name.as_str()) {
                return Err(SchemaError::DuplicateCollection(collection.name.clone()));
            }
            for index in &collection.indexes {
                if index.keys.is_empty() {
                    return Err(SchemaError::EmptyIndex(collection.name.clone()));
                }
                let mut fields = BTreeSet::new();
                for key in &index.keys {
                    if !fields.insert(key.field.as_str()) {
                        return Err(SchemaError::DuplicateKeyField {
                            collection: collection.name.clone(),
                            index: index.name(),
                            field: key.field.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn index_count(&self) -> usize {
        self.collections.iter().map(|c| c.indexes.len()).sum()
    }
}

/// An index as the server reports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExistingIndex {
    pub name: String,
    pub keys: Vec<IndexKey>,
    pub unique: bool,
    /// Set when a key is not a plain ascending/descending key (text, hashed, geo).
    pub unsupported: bool,
    #[serde(default)]
    pub sparse: bool,
    #[serde(default)]
    pub partial_filter: Option<Document>,
    /// Collation locale.
    #[serde(default)]
    pub collation: Option<String>,
}

impl ExistingIndex {
    pub fn from_model(model: &IndexModel) -> Self {
        let mut keys = Vec::with_capacity(model.keys.len());
        let mut unsupported = false;
        for (field, value) in &model.keys {
            match SortOrder::from_bson(value) {
                Some(order) => keys.push(IndexKey {
                    field: field.clone(),
                    order,
                }),
                None => unsupported = true,
            }
        }
        let options = model.options.as_ref();
        let name = options
            .and_then(|o| o.name.clone())
            .unwrap_or_else(|| default_index_name(&keys));
        let unique = options.and_then(|o| o.unique).unwrap_or(false);
        Self {
            name,
            keys,
            unique,
            unsupported,
            sparse: options.and_then(|o| o.sparse).unwrap_or(false),
            partial_filter: options.and_then(|o| o.partial_filter_expression.clone()),
            collation: options.and_then(|o| o.collation.as_ref().map(|c| c.locale.clone())),
        }
    }

    pub fn from_spec(spec: &IndexSpec) -> Self {
        Self {
            name: spec.name(),
            keys: spec.keys.clone(),
            unique: spec.unique,
            unsupported: false,
            sparse: false,
            partial_filter: None,
            collation: None,
        }
    }

    /// Options that limit which documents the index covers or how it compares them.
    pub fn restrictions(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.sparse {
            out.push("sparse".to_string());
        }
        if let Some(filter) = &self.partial_filter {
            out.push(format!("partialFilterExpression {filter}"));
        }
        if let Some(locale) = &self.collation {
            out.push(format!("collation {locale}"));
        }
        out
    }

    pub fn is_restricted(&self) -> bool {
        self.sparse || self.partial_filter.is_some() || self.collation.is_some()
    }
}
