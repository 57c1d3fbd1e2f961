use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use thiserror::Error;

use crate::schema::{ExistingIndex, IndexKey, IndexSpec};
use crate::target::SchemaTarget;

#[derive(Debug, Error)]
#[error("duplicate key in {collection} for index {index}: {value}")]
pub struct DuplicateKeyError {
    pub collection: String,
    pub index: String,
    pub value: String,
}

#[derive(Debug, Default)]
struct MemoryCollection {
    indexes: Vec<ExistingIndex>,
    documents: Vec<Document>,
}

impl MemoryCollection {
    fn new() -> Self {
        Self {
            indexes: vec![ExistingIndex {
                name: "_id_".to_string(),
                ..ExistingIndex::from_spec(&IndexSpec::new(vec![IndexKey::asc("_id")]))
            }],
            documents: Vec::new(),
        }
    }
}

/// Server stand-in that keeps schema state and documents in process.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    name: String,
    collections: Mutex<BTreeMap<String, MemoryCollection>>,
    writes: AtomicUsize,
    deny_index_on: Mutex<Option<String>>,
}

impl MemoryTarget {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Number of schema writes that reached the target.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn deny_index_creation_on(&self, collection: &str) {
        *self.deny_index_on.lock().expect("poisoned") = Some(collection.to_string());
    }

    pub fn insert(&self, collection: &str, document: Document) -> Result<()> {
        let mut collections = self.collections.lock().expect("poisoned");
        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(MemoryCollection::new);
        for index in entry.indexes.iter().filter(|i| i.unique) {
            let incoming = key_tuple(&document, &index.keys);
            if entry
                .documents
                .iter()
                .any(|doc| key_tuple(doc, &index.keys) == incoming)
            {
                return Err(DuplicateKeyError {
                    collection: collection.to_string(),
                    index: index.name.clone(),
                    value: format!("{incoming:?}"),
                }
                .into());
            }
        }
        entry.documents.push(document);
        Ok(())
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .expect("poisoned")
            .get(collection)
            .map(|c| c.documents.len())
            .unwrap_or(0)
    }

    /// Declares an index directly, bypassing the write counter.
    pub fn seed_index(&self, collection: &str, index: ExistingIndex) {
        self.collections
            .lock()
            .expect("poisoned")
            .entry(collection.to_string())
            .or_insert_with(MemoryCollection::new)
            .indexes
            .push(index);
    }
}

fn key_tuple(document: &Document, keys: &[IndexKey]) -> Vec<Bson> {
    keys.iter()
        .map(|k| document.get(&k.field).cloned().unwrap_or(Bson::Null))
        .collect()
}

#[async_trait]
impl SchemaTarget for MemoryTarget {
    fn database_name(&self) -> &str {
        &self.name
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        Ok(self
            .collections
            .lock()
            .expect("poisoned")
            .keys()
            .cloned()
            .collect())
    }

    async fn create_collection(&self, name: &str) -> Result<bool> {
        let mut collections = self.collections.lock().expect("poisoned");
        if collections.contains_key(name) {
            return Ok(false);
        }
        collections.insert(name.to_string(), MemoryCollection::new());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<String> {
        if self.deny_index_on.lock().expect("poisoned").as_deref() == Some(collection) {
            bail!("not authorized on {} to execute command createIndexes", self.name);
        }
        let mut collections = self.collections.lock().expect("poisoned");
        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(MemoryCollection::new);
        let name = index.name();
        if let Some(existing) = entry.indexes.iter().find(|i| i.name == name) {
            if index.matches(existing) {
                return Ok(name);
            }
            return Err(anyhow!(
                "index already exists with a different definition: {name}"
            ));
        }
        if index.unique {
            let mut seen: Vec<Vec<Bson>> = Vec::new();
            for doc in &entry.documents {
                let tuple = key_tuple(doc, &index.keys);
                if seen.contains(&tuple) {
                    return Err(DuplicateKeyError {
                        collection: collection.to_string(),
                        index: name,
                        value: format!("{tuple:?}"),
                    }
                    .into());
                }
                seen.push(tuple);
            }
        }
        entry.indexes.push(ExistingIndex::from_spec(index));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(name)
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<ExistingIndex>> {
        Ok(self
            .collections
            .lock()
            .expect("poisoned")
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default())
    }
}
